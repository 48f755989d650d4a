//! The WonderPush notification service extension.
//!
//! Installing it adds a native target compiling the template sources shipped
//! with the plugin, a group holding their copies, and a pod declaration for
//! the extension SDK. Uninstalling removes all of it again.

mod install;
mod uninstall;

#[cfg(test)]
mod fixture;

use serde::Deserialize;

use crate::ctx::Result;
use crate::pbx::{Dict, Value};

pub use install::{Outcome, install};
pub use uninstall::{Report, uninstall};

/// Name of the target, its group and the folder holding its sources.
pub const EXTENSION_NAME: &str = "WonderPushNotificationServiceExtension";

/// Build configurations the extension gets, matched on the app's.
pub const ENVIRONMENTS: &[&str] = &["Debug", "Release"];

/// Location of the template sources, relative to the plugin directory.
pub const TEMPLATE_DIR: &str = "ios/WonderPushNotificationServiceExtension";

pub const TEMPLATE_FILES: &[&str] = &[
  "NotificationService.h",
  "NotificationService.m",
  "Info.plist",
  "wonderpushnotificationserviceextension-debug.xcconfig",
  "wonderpushnotificationserviceextension-release.xcconfig"
];

/// Files compiled by the extension's sources phase.
pub const SOURCE_SUFFIX: &str = ".m";

pub const PODFILE_SNIPPET: &str = concat!(
  "target 'WonderPushNotificationServiceExtension' do\n",
  "  platform :ios, '10.0'\n",
  "  pod 'WonderPushExtension', '~> 4.0'\n",
  "end\n"
);

const SETTINGS: &str = include_str!("ext/settings.toml");

/// Name of the xcconfig template used as base of the given configuration.
pub fn xcconfig_name(environment: &str) -> String {
  format!("wonderpushnotificationserviceextension-{}.xcconfig", environment.to_lowercase())
}

/// The extension's bundle identifier, derived from the app's.
pub fn bundle_identifier(app: &str) -> String {
  [app, ".", EXTENSION_NAME].join("")
}

/// App settings carried over so the extension signs like the app does.
pub fn is_signing_setting(key: &str) -> bool {
  key.starts_with("CODE_SIGN") || key == "DEVELOPMENT_TEAM"
}

#[derive(Deserialize)]
struct Settings {
  common:  toml::value::Table,
  debug:   toml::value::Table,
  release: toml::value::Table
}

/// Build settings of the extension for the given configuration.
pub fn extension_settings(environment: &str) -> Result<Dict> {
  let settings: Settings = toml::from_str(SETTINGS)?;
  let overrides = match environment {
    "Debug"   => settings.debug,
    "Release" => settings.release,
    _         => toml::value::Table::new()
  };

  let mut dict = Dict::new();
  for (key, value) in settings.common.into_iter().chain(overrides) {
    dict.insert(key, to_value(value));
  }

  Ok(dict)
}

fn to_value(value: toml::Value) -> Value {
  use toml::Value as Toml;
  match value {
    Toml::String(s)   => Value::str(s),
    Toml::Integer(i)  => Value::str(i.to_string()),
    Toml::Float(f)    => Value::str(f.to_string()),
    Toml::Boolean(b)  => Value::str(if b { "YES" } else { "NO" }),
    Toml::Datetime(d) => Value::str(d.to_string()),
    Toml::Array(a)    => Value::array(a.into_iter().map(to_value)),
    Toml::Table(t)    => Value::Dict(t.into_iter().map(|(k, v)| (k, to_value(v))).collect())
  }
}
