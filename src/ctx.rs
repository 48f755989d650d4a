use clap::App;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pbx::Document;
use crate::project::Project;

pub trait Command {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b>;

  fn run(&self, ctx: &Context) -> RunResult;
}

pub type Result<T> = std::result::Result<T, Error>;
pub type RunResult = Result<()>;

pub type Commands = BTreeMap<&'static str, Box<dyn Command>>;

/// Name of the Cordova platform this tool operates on.
pub const PLATFORM: &str = "ios";

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Missing project root")]
  MissingProjectRoot,

  #[error("Missing plugin directory")]
  MissingPluginDir,

  #[error("Missing config.xml file ({0})")]
  MissingConfigFile(PathBuf),

  #[error("Invalid config.xml file ({path}): {message}")]
  InvalidConfigFile { path: PathBuf, message: String },

  #[error("{0}: no such file or directory")]
  MissingXcodeProject(PathBuf),

  #[error("Failed to parse {path} at line {line}: {message}")]
  Parse { path: PathBuf, line: usize, message: String },

  #[error("Could not find the main group of the project")]
  MissingMainGroup,

  #[error("Could not find an application target in the project")]
  MissingAppTarget,

  #[error("Could not find the app bundle identifier for the {0} configuration")]
  MissingBundleIdentifier(String),

  #[error("Missing template file {0}")]
  MissingTemplate(PathBuf),

  #[error("Failed to copy {from} to {to}: {source}")]
  FileCopy { from: PathBuf, to: PathBuf, source: std::io::Error },

  #[error("Missing Podfile ({0})")]
  MissingPodfile(PathBuf),

  #[error("No configuration id found between {min} and {max} after {tries} attempts")]
  IdOrdering { min: String, max: String, tries: usize },

  #[error("`{command}` failed: {message}")]
  ExternalProcess { command: String, message: String },

  #[error("Failed to remove {0} file(s)")]
  FileRemoval(usize),

  #[error("Invalid extension settings: {0}")]
  Settings(#[from] toml::de::Error),

  #[error("Invalid file pattern: {0}")]
  Pattern(#[from] glob::PatternError),

  #[error(transparent)]
  Io(#[from] std::io::Error)
}

/// Settings read from `WONDERPUSH_*` environment variables.
#[derive(Debug, Deserialize)]
pub struct Env {
  #[serde(default)]
  pub project_root: Option<PathBuf>,

  #[serde(default)]
  pub plugin_dir: Option<PathBuf>,

  /// Whether to run `pod install` after patching the Podfile.
  #[serde(default = "default_pod_install")]
  pub pod_install: bool,

  /// Seconds before `pod install` is killed.
  #[serde(default = "default_pod_timeout")]
  pub pod_timeout: u64
}

fn default_pod_install() -> bool { true }
fn default_pod_timeout() -> u64 { 600 }

impl Default for Env {
  fn default() -> Self {
    Env {
      project_root: None,
      plugin_dir:   None,
      pod_install:  default_pod_install(),
      pod_timeout:  default_pod_timeout()
    }
  }
}

/// What the Cordova hook hands over: where the app lives and where the
/// plugin was installed from.
pub struct Context {
  pub commands: Commands,

  pub project_root: Option<PathBuf>,
  pub plugin_dir:   Option<PathBuf>,
  pub plugin_id:    Option<String>,
  pub platforms:    Vec<String>,

  pub env: Env
}

impl Context {
  /// An empty platform list means the host did not restrict the run.
  pub fn has_platform(&self, name: &str) -> bool {
    self.platforms.is_empty() || self.platforms.iter().any(|p| p == name)
  }

  pub fn project_root(&self) -> Result<&Path> {
    self.project_root.as_deref().ok_or(Error::MissingProjectRoot)
  }

  pub fn plugin_dir(&self) -> Result<&Path> {
    self.plugin_dir.as_deref().ok_or(Error::MissingPluginDir)
  }

  pub fn platform_dir(&self) -> Result<PathBuf> {
    Ok(self.project_root()?.join("platforms").join(PLATFORM))
  }

  pub fn podfile_path(&self) -> Result<PathBuf> {
    Ok(self.platform_dir()?.join("Podfile"))
  }

  pub fn pod_timeout(&self) -> Duration {
    Duration::from_secs(self.env.pod_timeout)
  }

  pub fn read_config(&self) -> Result<Config> {
    let path = self.project_root()?.join("config.xml");
    if !path.is_file() {
      return Err(Error::MissingConfigFile(path));
    }

    let text = std::fs::read_to_string(&path)?;
    Config::parse(&text, &path)
  }

  pub fn xcode_project_path(&self) -> Result<PathBuf> {
    let config = self.read_config()?;
    let path = self.platform_dir()?.join([config.name.as_str(), ".xcodeproj"].join(""));

    match path.is_dir() {
      true  => Ok(path),
      false => Err(Error::MissingXcodeProject(path))
    }
  }

  pub fn read_project(&self) -> Result<Project> {
    let path = self.xcode_project_path()?.join("project.pbxproj");
    tracing::debug!("Loading {}", path.display());
    Ok(Project::new(Document::load(path)?))
  }
}

/// The parts of Cordova's config.xml this tool needs.
#[derive(Debug)]
pub struct Config {
  pub name: String
}

impl Config {
  pub fn parse(text: &str, path: &Path) -> Result<Self> {
    let invalid = |message: String| Error::InvalidConfigFile {
      path: path.to_path_buf(),
      message
    };

    let doc = roxmltree::Document::parse(text).map_err(|e| invalid(e.to_string()))?;

    let name = doc.root_element()
      .children()
      .find(|n| n.is_element() && n.tag_name().name() == "name")
      .and_then(|n| n.text())
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .ok_or_else(|| invalid("missing <name> element".to_string()))?;

    Ok(Config { name: name.to_string() })
  }
}
