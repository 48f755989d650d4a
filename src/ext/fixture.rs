//! A throwaway Cordova app for scenario tests.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::ctx::{Commands, Context, Env, Result};
use crate::pbx::Document;
use crate::podfile::PackageManager;
use crate::project::Project;
use crate::project::tests::FIXTURE;

pub const CONFIG: &str = concat!(
  "<?xml version='1.0' encoding='utf-8'?>\n",
  "<widget id=\"com.acme.app\" version=\"1.0.0\" xmlns=\"http://www.w3.org/ns/widgets\">\n",
  "    <name>HelloCordova</name>\n",
  "</widget>\n"
);

pub const PODFILE: &str = concat!(
  "platform :ios, '11.0'\n",
  "use_frameworks!\n",
  "target 'HelloCordova' do\n",
  "\tproject 'HelloCordova.xcodeproj'\n",
  "\tpod 'WonderPush', '~> 4.0'\n",
  "end\n"
);

pub struct Workspace {
  pub dir: TempDir
}

impl Workspace {
  pub fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.xml"), CONFIG).unwrap();

    let xcodeproj = dir.path().join("platforms/ios/HelloCordova.xcodeproj");
    fs::create_dir_all(&xcodeproj).unwrap();
    fs::write(xcodeproj.join("project.pbxproj"), FIXTURE).unwrap();
    fs::write(dir.path().join("platforms/ios/Podfile"), PODFILE).unwrap();

    Workspace { dir }
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  pub fn platform_dir(&self) -> PathBuf {
    self.root().join("platforms/ios")
  }

  pub fn extension_dir(&self) -> PathBuf {
    self.platform_dir().join(super::EXTENSION_NAME)
  }

  pub fn pbxproj_path(&self) -> PathBuf {
    self.platform_dir().join("HelloCordova.xcodeproj/project.pbxproj")
  }

  pub fn pbxproj(&self) -> String {
    fs::read_to_string(self.pbxproj_path()).unwrap()
  }

  pub fn podfile_path(&self) -> PathBuf {
    self.platform_dir().join("Podfile")
  }

  pub fn podfile(&self) -> String {
    fs::read_to_string(self.podfile_path()).unwrap()
  }

  pub fn load(&self) -> Project {
    Project::new(Document::load(self.pbxproj_path()).unwrap())
  }

  /// The fixture as the writer lays it out.
  pub fn normalized_fixture() -> String {
    Document::parse(FIXTURE, "project.pbxproj").unwrap().to_string()
  }

  pub fn context(&self) -> Context {
    Context {
      commands:     Commands::new(),
      project_root: Some(self.root().to_path_buf()),
      plugin_dir:   Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
      plugin_id:    Some("wonderpush-cordova-sdk".to_string()),
      platforms:    vec!["ios".to_string()],
      env:          Env::default()
    }
  }
}

/// Records `install` calls instead of running anything.
#[derive(Default)]
pub struct RecordingPods {
  pub calls: RefCell<Vec<PathBuf>>
}

impl PackageManager for RecordingPods {
  fn install(&self, dir: &Path) -> Result<()> {
    self.calls.borrow_mut().push(dir.to_path_buf());
    Ok(())
  }
}
