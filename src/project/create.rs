//! New objects: targets, groups and build phases.

use std::path::Path;

use super::{APP_EXTENSION_TYPE, Project};
use super::edit::EMBED_APP_EXTENSIONS;
use crate::ctx::{Error, Result};
use crate::pbx::{Dict, Object, Value, unquote};

const GROUP_REF:         &str = "<group>";
const BUILD_ACTION_MASK: &str = "2147483647";

/// Copy files destination of app extensions (PlugIns folder).
const PLUGINS_SUBFOLDER: &str = "13";

enum Phase {
  None,
  Source
}

fn get_file_type(ext: &str) -> (Phase, &'static str) {
  match ext {
    "h"            => (Phase::None,   "sourcecode.c.h"),
    "hpp"          => (Phase::None,   "sourcecode.cpp.h"),
    "c"            => (Phase::Source, "sourcecode.c"),
    "cc" | "cpp"   => (Phase::Source, "sourcecode.cpp.cpp"),
    "m"            => (Phase::Source, "sourcecode.c.objc"),
    "mm"           => (Phase::Source, "sourcecode.cpp.objcpp"),
    "swift"        => (Phase::Source, "sourcecode.swift"),
    "plist"        => (Phase::None,   "text.plist.xml"),
    "xcconfig"     => (Phase::None,   "text.xcconfig"),
    &_             => (Phase::None,   "text")
  }
}

/// Identifiers of everything `add_app_extension_target` created.
#[derive(Debug)]
pub struct NewTarget {
  pub target_id: String,
  pub list_id:   String
}

fn default_settings(name: &str, debug: bool) -> Dict {
  let mut s = Dict::new();
  if debug {
    s.insert("GCC_PREPROCESSOR_DEFINITIONS".to_string(),
             Value::array(vec![Value::str("DEBUG=1"), Value::str("$(inherited)")]));
  }
  s.insert("INFOPLIST_FILE".to_string(), Value::str(format!("{0}/{0}-Info.plist", name)));
  s.insert("LD_RUNPATH_SEARCH_PATHS".to_string(),
           Value::str("$(inherited) @executable_path/Frameworks @executable_path/../../Frameworks"));
  s.insert("PRODUCT_NAME".to_string(), Value::str(name));
  s.insert("SKIP_INSTALL".to_string(), Value::str("YES"));
  s
}

impl Project {
  /// Creates an app extension target with default Debug and Release
  /// configurations, and embeds its product into the app target.
  pub fn add_app_extension_target(&mut self, name: &str, app_target_id: &str) -> Result<NewTarget> {
    if !self.native_targets().contains_key(app_target_id) {
      return Err(Error::MissingAppTarget);
    }

    let target_id  = self.generate_id();
    let list_id    = self.generate_id();
    let product_id = self.generate_id();
    let product    = [name, ".appex"].join("");

    // Build configurations.
    let mut cfgs = Vec::new();
    for &(env, debug) in &[("Debug", true), ("Release", false)] {
      let id = self.generate_id();
      let cfg = Object::new("XCBuildConfiguration")
        .commented(env)
        .with("buildSettings", default_settings(name, debug))
        .with("name", env);
      self.add_build_configuration(id.clone(), cfg);
      cfgs.push(Value::reference(id, env));
    }

    let list_comment = format!("Build configuration list for PBXNativeTarget \"{}\"", name);
    self.configuration_lists_mut().insert(list_id.clone(),
      Object::new("XCConfigurationList")
        .commented(list_comment.as_str())
        .with("buildConfigurations", Value::Array(cfgs))
        .with("defaultConfigurationIsVisible", "0")
        .with("defaultConfigurationName", "Release"));

    // Product.
    self.file_references_mut().insert(product_id.clone(),
      Object::new("PBXFileReference")
        .commented(product.as_str())
        .with("explicitFileType", "wrapper.app-extension")
        .with("includeInIndex", "0")
        .with("path", product.as_str())
        .with("sourceTree", "BUILT_PRODUCTS_DIR"));

    if let Some(products) = self.products_group_id().map(String::from) {
      self.add_child_to_group(&product_id, &product, &products);
    }

    // Target.
    self.native_targets_mut().insert(target_id.clone(),
      Object::new("PBXNativeTarget")
        .commented(name)
        .with("buildConfigurationList", Value::reference(list_id.as_str(), list_comment))
        .with("buildPhases", Value::Array(Vec::new()))
        .with("buildRules", Value::Array(Vec::new()))
        .with("dependencies", Value::Array(Vec::new()))
        .with("name", name)
        .with("productName", name)
        .with("productReference", Value::reference(product_id.as_str(), product.as_str()))
        .with("productType", APP_EXTENSION_TYPE));

    let root_id = self.root_object_id().map(String::from);
    if let Some(root) = root_id.as_deref().and_then(|id| self.projects_mut().get_mut(id)) {
      root.array_mut("targets").push(Value::reference(target_id.as_str(), name));
    }

    self.embed_app_extension(app_target_id, &product_id, &product);
    self.add_target_dependency(app_target_id, &target_id, name, root_id.as_deref());

    tracing::debug!("Created target {} ({})", name, target_id);
    Ok(NewTarget { target_id, list_id })
  }

  /// Copies the extension product into the app's PlugIns folder, reusing an
  /// existing embedding phase of the app target.
  fn embed_app_extension(&mut self, app_target_id: &str, product_id: &str, product: &str) {
    let comment = format!("{} in {}", product, EMBED_APP_EXTENSIONS);
    let mut attributes = Dict::new();
    attributes.insert("ATTRIBUTES".to_string(), Value::array(vec![Value::str("RemoveHeadersOnCopy")]));

    let build_file_id = self.generate_id();
    self.build_files_mut().insert(build_file_id.clone(),
      Object::new("PBXBuildFile")
        .commented(comment.as_str())
        .with("fileRef", Value::reference(product_id, product))
        .with("settings", attributes));

    let existing = self.native_targets()[app_target_id]
      .ids("buildPhases")
      .find(|id| {
        self.copy_files_build_phases().get(*id)
          .map_or(false, |p| p.str("dstSubfolderSpec") == Some(PLUGINS_SUBFOLDER))
      })
      .map(String::from);

    let phase_id = match existing {
      Some(id) => id,
      None => {
        let id = self.generate_id();
        self.copy_files_build_phases_mut().insert(id.clone(),
          Object::new("PBXCopyFilesBuildPhase")
            .commented(EMBED_APP_EXTENSIONS)
            .with("buildActionMask", BUILD_ACTION_MASK)
            .with("dstPath", "")
            .with("dstSubfolderSpec", PLUGINS_SUBFOLDER)
            .with("files", Value::Array(Vec::new()))
            .with("name", EMBED_APP_EXTENSIONS)
            .with("runOnlyForDeploymentPostprocessing", "0"));
        if let Some(app) = self.native_targets_mut().get_mut(app_target_id) {
          app.array_mut("buildPhases").push(Value::reference(id.as_str(), EMBED_APP_EXTENSIONS));
        }
        id
      }
    };

    if let Some(phase) = self.copy_files_build_phases_mut().get_mut(&phase_id) {
      phase.array_mut("files").push(Value::reference(build_file_id, comment));
    }
  }

  fn add_target_dependency(&mut self, app_target_id: &str, target_id: &str, name: &str,
                           root_id: Option<&str>)
  {
    let proxy_id = self.generate_id();
    let dep_id   = self.generate_id();

    let mut proxy = Object::new("PBXContainerItemProxy").commented("PBXContainerItemProxy");
    if let Some(root) = root_id {
      proxy.set("containerPortal", Value::reference(root, "Project object"));
    }
    proxy.set("proxyType", "1");
    proxy.set("remoteGlobalIDString", target_id);
    proxy.set("remoteInfo", name);
    self.container_item_proxies_mut().insert(proxy_id.clone(), proxy);

    self.target_dependencies_mut().insert(dep_id.clone(),
      Object::new("PBXTargetDependency")
        .commented("PBXTargetDependency")
        .with("target", Value::reference(target_id, name))
        .with("targetProxy", Value::reference(proxy_id, "PBXContainerItemProxy")));

    if let Some(app) = self.native_targets_mut().get_mut(app_target_id) {
      app.array_mut("dependencies").push(Value::reference(dep_id, "PBXTargetDependency"));
    }
  }

  /// Creates a group holding a file reference for each of `files`, plus a
  /// build file for the compiled ones. Returns the group id.
  pub fn add_group(&mut self, files: &[&str], name: &str, path: &str) -> String {
    let mut children = Vec::new();

    for &file in files {
      let file_id = self.generate_id();
      let ext = Path::new(file).extension().and_then(|x| x.to_str()).unwrap_or("");
      let (phase, pbx_type) = get_file_type(ext);

      self.file_references_mut().insert(file_id.clone(),
        Object::new("PBXFileReference")
          .commented(file)
          .with("lastKnownFileType", pbx_type)
          .with("path", file)
          .with("sourceTree", GROUP_REF));

      if let Phase::Source = phase {
        let build_file_id = self.generate_id();
        self.build_files_mut().insert(build_file_id,
          Object::new("PBXBuildFile")
            .commented(format!("{} in Sources", file))
            .with("fileRef", Value::reference(file_id.as_str(), file)));
      }

      children.push(Value::reference(file_id, file));
    }

    let group_id = self.generate_id();
    self.groups_mut().insert(group_id.clone(),
      Object::new("PBXGroup")
        .commented(name)
        .with("children", Value::Array(children))
        .with("name", name)
        .with("path", path)
        .with("sourceTree", GROUP_REF));
    group_id
  }

  /// Adds a sources phase compiling the given files to the target. Files
  /// without a build file are left out. `None` when the target is missing.
  pub fn add_sources_build_phase(&mut self, file_ids: &[String], target_id: &str) -> Option<String> {
    if !self.native_targets().contains_key(target_id) {
      return None;
    }

    let files: Vec<Value> = file_ids.iter()
      .filter_map(|id| {
        let build_file_id = self.build_file_id_for_file_ref(id)?;
        let name = self.file_references().get(id.as_str())
          .and_then(|f| f.str("path"))
          .map(|p| unquote(p).rsplit('/').next().unwrap_or(p).to_string())
          .unwrap_or_default();
        Some(Value::reference(build_file_id, format!("{} in Sources", name)))
      })
      .collect();

    let phase_id = self.generate_id();
    self.sources_build_phases_mut().insert(phase_id.clone(),
      Object::new("PBXSourcesBuildPhase")
        .commented("Sources")
        .with("buildActionMask", BUILD_ACTION_MASK)
        .with("files", Value::Array(files))
        .with("runOnlyForDeploymentPostprocessing", "0"));

    if let Some(target) = self.native_targets_mut().get_mut(target_id) {
      target.array_mut("buildPhases").push(Value::reference(phase_id.as_str(), "Sources"));
    }

    Some(phase_id)
  }
}
