use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::*;
use crate::ctx::{Context, Error, Result};
use crate::pbx::{Value, unquote};
use crate::podfile::{self, PackageManager};
use crate::project::{APP_EXTENSION_TYPE, BUNDLE_IDENTIFIER, Project};

/// Regenerations of a configuration id before giving up on ordering it.
pub const MAX_ID_RETRIES: usize = 64;

#[derive(Debug, PartialEq)]
pub enum Outcome {
  /// The extension was already there; this many bundle identifiers changed.
  Reconciled(usize),
  /// Only someone else's app extensions exist. Nothing was touched.
  Foreign,
  /// The extension was created with these bundle identifiers.
  Installed(Vec<(&'static str, String)>)
}

pub fn install(ctx: &Context, pods: &dyn PackageManager) -> Result<Outcome> {
  let mut project = ctx.read_project()?;

  let existing: Vec<String> = project.find_targets_by_product_type(APP_EXTENSION_TYPE)
    .iter()
    .map(|t| t.name().map(unquote).unwrap_or(t.id).to_string())
    .collect();

  for name in existing.iter().filter(|n| *n != EXTENSION_NAME) {
    warn!("Found another app extension target ({}), it will not be modified", name);
  }

  if !existing.is_empty() {
    let ours = project.find_target_by_name(EXTENSION_NAME).is_some();
    return match ours {
      true  => Ok(Outcome::Reconciled(reconcile(&mut project)?)),
      false => Ok(Outcome::Foreign)
    };
  }

  let template_dir = ctx.plugin_dir()?.join(TEMPLATE_DIR);
  let platform_dir = ctx.platform_dir()?;
  let bundle_ids   = create(&mut project, &template_dir, &platform_dir)?;
  project.persist()?;

  patch_podfile(ctx, pods)?;

  for (env, id) in &bundle_ids {
    info!("Added {} with bundle identifier {} ({})", EXTENSION_NAME, id, env);
  }
  warn!("Reload the Xcode workspace to pick up the {} target", EXTENSION_NAME);

  Ok(Outcome::Installed(bundle_ids))
}

/// Bundle identifiers of the app target, for every environment.
fn app_bundle_identifiers(project: &Project) -> Result<Vec<(&'static str, String)>> {
  let app = project.app_target_id().ok_or(Error::MissingAppTarget)?;
  ENVIRONMENTS.iter()
    .map(|&env| {
      project.bundle_identifier_of(app, env)
        .map(|id| (env, unquote(id).to_string()))
        .ok_or_else(|| Error::MissingBundleIdentifier(env.to_string()))
    })
    .collect()
}

/// Points the existing extension at the app's current bundle identifiers.
fn reconcile(project: &mut Project) -> Result<usize> {
  let target_id = match project.find_target_by_name(EXTENSION_NAME) {
    Some(t) => t.id.to_string(),
    None    => return Ok(0)
  };

  let mut rewrites = 0;
  for (env, app_id) in app_bundle_identifiers(project)? {
    let expected = bundle_identifier(&app_id);
    if project.bundle_identifier_of(&target_id, env).map(unquote) == Some(expected.as_str()) {
      continue;
    }

    let cfg_id = match project.build_configuration_of(&target_id, env) {
      Some(c) => c.id.to_string(),
      None    => {
        warn!("{} has no {} configuration", EXTENSION_NAME, env);
        continue;
      }
    };

    info!("Updating the {} bundle identifier of {} to {}", env, EXTENSION_NAME, expected);
    if let Some(cfg) = project.build_configurations_mut().get_mut(&cfg_id) {
      cfg.dict_mut("buildSettings").insert(BUNDLE_IDENTIFIER.to_string(), Value::str(expected));
      rewrites += 1;
    }
  }

  match rewrites {
    0 => debug!("{} is up to date", EXTENSION_NAME),
    _ => project.persist()?
  }

  Ok(rewrites)
}

fn create(project: &mut Project, template_dir: &Path, platform_dir: &Path)
          -> Result<Vec<(&'static str, String)>>
{
  let main_group = project.main_group_id().ok_or(Error::MissingMainGroup)?.to_string();
  let app        = project.app_target_id().ok_or(Error::MissingAppTarget)?.to_string();
  let app_ids    = app_bundle_identifiers(project)?;

  let ext_dir = platform_dir.join(EXTENSION_NAME);
  copy_templates(template_dir, &ext_dir)?;

  let new = project.add_app_extension_target(EXTENSION_NAME, &app)?;

  let source_root = project.source_root().unwrap_or(platform_dir).to_path_buf();
  let group = project.add_group(TEMPLATE_FILES, EXTENSION_NAME, &group_path(&ext_dir, &source_root));
  project.add_child_to_group(&group, EXTENSION_NAME, &main_group);

  let cfgs: Vec<(String, String)> = project.build_configurations_of(&new.target_id)
    .iter()
    .filter_map(|c| c.name().map(|n| (c.id.to_string(), n.to_string())))
    .collect();

  let mut bundle_ids = Vec::new();
  for (cfg_id, env) in cfgs {
    let (env, app_id) = match app_ids.iter().find(|(e, _)| *e == env) {
      Some((e, id)) => (*e, id),
      None          => continue
    };

    let mut settings: Vec<(String, Value)> = project.build_configuration_of(&app, env)
      .and_then(|c| c.object.dict("buildSettings"))
      .map(|s| {
        s.iter()
          .filter(|(k, _)| is_signing_setting(k))
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect()
      })
      .unwrap_or_default();
    settings.extend(extension_settings(env)?);

    let bundle_id = bundle_identifier(app_id);
    settings.push((BUNDLE_IDENTIFIER.to_string(), Value::str(bundle_id.as_str())));

    let xcconfig = xcconfig_name(env);
    let base = project.find_file_by_name(&xcconfig).map(|f| Value::reference(f.id, xcconfig.as_str()));

    if let Some(cfg) = project.build_configurations_mut().get_mut(&cfg_id) {
      let build_settings = cfg.dict_mut("buildSettings");
      build_settings.extend(settings);
      build_settings.sort_keys();

      if let Some(base) = base {
        cfg.set("baseConfigurationReference", base);
      }
    }

    order_configuration_id(project, cfg_id, &new.list_id)?;
    bundle_ids.push((env, bundle_id));
  }

  let sources: Vec<String> = project.group_files(&group)
    .into_iter()
    .filter(|(_, path)| path.ends_with(SOURCE_SUFFIX))
    .map(|(id, _)| id)
    .collect();
  project.add_sources_build_phase(&sources, &new.target_id);

  Ok(bundle_ids)
}

/// Path of the extension folder relative to the directory holding the
/// .xcodeproj, which is what group paths resolve against.
fn group_path(ext_dir: &Path, source_root: &Path) -> String {
  pathdiff::diff_paths(ext_dir, source_root)
    .and_then(|p| p.to_str().map(|s| s.replace('\\', "/")))
    .unwrap_or_else(|| EXTENSION_NAME.to_string())
}

/// Regenerates the id of a configuration until it sorts between the ids of
/// every other configuration. Returns the final id.
fn order_configuration_id(project: &mut Project, mut id: String, list_id: &str) -> Result<String> {
  let ours: BTreeSet<&str> = project.configuration_lists()
    .get(list_id)
    .map(|l| l.ids("buildConfigurations").collect())
    .unwrap_or_default();

  let mut others = project.all_build_configurations()
    .into_iter()
    .map(|c| c.id)
    .filter(|id| !ours.contains(id));
  let (min, max) = match (others.next(), others.last()) {
    (Some(min), Some(max)) => (min.to_string(), max.to_string()),
    (Some(min), None)      => (min.to_string(), min.to_string()),
    _                      => return Ok(id)
  };

  let mut tries = 0;
  while id < min || id > max {
    if tries == MAX_ID_RETRIES {
      return Err(Error::IdOrdering { min, max, tries });
    }
    tries += 1;

    project.detach_configuration_from_list(&id, list_id);
    let cfg = match project.remove_build_configuration(&id) {
      Some(x) => x,
      None    => return Ok(id)
    };

    id = project.generate_id();
    debug!("Moved configuration {} to id {}", cfg.comment.as_deref().unwrap_or_default(), id);
    project.add_build_configuration(id.clone(), cfg);
    project.attach_configuration_to_list(&id, list_id);
  }

  Ok(id)
}

fn copy_templates(from: &Path, to: &Path) -> Result<()> {
  for name in TEMPLATE_FILES {
    let path = from.join(name);
    if !path.is_file() {
      return Err(Error::MissingTemplate(path));
    }
  }

  fs::create_dir_all(to).map_err(|source| Error::FileCopy {
    from: from.to_path_buf(),
    to:   to.to_path_buf(),
    source
  })?;

  let pattern = [glob::Pattern::escape(&from.to_string_lossy()).as_str(), "/**/*"].join("");
  for entry in glob::glob(&pattern)? {
    let src = entry.map_err(glob::GlobError::into_error)?;
    let rel = match src.strip_prefix(from) {
      Ok(x)  => x.to_path_buf(),
      Err(_) => continue
    };

    let dst = to.join(&rel);
    let res = match src.is_dir() {
      true  => fs::create_dir_all(&dst),
      false => fs::copy(&src, &dst).map(|_| ())
    };

    res.map_err(|source| Error::FileCopy { from: src.clone(), to: dst.clone(), source })?;
    debug!("Copied {}", rel.display());
  }

  Ok(())
}

fn patch_podfile(ctx: &Context, pods: &dyn PackageManager) -> Result<()> {
  let path = ctx.podfile_path()?;
  if !podfile::add_snippet(&path)? {
    debug!("Podfile already declares {}", EXTENSION_NAME);
    return Ok(());
  }

  info!("Added {} to {}", EXTENSION_NAME, path.display());
  if !ctx.env.pod_install {
    info!("Skipping pod install");
    return Ok(());
  }

  pods.install(path.parent().unwrap_or_else(|| Path::new(".")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use super::super::fixture::{PODFILE, RecordingPods, Workspace};
  use crate::project::tests::{APP_TARGET, fixture};
  use crate::pbx::Object;

  const DEBUG_ID:   &str = "com.acme.app.debug.WonderPushNotificationServiceExtension";
  const RELEASE_ID: &str = "com.acme.app.WonderPushNotificationServiceExtension";

  fn installed(ws: &Workspace) -> (Project, String) {
    let project = ws.load();
    let id = project.find_target_by_name(EXTENSION_NAME).unwrap().id.to_string();
    (project, id)
  }

  #[test]
  fn installs_the_extension() {
    let ws   = Workspace::new();
    let pods = RecordingPods::default();
    let outcome = install(&ws.context(), &pods).unwrap();

    assert_eq!(outcome, Outcome::Installed(vec![("Debug",   DEBUG_ID.to_string()),
                                                 ("Release", RELEASE_ID.to_string())]));

    let (project, target) = installed(&ws);
    assert_eq!(project.bundle_identifier_of(&target, "Debug"), Some(DEBUG_ID));
    assert_eq!(project.bundle_identifier_of(&target, "Release"), Some(RELEASE_ID));

    let sources = project.native_targets()[&target].ids("buildPhases")
      .find_map(|id| project.sources_build_phases().get(id))
      .unwrap();
    assert_eq!(sources.array("files").len(), 1);
    assert_eq!(sources.array("files")[0].comment(), Some("NotificationService.m in Sources"));

    let group = project.group_by_name(EXTENSION_NAME).unwrap();
    assert_eq!(group.object.str("path"), Some(EXTENSION_NAME));
    let main = project.main_group_id().unwrap();
    assert!(project.groups()[main].ids("children").any(|id| id == group.id));

    for name in TEMPLATE_FILES {
      assert!(ws.extension_dir().join(name).is_file(), "{} was not copied", name);
    }

    assert_eq!(ws.podfile(), [PODFILE, "\n", PODFILE_SNIPPET].join(""));
    assert_eq!(*pods.calls.borrow(), vec![ws.platform_dir()]);
  }

  #[test]
  fn configurations_inherit_signing_and_settings() {
    let ws = Workspace::new();
    install(&ws.context(), &RecordingPods::default()).unwrap();
    let (project, target) = installed(&ws);

    for env in ENVIRONMENTS {
      let cfg = project.build_configuration_of(&target, env).unwrap();
      let settings = cfg.object.dict("buildSettings").unwrap();
      let app = project.build_configuration_of(APP_TARGET, env).unwrap()
        .object.dict("buildSettings").unwrap();

      for (key, value) in app.iter().filter(|(k, _)| is_signing_setting(k)) {
        assert_eq!(settings.get(key), Some(value), "{} {}", env, key);
      }
      assert_eq!(settings["DEVELOPMENT_TEAM"].as_str(), Some("ABCDE12345"));
      assert_eq!(settings["PRODUCT_NAME"].as_str(), Some("$(TARGET_NAME)"));

      let keys: Vec<_> = settings.keys().collect();
      let mut sorted = keys.clone();
      sorted.sort();
      assert_eq!(keys, sorted);

      let base = cfg.object.get("baseConfigurationReference").unwrap();
      assert_eq!(base.comment(), Some(xcconfig_name(env).as_str()));
      assert!(project.file_references().contains_key(base.as_str().unwrap()));
    }

    let debug = project.build_configuration_of(&target, "Debug").unwrap();
    assert_eq!(debug.object.dict("buildSettings").unwrap()["COPY_PHASE_STRIP"].as_str(), Some("NO"));
  }

  #[test]
  fn configuration_ids_sort_among_the_others() {
    let ws = Workspace::new();
    install(&ws.context(), &RecordingPods::default()).unwrap();
    let (project, target) = installed(&ws);

    let ours: Vec<_> = project.build_configurations_of(&target).iter().map(|c| c.id).collect();
    let others: Vec<_> = project.build_configurations()
      .keys()
      .map(String::as_str)
      .filter(|id| !ours.contains(id))
      .collect();
    let min = others.iter().min().unwrap();
    let max = others.iter().max().unwrap();

    assert_eq!(ours.len(), 2);
    for id in ours {
      assert!(min <= &id && &id <= max, "{} not in [{}, {}]", id, min, max);
    }
  }

  #[test]
  fn second_run_changes_nothing() {
    let ws   = Workspace::new();
    let pods = RecordingPods::default();
    install(&ws.context(), &pods).unwrap();
    let first   = ws.pbxproj();
    let podfile = ws.podfile();

    assert_eq!(install(&ws.context(), &pods).unwrap(), Outcome::Reconciled(0));
    assert_eq!(ws.pbxproj(), first);
    assert_eq!(ws.podfile(), podfile);
    assert_eq!(pods.calls.borrow().len(), 1);
  }

  #[test]
  fn reconciles_bundle_identifiers() {
    let ws = Workspace::new();
    install(&ws.context(), &RecordingPods::default()).unwrap();

    let mut project = ws.load();
    let cfg = project.build_configuration_of(APP_TARGET, "Release").unwrap().id.to_string();
    project.build_configurations_mut().get_mut(&cfg).unwrap()
      .dict_mut("buildSettings")
      .insert(BUNDLE_IDENTIFIER.to_string(), Value::str("com.acme.renamed"));
    project.persist().unwrap();

    assert_eq!(install(&ws.context(), &RecordingPods::default()).unwrap(), Outcome::Reconciled(1));
    let (project, target) = installed(&ws);
    assert_eq!(project.bundle_identifier_of(&target, "Release"),
               Some("com.acme.renamed.WonderPushNotificationServiceExtension"));
    assert_eq!(project.bundle_identifier_of(&target, "Debug"), Some(DEBUG_ID));
  }

  #[test]
  fn reconciling_leaves_foreign_extensions_alone() {
    let ws = Workspace::new();
    install(&ws.context(), &RecordingPods::default()).unwrap();

    let mut project = ws.load();
    let other = project.add_app_extension_target("OtherExtension", APP_TARGET).unwrap().target_id;
    let cfgs: Vec<String> = project.build_configurations_of(&other).iter().map(|c| c.id.to_string()).collect();
    for id in &cfgs {
      project.build_configurations_mut().get_mut(id).unwrap()
        .dict_mut("buildSettings")
        .insert(BUNDLE_IDENTIFIER.to_string(), Value::str("com.other.ext"));
    }
    let app_release = project.build_configuration_of(APP_TARGET, "Release").unwrap().id.to_string();
    project.build_configurations_mut().get_mut(&app_release).unwrap()
      .dict_mut("buildSettings")
      .insert(BUNDLE_IDENTIFIER.to_string(), Value::str("com.acme.renamed"));
    project.persist().unwrap();

    let snapshot = |project: &Project| -> (Object, Vec<Object>) {
      (project.native_targets()[&other].clone(),
       project.build_configurations_of(&other).iter().map(|c| c.object.clone()).collect())
    };
    let before = snapshot(&ws.load());

    assert_eq!(install(&ws.context(), &RecordingPods::default()).unwrap(), Outcome::Reconciled(1));

    let (project, target) = installed(&ws);
    assert_eq!(project.bundle_identifier_of(&target, "Release"),
               Some("com.acme.renamed.WonderPushNotificationServiceExtension"));
    assert_eq!(project.bundle_identifier_of(&other, "Release"), Some("com.other.ext"));
    assert_eq!(snapshot(&project), before);
  }

  #[test]
  fn plugin_dirs_with_pattern_characters() {
    let ws        = Workspace::new();
    let plugin    = ws.root().join("plug[in]");
    let templates = plugin.join(TEMPLATE_DIR);
    let shipped   = Path::new(env!("CARGO_MANIFEST_DIR")).join(TEMPLATE_DIR);
    fs::create_dir_all(&templates).unwrap();
    for name in TEMPLATE_FILES {
      fs::copy(shipped.join(name), templates.join(name)).unwrap();
    }

    let mut ctx = ws.context();
    ctx.plugin_dir = Some(plugin);
    install(&ctx, &RecordingPods::default()).unwrap();

    for name in TEMPLATE_FILES {
      assert!(ws.extension_dir().join(name).is_file(), "{} was not copied", name);
    }
  }

  #[test]
  fn group_paths_are_relative_to_the_project() {
    assert_eq!(group_path(Path::new("/app/platforms/ios/Ext"), Path::new("/app/platforms/ios")), "Ext");
    assert_eq!(group_path(Path::new("/app/platforms/ios/Ext"), Path::new("/app/platforms/ios/App")),
               "../Ext");
  }

  #[test]
  fn foreign_extensions_are_left_alone() {
    let ws = Workspace::new();
    let mut project = ws.load();
    project.native_targets_mut().insert("0000000000000000000000AA".to_string(),
      Object::new("PBXNativeTarget")
        .commented("OtherExtension")
        .with("name", "OtherExtension")
        .with("productType", APP_EXTENSION_TYPE));
    project.persist().unwrap();
    let before = ws.pbxproj();

    let pods = RecordingPods::default();
    assert_eq!(install(&ws.context(), &pods).unwrap(), Outcome::Foreign);
    assert_eq!(ws.pbxproj(), before);
    assert_eq!(ws.podfile(), PODFILE);
    assert!(!ws.extension_dir().exists());
    assert!(pods.calls.borrow().is_empty());
  }

  #[test]
  fn declared_pods_are_not_installed_again() {
    let ws = Workspace::new();
    let podfile = [PODFILE, PODFILE_SNIPPET].join("");
    fs::write(ws.podfile_path(), &podfile).unwrap();

    let pods = RecordingPods::default();
    install(&ws.context(), &pods).unwrap();
    assert_eq!(ws.podfile(), podfile);
    assert!(pods.calls.borrow().is_empty());
  }

  #[test]
  fn pod_install_can_be_disabled() {
    let ws = Workspace::new();
    let mut ctx = ws.context();
    ctx.env.pod_install = false;

    let pods = RecordingPods::default();
    install(&ctx, &pods).unwrap();
    assert!(ws.podfile().contains(PODFILE_SNIPPET));
    assert!(pods.calls.borrow().is_empty());
  }

  #[test]
  fn missing_bundle_identifier_aborts_before_copying() {
    let ws = Workspace::new();
    let mut project = ws.load();
    let cfg = project.build_configuration_of(APP_TARGET, "Debug").unwrap().id.to_string();
    project.build_configurations_mut().get_mut(&cfg).unwrap()
      .dict_mut("buildSettings")
      .shift_remove(BUNDLE_IDENTIFIER);
    project.persist().unwrap();
    let before = ws.pbxproj();

    match install(&ws.context(), &RecordingPods::default()) {
      Err(Error::MissingBundleIdentifier(env)) => assert_eq!(env, "Debug"),
      r => panic!("unexpected result {:?}", r)
    }
    assert!(!ws.extension_dir().exists());
    assert_eq!(ws.pbxproj(), before);
  }

  #[test]
  fn missing_templates_are_reported() {
    let ws = Workspace::new();
    let mut ctx = ws.context();
    ctx.plugin_dir = Some(ws.root().to_path_buf());

    assert!(matches!(install(&ctx, &RecordingPods::default()), Err(Error::MissingTemplate(_))));
  }

  #[test]
  fn missing_xcode_project_is_reported() {
    let ws = Workspace::new();
    fs::remove_dir_all(ws.platform_dir()).unwrap();
    assert!(matches!(install(&ws.context(), &RecordingPods::default()),
                     Err(Error::MissingXcodeProject(_))));
  }

  #[test]
  fn id_ordering_is_bounded() {
    let mut project = fixture();
    let new = project.add_app_extension_target(EXTENSION_NAME, APP_TARGET).unwrap();
    let ours = project.build_configurations_of(&new.target_id)[0].id.to_string();

    // Leave a single other configuration, so the range holds one id.
    for id in &["1D6058950D05DD3E006BFB54", "C01FCF4F08A954540054247B", "C01FCF5008A954540054247B"] {
      project.remove_build_configuration(id);
    }

    match order_configuration_id(&mut project, ours, &new.list_id) {
      Err(Error::IdOrdering { min, max, tries }) => {
        assert_eq!(min, "1D6058940D05DD3E006BFB54");
        assert_eq!(max, min);
        assert_eq!(tries, MAX_ID_RETRIES);
      },
      r => panic!("unexpected result {:?}", r)
    }

    // The configuration is still reachable from its list.
    assert_eq!(project.build_configurations_of(&new.target_id).len(), 2);
  }

  #[test]
  fn ids_already_in_range_are_kept() {
    let mut project = fixture();
    let new = project.add_app_extension_target(EXTENSION_NAME, APP_TARGET).unwrap();
    let debug = project.build_configurations_of(&new.target_id)[0].id.to_string();
    let cfg = project.remove_build_configuration(&debug).unwrap();
    project.configuration_lists_mut().get_mut(&new.list_id).unwrap()
      .array_mut("buildConfigurations").remove(0);

    let id = "1D6058950D05DD3E006BFB55".to_string();
    project.add_build_configuration(id.clone(), cfg);
    project.attach_configuration_to_list(&id, &new.list_id).unwrap();

    assert_eq!(order_configuration_id(&mut project, id.clone(), &new.list_id).unwrap(), id);
  }
}
