use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::*;
use crate::ctx::{Context, Error, Result};
use crate::pbx::unquote;
use crate::podfile;
use crate::project::Project;

/// What an uninstall run changed.
#[derive(Debug, Default)]
pub struct Report {
  pub podfile_patched: bool,
  pub target_removed:  bool,
  pub deleted:         Vec<PathBuf>
}

pub fn uninstall(ctx: &Context) -> Result<Report> {
  let mut report = Report::default();

  let podfile_path = ctx.podfile_path()?;
  report.podfile_patched = podfile::remove_snippet(&podfile_path)?;
  if report.podfile_patched {
    info!("Removed {} from {}", EXTENSION_NAME, podfile_path.display());
  }

  let mut project = match ctx.read_project() {
    Ok(x)  => x,
    Err(e) => {
      debug!("Nothing to uninstall: {}", e);
      return Ok(report);
    }
  };

  let platform_dir = ctx.platform_dir()?;
  let paths = match remove_extension(&mut project, &platform_dir) {
    Some(x) => x,
    None    => {
      debug!("No {} target in the project", EXTENSION_NAME);
      return Ok(report);
    }
  };

  project.persist()?;
  report.target_removed = true;
  info!("Removed the {} target", EXTENSION_NAME);

  report.deleted = delete_files(&paths)?;
  Ok(report)
}

/// Removes the target and everything hanging off it. Returns the on-disk
/// files of its group, or `None` when there is no such target.
fn remove_extension(project: &mut Project, platform_dir: &Path) -> Option<BTreeSet<PathBuf>> {
  let target_id = project.find_target_by_name(EXTENSION_NAME)?.id.to_string();

  let source_root = project.source_root().unwrap_or(platform_dir).to_path_buf();

  let mut build_files = BTreeSet::new();
  let mut paths       = BTreeSet::new();

  if let Some(list_id) = project.configuration_list_of(&target_id).map(String::from) {
    let cfgs: Vec<String> = project.configuration_lists()
      .get(&list_id)
      .map(|l| l.ids("buildConfigurations").map(String::from).collect())
      .unwrap_or_default();

    for id in &cfgs {
      project.remove_build_configuration(id);
    }
    project.remove_build_configuration_list(&list_id);
  }

  let phases: Vec<String> = project.native_targets()
    .get(&target_id)
    .map(|t| t.ids("buildPhases").map(String::from).collect())
    .unwrap_or_default();

  for phase_id in &phases {
    let section = match project.build_phase_by_id(phase_id) {
      Some((section, phase)) => {
        build_files.extend(phase.ids("files").map(String::from));
        section
      },
      None => continue
    };
    project.remove_build_phase(section, phase_id);
  }

  if let Some(group_id) = project.group_by_name(EXTENSION_NAME).map(|g| g.id.to_string()) {
    let (group_path, children) = match project.groups().get(&group_id) {
      Some(g) => (g.str("path").map(unquote).unwrap_or_default().to_string(),
                  g.ids("children").map(String::from).collect::<Vec<_>>()),
      None    => (String::new(), Vec::new())
    };

    for child in &children {
      if let Some(path) = project.file_references().get(child).and_then(|f| f.str("path")) {
        paths.insert(source_root.join(&group_path).join(unquote(path)));
      }

      project.remove_file(child);
      if let Some(id) = project.build_file_id_for_file_ref(child) {
        build_files.insert(id.to_string());
      }
    }

    match project.main_group_id().map(String::from) {
      Some(main) => { project.remove_child_from_group(&group_id, &main); },
      None       => project.remove_file_from_all_groups(&group_id)
    }
    project.remove_group(&group_id);
  }

  project.remove_target(&target_id);
  project.remove_target_from_all_project_roots(&target_id);
  project.remove_target_from_all_dependencies(&target_id);

  let product = [EXTENSION_NAME, ".appex"].join("");
  if let Some(file_id) = project.find_file_by_name(&product).map(|f| f.id.to_string()) {
    project.remove_file_from_all_groups(&file_id);
    if let Some(id) = project.build_file_id_for_file_ref(&file_id) {
      build_files.insert(id.to_string());
    }
    project.remove_file(&file_id);
  }

  project.remove_build_files_from_all_phases(&build_files);
  for id in &build_files {
    project.remove_build_file(id);
  }

  Some(paths)
}

/// Deletes every file, then the directories left empty. Failures do not stop
/// the batch; they are counted into a single error at the end.
fn delete_files(paths: &BTreeSet<PathBuf>) -> Result<Vec<PathBuf>> {
  let mut deleted  = Vec::new();
  let mut failures = 0;

  for path in paths {
    match fs::remove_file(path) {
      Ok(()) => {
        debug!("Deleted {}", path.display());
        deleted.push(path.clone());
      },
      Err(e) if e.kind() == ErrorKind::NotFound => debug!("{} is already gone", path.display()),
      Err(e) => {
        warn!("Failed to delete {}: {}", path.display(), e);
        failures += 1;
      }
    }
  }

  let dirs: BTreeSet<&Path> = deleted.iter().filter_map(|p| p.parent()).collect();
  for dir in dirs {
    if fs::remove_dir(dir).is_ok() {
      debug!("Deleted {}", dir.display());
    }
  }

  match failures {
    0 => Ok(deleted),
    n => Err(Error::FileRemoval(n))
  }
}
