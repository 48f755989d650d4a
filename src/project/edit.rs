//! In-memory edits. Callers persist the project explicitly.

use std::collections::BTreeSet;

use super::{Project, reference_to};
use crate::pbx::{BUILD_PHASE_SECTIONS, Object, Value};

/// Name XCode gives to the phase copying app extensions into the app bundle.
pub const EMBED_APP_EXTENSIONS: &str = "Embed App Extensions";

/// Removes every entry of `list` referencing `id`, returns whether any was.
fn strip_id(list: &mut Vec<Value>, id: &str) -> bool {
  let len = list.len();
  list.retain(|x| x.as_str() != Some(id));
  list.len() != len
}

impl Project {
  pub fn remove_build_configuration(&mut self, id: &str) -> Option<Object> {
    self.build_configurations_mut().remove(id)
  }

  pub fn remove_build_configuration_list(&mut self, id: &str) -> Option<Object> {
    self.configuration_lists_mut().remove(id)
  }

  pub fn detach_configuration_from_list(&mut self, config_id: &str, list_id: &str) {
    if let Some(list) = self.configuration_lists_mut().get_mut(list_id) {
      strip_id(list.array_mut("buildConfigurations"), config_id);
    }
  }

  pub fn add_build_configuration(&mut self, id: String, configuration: Object) {
    self.build_configurations_mut().insert(id, configuration);
  }

  /// Appends a configuration to a list; `None` when either is missing.
  pub fn attach_configuration_to_list(&mut self, config_id: &str, list_id: &str) -> Option<()> {
    let reference = reference_to(self.build_configurations().get(config_id)?, config_id);
    let list = self.configuration_lists_mut().get_mut(list_id)?;
    list.array_mut("buildConfigurations").push(reference);
    Some(())
  }

  pub fn remove_file(&mut self, id: &str) -> Option<Object> {
    self.file_references_mut().remove(id)
  }

  pub fn remove_build_file(&mut self, id: &str) -> Option<Object> {
    self.build_files_mut().remove(id)
  }

  pub fn add_child_to_group(&mut self, child_id: &str, comment: &str, group_id: &str) -> Option<()> {
    let group = self.groups_mut().get_mut(group_id)?;
    group.array_mut("children").push(Value::reference(child_id, comment));
    Some(())
  }

  pub fn remove_child_from_group(&mut self, child_id: &str, group_id: &str) -> bool {
    match self.groups_mut().get_mut(group_id) {
      Some(group) => strip_id(group.array_mut("children"), child_id),
      None        => false
    }
  }

  pub fn remove_file_from_all_groups(&mut self, id: &str) {
    for group in self.groups_mut().values_mut() {
      if group.get("children").is_some() {
        strip_id(group.array_mut("children"), id);
      }
    }
  }

  pub fn remove_group(&mut self, id: &str) -> Option<Object> {
    self.groups_mut().remove(id)
  }

  pub fn remove_target(&mut self, id: &str) -> Option<Object> {
    self.native_targets_mut().remove(id)
  }

  pub fn remove_build_phase(&mut self, section: &str, id: &str) -> Option<Object> {
    self.section_mut(section).remove(id)
  }

  /// Strips the target from every PBXProject, there is normally only one.
  pub fn remove_target_from_all_project_roots(&mut self, target_id: &str) {
    for project in self.projects_mut().values_mut() {
      if project.get("targets").is_some() {
        strip_id(project.array_mut("targets"), target_id);
      }
    }
  }

  /// Deletes every dependency on the target along with its item proxy.
  pub fn remove_target_from_all_dependencies(&mut self, target_id: &str) {
    let deps: Vec<(String, Option<String>)> = self.target_dependencies()
      .iter()
      .filter(|(_, dep)| dep.str("target") == Some(target_id))
      .map(|(id, dep)| (id.clone(), dep.str("targetProxy").map(String::from)))
      .collect();

    for (dep_id, proxy_id) in deps {
      tracing::debug!("Removing target dependency {}", dep_id);
      self.target_dependencies_mut().remove(&dep_id);

      if let Some(proxy) = proxy_id {
        self.container_item_proxies_mut().remove(&proxy);
      }

      for target in self.native_targets_mut().values_mut() {
        if target.get("dependencies").is_some() {
          strip_id(target.array_mut("dependencies"), &dep_id);
        }
      }
    }
  }

  /// Drops the given build files from every build phase. An embedding phase
  /// left empty is removed along with its reference from the owning target.
  pub fn remove_build_files_from_all_phases(&mut self, ids: &BTreeSet<String>) {
    let mut emptied = Vec::new();

    for &isa in BUILD_PHASE_SECTIONS {
      for (phase_id, phase) in self.section_mut(isa).iter_mut() {
        if phase.get("files").is_none() {
          continue;
        }

        let files = phase.array_mut("files");
        let len = files.len();
        files.retain(|f| f.as_str().map_or(true, |id| !ids.contains(id)));

        if files.len() != len && files.is_empty()
          && phase.str("name") == Some(EMBED_APP_EXTENSIONS)
        {
          emptied.push((isa, phase_id.clone()));
        }
      }
    }

    for (isa, phase_id) in emptied {
      tracing::debug!("Removing empty {} phase {}", EMBED_APP_EXTENSIONS, phase_id);
      self.remove_build_phase(isa, &phase_id);
      for target in self.native_targets_mut().values_mut() {
        if target.get("buildPhases").is_some() {
          strip_id(target.array_mut("buildPhases"), &phase_id);
        }
      }
    }
  }
}
