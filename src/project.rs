//! Lookups and edits over a loaded [`Document`].
//!
//! Nothing here caches object data: every query walks the document as it is
//! now, so reads observe earlier edits. Lookups return `None` when a link in
//! the chain is missing and leave it to the caller to decide whether that is
//! fatal.

mod create;
mod edit;

use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::pbx::{BUILD_PHASE_SECTIONS, Document, Object, Value, unquote};

pub use create::NewTarget;

pub const APPLICATION_TYPE:   &str = "com.apple.product-type.application";
pub const APP_EXTENSION_TYPE: &str = "com.apple.product-type.app-extension";

pub const BUNDLE_IDENTIFIER: &str = "PRODUCT_BUNDLE_IDENTIFIER";

/// An object along with the identifier it is stored under.
#[derive(Clone, Copy, Debug)]
pub struct Entry<'a> {
  pub id:     &'a str,
  pub object: &'a Object
}

impl<'a> Entry<'a> {
  pub fn name(&self) -> Option<&'a str> {
    self.object.str("name")
  }
}

pub struct Project {
  doc: Document
}

impl Deref for Project {
  type Target = Document;

  fn deref(&self) -> &Document {
    &self.doc
  }
}

impl DerefMut for Project {
  fn deref_mut(&mut self) -> &mut Document {
    &mut self.doc
  }
}

fn entries<'a>(section: &'a crate::pbx::Section) -> impl Iterator<Item = Entry<'a>> {
  section.iter().map(|(id, object)| Entry { id, object })
}

impl Project {
  pub fn new(doc: Document) -> Self {
    Project { doc }
  }

  /// Writes the project back to disk.
  pub fn persist(&self) -> crate::ctx::Result<()> {
    tracing::debug!("Writing {}", self.doc.path().display());
    self.doc.save()
  }

  /// Directory holding the .xcodeproj, the root of relative group paths.
  pub fn source_root(&self) -> Option<&Path> {
    self.doc.path().parent()?.parent()
  }

  pub fn find_targets_by_product_type(&self, product_type: &str) -> Vec<Entry<'_>> {
    entries(self.native_targets())
      .filter(|t| t.object.str("productType").map(unquote) == Some(unquote(product_type)))
      .collect()
  }

  pub fn find_target_by_name(&self, name: &str) -> Option<Entry<'_>> {
    entries(self.native_targets()).find(|t| t.name().map(unquote) == Some(unquote(name)))
  }

  /// The first application target, which owns the app's bundle identifier.
  pub fn app_target_id(&self) -> Option<&str> {
    self.find_targets_by_product_type(APPLICATION_TYPE).first().map(|t| t.id)
  }

  pub fn configuration_list_of(&self, target_id: &str) -> Option<&str> {
    self.native_targets().get(target_id)?.str("buildConfigurationList")
  }

  /// Build configurations reachable from the target, in list order.
  pub fn build_configurations_of(&self, target_id: &str) -> Vec<Entry<'_>> {
    let list = match self.configuration_list_of(target_id)
      .and_then(|id| self.configuration_lists().get(id))
    {
      Some(x) => x,
      None    => return Vec::new()
    };

    let cfgs = self.build_configurations();
    list.ids("buildConfigurations")
      .filter_map(|id| cfgs.get_key_value(id))
      .map(|(id, object)| Entry { id, object })
      .collect()
  }

  pub fn build_configuration_of(&self, target_id: &str, environment: &str) -> Option<Entry<'_>> {
    self.build_configurations_of(target_id)
      .into_iter()
      .find(|c| c.name() == Some(environment))
  }

  /// Every build configuration, whatever owns it, in id order.
  pub fn all_build_configurations(&self) -> Vec<Entry<'_>> {
    entries(self.build_configurations()).collect()
  }

  pub fn bundle_identifier_of(&self, target_id: &str, environment: &str) -> Option<&str> {
    self.build_configuration_of(target_id, environment)?
      .object
      .dict("buildSettings")?
      .get(BUNDLE_IDENTIFIER)?
      .as_str()
  }

  fn root_object(&self) -> Option<&Object> {
    self.projects().get(self.root_object_id()?)
  }

  pub fn main_group_id(&self) -> Option<&str> {
    self.root_object()?.str("mainGroup")
  }

  pub fn products_group_id(&self) -> Option<&str> {
    self.root_object()?.str("productRefGroup")
  }

  /// First file reference whose name, or path when it has none, matches.
  pub fn find_file_by_name(&self, name: &str) -> Option<Entry<'_>> {
    let name = unquote(name);
    entries(self.file_references())
      .find(|f| f.object.str("name").or_else(|| f.object.str("path")).map(unquote) == Some(name))
  }

  /// Groups are matched on their display comment, name or path.
  pub fn group_by_name(&self, name: &str) -> Option<Entry<'_>> {
    let name = unquote(name);
    entries(self.groups()).find(|g| {
      g.object.comment.as_deref() == Some(name)
        || g.object.str("name").map(unquote) == Some(name)
        || g.object.str("path").map(unquote) == Some(name)
    })
  }

  pub fn build_file_id_for_file_ref(&self, file_ref_id: &str) -> Option<&str> {
    entries(self.build_files())
      .find(|b| b.object.str("fileRef") == Some(file_ref_id))
      .map(|b| b.id)
  }

  /// Looks a build phase up in every build phase section.
  pub fn build_phase_by_id(&self, id: &str) -> Option<(&'static str, &Object)> {
    BUILD_PHASE_SECTIONS.iter()
      .find_map(|&isa| self.section(isa).get(id).map(|phase| (isa, phase)))
  }

  /// Files of a group, as (file id, unquoted path) pairs.
  pub fn group_files(&self, group_id: &str) -> Vec<(String, String)> {
    let group = match self.groups().get(group_id) {
      Some(x) => x,
      None    => return Vec::new()
    };

    let files = self.file_references();
    group.ids("children")
      .filter_map(|id| files.get(id).map(|f| (id, f)))
      .filter_map(|(id, f)| f.str("path").map(|p| (id.to_string(), unquote(p).to_string())))
      .collect()
  }
}

/// A reference to `id` annotated with the display name of the object.
pub(crate) fn reference_to(object: &Object, id: &str) -> Value {
  match object.comment.as_deref().or_else(|| object.str("name")) {
    Some(c) => Value::reference(id, c),
    None    => Value::str(id)
  }
}
