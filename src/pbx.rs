//! In-memory model of an Xcode project file.
//!
//! XCode uses the NeXTSTEP property list format. The entire project is stored
//! in a single file named "project.pbxproj", short for Project Builder XCode
//! Project. This file lives in a folder named after the project with the
//! "xcodeproj" extension.
//!
//! This property list format provides the following data types:
//! - String:     "contents" or contents
//! - Array:      ( element, ... )
//! - Dictionary: { key = value; ... }
//!
//! Comments have the form /* contents */ and are optional. XCode writes one
//! after most object identifiers to describe the object; they are kept on the
//! values they follow so a load/save cycle leaves them in place.
//!
//! The file contains a single root dictionary whose "objects" entry maps
//! every object identifier to its properties. Each object has an "isa"
//! property determining its type. Objects are grouped into sections by type
//! here, and each section is ordered by identifier, which is the order XCode
//! itself writes them in:
//!
//! ```text
//! /* Begin <ISA> section */
//! <OBJECT-ID> /* <OBJECT-NAME> */ = <OBJECT-PROPERTIES-DICTIONARY>;
//! ...
//! /* End <ISA> section */
//! ```
//!
//! References:
//! - https://en.wikipedia.org/wiki/Property_list
//! - http://monoobjc.net/xcode-project-file-format.html

mod parse;
mod write;

use indexmap::IndexMap;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ctx::{Error, Result};

pub type Dict    = IndexMap<String, Value>;
pub type Section = BTreeMap<String, Object>;

static EMPTY_SECTION: Section = Section::new();

/// Every build phase type a native target can reference.
pub const BUILD_PHASE_SECTIONS: &[&str] = &[
  "PBXSourcesBuildPhase",
  "PBXResourcesBuildPhase",
  "PBXFrameworksBuildPhase",
  "PBXCopyFilesBuildPhase",
  "PBXShellScriptBuildPhase",
  "PBXHeadersBuildPhase",
  "PBXAppleScriptBuildPhase"
];

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Str(Str),
  Array(Vec<Value>),
  Dict(Dict)
}

/// A string along with the comment following it, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Str {
  pub text:    String,
  pub comment: Option<String>
}

impl Value {
  pub fn str<S: Into<String>>(text: S) -> Self {
    Value::Str(Str { text: text.into(), comment: None })
  }

  /// An object identifier annotated with a display comment.
  pub fn reference<S: Into<String>, C: Into<String>>(id: S, comment: C) -> Self {
    Value::Str(Str { text: id.into(), comment: Some(comment.into()) })
  }

  pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
    Value::Array(items.into_iter().collect())
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(&s.text),
      _             => None
    }
  }

  pub fn as_array(&self) -> Option<&Vec<Value>> {
    match self {
      Value::Array(a) => Some(a),
      _               => None
    }
  }

  pub fn as_dict(&self) -> Option<&Dict> {
    match self {
      Value::Dict(d) => Some(d),
      _              => None
    }
  }

  pub fn comment(&self) -> Option<&str> {
    match self {
      Value::Str(s) => s.comment.as_deref(),
      _             => None
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::str(s)
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::str(s)
  }
}

impl From<Dict> for Value {
  fn from(d: Dict) -> Self {
    Value::Dict(d)
  }
}

/// A single entry of the "objects" dictionary.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
  pub comment: Option<String>,
  pub props:   Dict
}

impl Object {
  pub fn new(isa: &str) -> Self {
    let mut props = Dict::new();
    props.insert("isa".to_string(), Value::str(isa));
    Object { comment: None, props }
  }

  pub fn commented<S: Into<String>>(mut self, comment: S) -> Self {
    self.comment = Some(comment.into());
    self
  }

  pub fn with<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
    self.set(key, value);
    self
  }

  pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) {
    self.props.insert(key.to_string(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.props.get(key)
  }

  pub fn str(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(Value::as_str)
  }

  /// The array stored under `key`, empty when missing.
  pub fn array(&self, key: &str) -> &[Value] {
    self.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
  }

  /// The array stored under `key`, created when missing.
  pub fn array_mut(&mut self, key: &str) -> &mut Vec<Value> {
    let v = self.props.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if v.as_array().is_none() {
      *v = Value::Array(Vec::new());
    }
    match v {
      Value::Array(a) => a,
      _               => unreachable!()
    }
  }

  pub fn dict(&self, key: &str) -> Option<&Dict> {
    self.get(key).and_then(Value::as_dict)
  }

  /// The dictionary stored under `key`, created when missing.
  pub fn dict_mut(&mut self, key: &str) -> &mut Dict {
    let v = self.props.entry(key.to_string()).or_insert_with(|| Value::Dict(Dict::new()));
    if v.as_dict().is_none() {
      *v = Value::Dict(Dict::new());
    }
    match v {
      Value::Dict(d) => d,
      _              => unreachable!()
    }
  }

  /// Identifiers listed in the array stored under `key`.
  pub fn ids<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
    self.array(key).iter().filter_map(Value::as_str)
  }
}

/// A parsed "project.pbxproj" file.
pub struct Document {
  path:    PathBuf,
  root:    Dict,
  objects: BTreeMap<String, Section>,
  rng:     StdRng
}

macro_rules! sections {
  ($($isa:literal => $get:ident, $get_mut:ident;)*) => {
    impl Document {
      $(
        pub fn $get(&self) -> &Section {
          self.section($isa)
        }

        pub fn $get_mut(&mut self) -> &mut Section {
          self.section_mut($isa)
        }
      )*
    }
  };
}

sections! {
  "PBXBuildFile"           => build_files,             build_files_mut;
  "PBXContainerItemProxy"  => container_item_proxies,  container_item_proxies_mut;
  "PBXFileReference"       => file_references,         file_references_mut;
  "PBXGroup"               => groups,                  groups_mut;
  "PBXNativeTarget"        => native_targets,          native_targets_mut;
  "PBXProject"             => projects,                projects_mut;
  "PBXSourcesBuildPhase"   => sources_build_phases,    sources_build_phases_mut;
  "PBXCopyFilesBuildPhase" => copy_files_build_phases, copy_files_build_phases_mut;
  "PBXTargetDependency"    => target_dependencies,     target_dependencies_mut;
  "XCBuildConfiguration"   => build_configurations,    build_configurations_mut;
  "XCConfigurationList"    => configuration_lists,     configuration_lists_mut;
}

impl Document {
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    Self::parse(&text, path)
  }

  pub fn parse<P: Into<PathBuf>>(text: &str, path: P) -> Result<Self> {
    let path = path.into();
    let parsed = parse::parse(text).map_err(|e| Error::Parse {
      path:    path.clone(),
      line:    e.line,
      message: e.message
    })?;

    let mut objects = BTreeMap::<String, Section>::new();
    for (key, value) in parsed.objects {
      let props = match value {
        Value::Dict(d) => d,
        _ => return Err(Error::Parse {
          path,
          line:    0,
          message: format!("object {} is not a dictionary", key.text)
        })
      };

      let isa = match props.get("isa").and_then(Value::as_str) {
        Some(x) => x.to_string(),
        None    => return Err(Error::Parse {
          path,
          line:    0,
          message: format!("object {} has no isa", key.text)
        })
      };

      objects.entry(isa).or_default().insert(key.text, Object { comment: key.comment, props });
    }

    Ok(Document {
      path,
      root: parsed.root,
      objects,
      rng:  StdRng::from_entropy()
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Identifier of the PBXProject object.
  pub fn root_object_id(&self) -> Option<&str> {
    self.root.get("rootObject").and_then(Value::as_str)
  }

  /// Objects of the given type; empty when the document has none.
  pub fn section(&self, isa: &str) -> &Section {
    self.objects.get(isa).unwrap_or(&EMPTY_SECTION)
  }

  pub fn section_mut(&mut self, isa: &str) -> &mut Section {
    self.objects.entry(isa.to_string()).or_default()
  }

  pub fn contains_id(&self, id: &str) -> bool {
    self.objects.values().any(|s| s.contains_key(id))
  }

  /// Returns a fresh 96-bit identifier not used by any object.
  ///
  /// Identifiers are fully random: anything ordering them by creation time
  /// would make new objects always sort last.
  pub fn generate_id(&mut self) -> String {
    loop {
      let mut bytes = [0u8; 12];
      self.rng.fill_bytes(&mut bytes);

      let mut id = String::with_capacity(24);
      for b in &bytes {
        id.push(hex_char(b >> 4));
        id.push(hex_char(b & 0xF));
      }

      if !self.contains_id(&id) {
        return id;
      }
    }
  }

  /// Writes the document back to the file it was loaded from.
  pub fn save(&self) -> Result<()> {
    std::fs::write(&self.path, self.to_string())?;
    Ok(())
  }
}

impl fmt::Display for Document {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write::write_document(f, &self.root, &self.objects)
  }
}

fn hex_char(b: u8) -> char {
  match b < 10 {
    true  => (b'0' + b)        as char,
    false => (b'A' + (b - 10)) as char
  }
}

/// Strips one pair of surrounding double quotes.
pub fn unquote(s: &str) -> &str {
  match s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
    true  => &s[1 .. s.len() - 1],
    false => s
  }
}
