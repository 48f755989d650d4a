use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Formatter, Result, Write};

use super::{Dict, Section, Value};

/// Object types XCode writes on a single line.
const FLAT_SECTIONS: &[&str] = &["PBXBuildFile", "PBXFileReference"];

/// Quotes a string unless XCode would leave it bare.
pub fn quote(s: &str) -> Cow<'_, str> {
  let bare = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "_$/:.".contains(c));
  if bare {
    return Cow::Borrowed(s);
  }

  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '"'  => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      c    => out.push(c)
    }
  }
  out.push('"');
  Cow::Owned(out)
}

pub(super) fn write_document(f: &mut Formatter, root: &Dict,
                             objects: &BTreeMap<String, Section>) -> Result
{
  f.write_str("// !$*UTF8*$!\n{\n")?;

  for (key, value) in root {
    if key != "objects" {
      write!(f, "\t{} = ", quote(key))?;
      write_value(f, value, 1, false)?;
      f.write_str(";\n")?;
      continue;
    }

    f.write_str("\tobjects = {\n")?;

    for (isa, section) in objects.iter().filter(|(_, s)| !s.is_empty()) {
      let flat = FLAT_SECTIONS.contains(&isa.as_str());
      write!(f, "\n/* Begin {} section */\n", isa)?;

      for (id, object) in section {
        f.write_str("\t\t")?;
        write_str(f, id, object.comment.as_deref())?;
        f.write_str(" = ")?;
        write_dict(f, &object.props, 2, flat)?;
        f.write_str(";\n")?;
      }

      write!(f, "/* End {} section */\n", isa)?;
    }

    f.write_str("\t};\n")?;
  }

  f.write_str("}\n")
}

fn write_str(f: &mut Formatter, text: &str, comment: Option<&str>) -> Result {
  f.write_str(&quote(text))?;
  if let Some(c) = comment {
    write!(f, " /* {} */", c)?;
  }
  Ok(())
}

fn write_value(f: &mut Formatter, value: &Value, indent: usize, flat: bool) -> Result {
  match value {
    Value::Str(s)   => write_str(f, &s.text, s.comment.as_deref()),
    Value::Dict(d)  => write_dict(f, d, indent, flat),
    Value::Array(a) => {
      f.write_char('(')?;
      for item in a {
        match flat {
          true  => {
            write_value(f, item, indent + 1, flat)?;
            f.write_str(", ")?;
          },
          false => {
            f.write_char('\n')?;
            tabs(f, indent + 1)?;
            write_value(f, item, indent + 1, flat)?;
            f.write_char(',')?;
          }
        }
      }
      if !flat {
        f.write_char('\n')?;
        tabs(f, indent)?;
      }
      f.write_char(')')
    }
  }
}

fn write_dict(f: &mut Formatter, dict: &Dict, indent: usize, flat: bool) -> Result {
  f.write_char('{')?;
  for (key, value) in dict {
    match flat {
      true  => {
        write!(f, "{} = ", quote(key))?;
        write_value(f, value, indent + 1, flat)?;
        f.write_str("; ")?;
      },
      false => {
        f.write_char('\n')?;
        tabs(f, indent + 1)?;
        write!(f, "{} = ", quote(key))?;
        write_value(f, value, indent + 1, flat)?;
        f.write_char(';')?;
      }
    }
  }
  if !flat {
    f.write_char('\n')?;
    tabs(f, indent)?;
  }
  f.write_char('}')
}

fn tabs(f: &mut Formatter, n: usize) -> Result {
  for _ in 0..n {
    f.write_char('\t')?;
  }
  Ok(())
}
