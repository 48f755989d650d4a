//! Reader for the old-style (NeXTSTEP) property list subset used by XCode.

use super::{Dict, Str, Value};

pub(super) struct ParseError {
  pub line:    usize,
  pub message: String
}

pub(super) struct Parsed {
  /// Root entries, with an empty placeholder where "objects" appeared.
  pub root:    Dict,
  pub objects: Vec<(Str, Value)>
}

type PResult<T> = Result<T, ParseError>;

pub(super) fn parse(text: &str) -> PResult<Parsed> {
  let mut p = Parser { src: text, pos: 0 };
  let mut root    = Dict::new();
  let mut objects = Vec::new();

  p.skip_trivia()?;
  p.expect(b'{')?;
  loop {
    p.skip_trivia()?;
    if p.eat(b'}') {
      break;
    }

    let key = p.string()?;
    p.skip_trivia()?;
    p.expect(b'=')?;

    // Object keys carry the object comments, keep them around.
    if key.text == "objects" {
      objects = p.entries()?;
      root.insert(key.text, Value::Dict(Dict::new()));
    }
    else {
      let value = p.value()?;
      root.insert(key.text, value);
    }

    p.skip_trivia()?;
    p.expect(b';')?;
  }

  p.skip_trivia()?;
  if p.pos < p.src.len() {
    return Err(p.error("unexpected data after the root dictionary"));
  }

  Ok(Parsed { root, objects })
}

struct Parser<'a> {
  src: &'a str,
  pos: usize
}

impl<'a> Parser<'a> {
  fn rest(&self) -> &'a str {
    &self.src[self.pos ..]
  }

  fn peek(&self) -> Option<u8> {
    self.src.as_bytes().get(self.pos).cloned()
  }

  fn eat(&mut self, c: u8) -> bool {
    match self.peek() == Some(c) {
      true  => { self.pos += 1; true },
      false => false
    }
  }

  fn expect(&mut self, c: u8) -> PResult<()> {
    match self.eat(c) {
      true  => Ok(()),
      false => Err(self.error(format!("expected '{}'", c as char)))
    }
  }

  fn error<S: Into<String>>(&self, message: S) -> ParseError {
    ParseError {
      line:    self.src[.. self.pos].matches('\n').count() + 1,
      message: message.into()
    }
  }

  fn skip_whitespace(&mut self) {
    let rest = self.rest();
    self.pos += rest.len() - rest.trim_start().len();
  }

  fn skip_trivia(&mut self) -> PResult<()> {
    loop {
      self.skip_whitespace();
      let rest = self.rest();
      if rest.starts_with("/*") {
        self.block_comment()?;
      }
      else if rest.starts_with("//") {
        self.pos += rest.find('\n').unwrap_or_else(|| rest.len());
      }
      else {
        return Ok(());
      }
    }
  }

  fn block_comment(&mut self) -> PResult<&'a str> {
    let rest = self.rest();
    match rest[2 ..].find("*/") {
      None      => Err(self.error("unterminated comment")),
      Some(end) => {
        self.pos += end + 4;
        Ok(rest[2 .. end + 2].trim())
      }
    }
  }

  /// Comment directly following a value, before its delimiter.
  fn trailing_comment(&mut self) -> PResult<Option<String>> {
    self.skip_whitespace();
    match self.rest().starts_with("/*") {
      true  => Ok(Some(self.block_comment()?.to_string())),
      false => Ok(None)
    }
  }

  fn value(&mut self) -> PResult<Value> {
    self.skip_trivia()?;
    match self.peek() {
      Some(b'{') => Ok(Value::Dict(self.dict()?)),
      Some(b'(') => Ok(Value::Array(self.array()?)),
      _          => Ok(Value::Str(self.string()?))
    }
  }

  fn entries(&mut self) -> PResult<Vec<(Str, Value)>> {
    let mut entries = Vec::new();
    self.skip_trivia()?;
    self.expect(b'{')?;
    loop {
      self.skip_trivia()?;
      if self.eat(b'}') {
        return Ok(entries);
      }

      let key = self.string()?;
      self.skip_trivia()?;
      self.expect(b'=')?;
      let value = self.value()?;
      self.skip_trivia()?;
      self.expect(b';')?;
      entries.push((key, value));
    }
  }

  fn dict(&mut self) -> PResult<Dict> {
    Ok(self.entries()?.into_iter().map(|(k, v)| (k.text, v)).collect())
  }

  fn array(&mut self) -> PResult<Vec<Value>> {
    let mut items = Vec::new();
    self.expect(b'(')?;
    loop {
      self.skip_trivia()?;
      if self.eat(b')') {
        return Ok(items);
      }

      items.push(self.value()?);
      self.skip_trivia()?;
      if !self.eat(b',') && self.peek() != Some(b')') {
        return Err(self.error("expected ',' or ')'"));
      }
    }
  }

  fn string(&mut self) -> PResult<Str> {
    self.skip_trivia()?;
    let text = match self.peek() {
      Some(b'"') => self.quoted()?,
      _          => self.bare()?
    };
    let comment = self.trailing_comment()?;
    Ok(Str { text, comment })
  }

  fn bare(&mut self) -> PResult<String> {
    let rest = self.rest();
    let len = rest.bytes()
      .enumerate()
      .find(|&(i, c)| {
        c.is_ascii_whitespace() || b"{}()=;,\"".contains(&c)
          || (c == b'/' && rest.as_bytes().get(i + 1) == Some(&b'*'))
      })
      .map(|(i, _)| i)
      .unwrap_or_else(|| rest.len());

    if len == 0 {
      return Err(self.error("expected a value"));
    }

    self.pos += len;
    Ok(rest[.. len].to_string())
  }

  fn quoted(&mut self) -> PResult<String> {
    self.pos += 1;
    let mut out   = String::new();
    let mut chars = self.rest().char_indices();
    while let Some((i, c)) = chars.next() {
      match c {
        '"'  => {
          self.pos += i + 1;
          return Ok(out);
        },
        '\\' => match chars.next() {
          Some((_, 'n')) => out.push('\n'),
          Some((_, 't')) => out.push('\t'),
          Some((_, e))   => out.push(e),
          None           => break
        },
        c    => out.push(c)
      }
    }
    Err(self.error("unterminated string"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_nested_values_and_comments() {
    let parsed = parse(concat!("// !$*UTF8*$!\n",
                               "{\n",
                               "\tobjectVersion = 50;\n",
                               "\tobjects = {\n",
                               "\t\tAB /* main.m in Sources */ = {isa = PBXBuildFile; ",
                               "fileRef = CD /* main.m */; };\n",
                               "\t\tEF = {isa = XCBuildConfiguration; buildSettings = {\n",
                               "\t\t\tDEFS = (\"DEBUG=1\", \"$(inherited)\", );\n",
                               "\t\t\tNAME = \"a \\\"b\\\"\";\n",
                               "\t\t}; };\n",
                               "\t};\n",
                               "\trootObject = AB /* Project object */;\n",
                               "}\n")).ok().unwrap();

    assert_eq!(parsed.root.len(), 3);
    assert_eq!(parsed.objects.len(), 2);

    let (key, value) = &parsed.objects[0];
    assert_eq!(key.text, "AB");
    assert_eq!(key.comment.as_deref(), Some("main.m in Sources"));
    let file_ref = &value.as_dict().unwrap()["fileRef"];
    assert_eq!(file_ref.as_str(), Some("CD"));
    assert_eq!(file_ref.comment(), Some("main.m"));

    let settings = value_at(&parsed.objects[1].1, "buildSettings");
    let defs = settings.as_dict().unwrap()["DEFS"].as_array().unwrap();
    assert_eq!(defs[0].as_str(), Some("DEBUG=1"));
    assert_eq!(settings.as_dict().unwrap()["NAME"].as_str(), Some("a \"b\""));
  }

  fn value_at<'a>(v: &'a Value, key: &str) -> &'a Value {
    &v.as_dict().unwrap()[key]
  }

  #[test]
  fn rejects_unterminated_strings() {
    let err = parse("{\n\ta = \"oops;\n}").err().unwrap();
    assert_eq!(err.line, 2);
    assert_eq!(err.message, "unterminated string");
  }
}
