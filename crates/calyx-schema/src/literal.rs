//! A small parser for the JavaScript object-literal subset used by `io`
//! declarations: nested objects, arrays, string/number/boolean/null scalars,
//! identifier or string keys, comments, and trailing commas.
//!
//! The host language has no runtime `eval`, so the extracted `io` source is
//! parsed here into a `serde_json::Value` before being lifted into a typed
//! schema.

use serde_json::{Map, Number, Value};

use crate::error::SchemaError;

/// Parse a JavaScript object literal into a JSON value.
///
/// The input must be a single object literal (leading/trailing whitespace and
/// comments are permitted). Anything beyond the literal subset — function
/// values, computed keys, identifiers in value position — is an error.
pub fn parse_object_literal(source: &str) -> Result<Value, SchemaError> {
  let mut parser = Parser {
    bytes: source.as_bytes(),
    pos: 0,
  };
  parser.skip_trivia();
  let value = parser.parse_object()?;
  parser.skip_trivia();
  if parser.pos != parser.bytes.len() {
    return Err(parser.err("trailing characters after object literal"));
  }
  Ok(value)
}

struct Parser<'a> {
  bytes: &'a [u8],
  pos: usize,
}

impl<'a> Parser<'a> {
  fn err(&self, message: &str) -> SchemaError {
    SchemaError::Literal {
      offset: self.pos,
      message: message.to_string(),
    }
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn bump(&mut self) -> Option<u8> {
    let b = self.peek();
    if b.is_some() {
      self.pos += 1;
    }
    b
  }

  /// Skip whitespace plus `//` and `/* */` comments.
  fn skip_trivia(&mut self) {
    loop {
      while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
        self.pos += 1;
      }
      match (self.peek(), self.bytes.get(self.pos + 1).copied()) {
        (Some(b'/'), Some(b'/')) => {
          while !matches!(self.peek(), None | Some(b'\n')) {
            self.pos += 1;
          }
        }
        (Some(b'/'), Some(b'*')) => {
          self.pos += 2;
          while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.bytes.get(self.pos + 1) == Some(&b'/') {
              self.pos += 2;
              break;
            }
            self.pos += 1;
          }
        }
        _ => return,
      }
    }
  }

  fn expect(&mut self, byte: u8) -> Result<(), SchemaError> {
    if self.peek() == Some(byte) {
      self.pos += 1;
      Ok(())
    } else {
      Err(self.err(&format!("expected '{}'", byte as char)))
    }
  }

  fn parse_value(&mut self) -> Result<Value, SchemaError> {
    self.skip_trivia();
    match self.peek() {
      Some(b'{') => self.parse_object(),
      Some(b'[') => self.parse_array(),
      Some(b'"') | Some(b'\'') | Some(b'`') => Ok(Value::String(self.parse_string()?)),
      Some(b'-') | Some(b'+') | Some(b'0'..=b'9') | Some(b'.') => self.parse_number(),
      Some(c) if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
        let word = self.parse_identifier();
        match word.as_str() {
          "true" => Ok(Value::Bool(true)),
          "false" => Ok(Value::Bool(false)),
          "null" | "undefined" => Ok(Value::Null),
          other => Err(self.err(&format!("unexpected identifier '{}' in value position", other))),
        }
      }
      _ => Err(self.err("expected a value")),
    }
  }

  fn parse_object(&mut self) -> Result<Value, SchemaError> {
    self.expect(b'{')?;
    let mut map = Map::new();
    loop {
      self.skip_trivia();
      if self.peek() == Some(b'}') {
        self.pos += 1;
        return Ok(Value::Object(map));
      }
      let key = match self.peek() {
        Some(b'"') | Some(b'\'') | Some(b'`') => self.parse_string()?,
        Some(c) if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => self.parse_identifier(),
        _ => return Err(self.err("expected a property key")),
      };
      self.skip_trivia();
      self.expect(b':')?;
      let value = self.parse_value()?;
      map.insert(key, value);
      self.skip_trivia();
      match self.peek() {
        Some(b',') => {
          self.pos += 1;
        }
        Some(b'}') => {}
        _ => return Err(self.err("expected ',' or '}' after property")),
      }
    }
  }

  fn parse_array(&mut self) -> Result<Value, SchemaError> {
    self.expect(b'[')?;
    let mut items = Vec::new();
    loop {
      self.skip_trivia();
      if self.peek() == Some(b']') {
        self.pos += 1;
        return Ok(Value::Array(items));
      }
      items.push(self.parse_value()?);
      self.skip_trivia();
      match self.peek() {
        Some(b',') => {
          self.pos += 1;
        }
        Some(b']') => {}
        _ => return Err(self.err("expected ',' or ']' after array element")),
      }
    }
  }

  fn parse_identifier(&mut self) -> String {
    let start = self.pos;
    while let Some(c) = self.peek() {
      if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' {
        self.pos += 1;
      } else {
        break;
      }
    }
    String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
  }

  fn parse_string(&mut self) -> Result<String, SchemaError> {
    let quote = self.bump().expect("caller checked quote");
    let mut out = String::new();
    loop {
      match self.bump() {
        None => return Err(self.err("unterminated string literal")),
        Some(c) if c == quote => return Ok(out),
        Some(b'\\') => match self.bump() {
          None => return Err(self.err("unterminated escape sequence")),
          Some(b'n') => out.push('\n'),
          Some(b't') => out.push('\t'),
          Some(b'r') => out.push('\r'),
          Some(b'0') => out.push('\0'),
          Some(b'u') => {
            let mut code = 0u32;
            for _ in 0..4 {
              let digit = self
                .bump()
                .and_then(|d| (d as char).to_digit(16))
                .ok_or_else(|| self.err("invalid unicode escape"))?;
              code = code * 16 + digit;
            }
            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
          }
          Some(other) => out.push(other as char),
        },
        Some(c) => {
          // Re-walk multi-byte UTF-8 sequences starting at this byte.
          if c < 0x80 {
            out.push(c as char);
          } else {
            let start = self.pos - 1;
            let len = utf8_len(c);
            let end = (start + len).min(self.bytes.len());
            out.push_str(&String::from_utf8_lossy(&self.bytes[start..end]));
            self.pos = end;
          }
        }
      }
    }
  }

  fn parse_number(&mut self) -> Result<Value, SchemaError> {
    let start = self.pos;
    if matches!(self.peek(), Some(b'-') | Some(b'+')) {
      self.pos += 1;
    }
    let mut is_float = false;
    while let Some(c) = self.peek() {
      match c {
        b'0'..=b'9' => self.pos += 1,
        b'.' => {
          is_float = true;
          self.pos += 1;
        }
        b'e' | b'E' => {
          is_float = true;
          self.pos += 1;
          if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
          }
        }
        _ => break,
      }
    }
    let text = std::str::from_utf8(&self.bytes[start..self.pos])
      .map_err(|_| self.err("invalid number"))?
      .trim_start_matches('+');
    if text.is_empty() || text == "-" {
      return Err(self.err("invalid number"));
    }
    if !is_float {
      if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::Number(Number::from(n)));
      }
    }
    let n: f64 = text.parse().map_err(|_| self.err("invalid number"))?;
    Number::from_f64(n)
      .map(Value::Number)
      .ok_or_else(|| self.err("number is not finite"))
  }
}

fn utf8_len(first: u8) -> usize {
  match first {
    0xC0..=0xDF => 2,
    0xE0..=0xEF => 3,
    0xF0..=0xF7 => 4,
    _ => 1,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_simple_object() {
    let value = parse_object_literal(r#"{ count: 1, name: "hi", flag: true }"#).unwrap();
    assert_eq!(value, json!({ "count": 1, "name": "hi", "flag": true }));
  }

  #[test]
  fn test_parse_nested_with_arrays() {
    let src = r#"{
      inputs: {
        size: { type: 'integer', default: 3, options: [1, 2, 3] },
      },
      outputs: {},
    }"#;
    let value = parse_object_literal(src).unwrap();
    assert_eq!(value["inputs"]["size"]["options"], json!([1, 2, 3]));
    assert_eq!(value["outputs"], json!({}));
  }

  #[test]
  fn test_parse_string_quoting_styles() {
    let value = parse_object_literal(r#"{ a: "x", b: 'y', c: `z` }"#).unwrap();
    assert_eq!(value, json!({ "a": "x", "b": "y", "c": "z" }));
  }

  #[test]
  fn test_parse_comments_and_trailing_commas() {
    let src = "{\n  // first\n  a: 1, /* second */ b: 2,\n}";
    let value = parse_object_literal(src).unwrap();
    assert_eq!(value, json!({ "a": 1, "b": 2 }));
  }

  #[test]
  fn test_parse_negative_and_float_numbers() {
    let value = parse_object_literal("{ a: -5, b: 0.25, c: 1e3 }").unwrap();
    assert_eq!(value["a"], json!(-5));
    assert_eq!(value["b"], json!(0.25));
    assert_eq!(value["c"], json!(1000.0));
  }

  #[test]
  fn test_parse_escapes() {
    let value = parse_object_literal(r#"{ a: "line\nbreak", b: "q\"q" }"#).unwrap();
    assert_eq!(value["a"], json!("line\nbreak"));
    assert_eq!(value["b"], json!("q\"q"));
  }

  #[test]
  fn test_parse_rejects_identifier_value() {
    let err = parse_object_literal("{ a: someVariable }").unwrap_err();
    assert!(err.to_string().contains("someVariable"));
  }

  #[test]
  fn test_parse_rejects_trailing_garbage() {
    assert!(parse_object_literal("{ a: 1 } extra").is_err());
  }

  #[test]
  fn test_parse_rejects_unterminated_string() {
    assert!(parse_object_literal(r#"{ a: "oops }"#).is_err());
  }

  #[test]
  fn test_undefined_becomes_null() {
    let value = parse_object_literal("{ a: undefined }").unwrap();
    assert_eq!(value["a"], Value::Null);
  }
}
