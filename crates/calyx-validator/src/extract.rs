//! Textual extraction of the two required exports and declared dependencies.
//!
//! The extractors anchor on the masked text (so commented-out or quoted
//! declarations never match) and slice the original source, relying on the
//! mask preserving byte offsets.

use std::sync::LazyLock;

use regex::Regex;

use crate::mask::mask_source;

static IO_DECL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"export\s+const\s+io\s*=").expect("static regex"));
static DEFAULT_DECL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"export\s+default\s+").expect("static regex"));
static IMPORT_CALL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"importScript\s*\(\s*(?:"([^"]+)"|'([^']+)')\s*\)"#).expect("static regex")
});

/// Extraction failures, surfaced by the engine as introspection errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
  #[error("no io declaration found")]
  NoIoDeclaration,
  #[error("io declaration has no object literal")]
  NoIoObject,
  #[error("unbalanced braces in io declaration")]
  UnbalancedIo,
  #[error("no default export found")]
  NoDefaultExport,
  #[error("default export must be an async function")]
  NotAsync,
  #[error("unterminated default function body")]
  UnterminatedBody,
}

/// Extract the io object-literal source (`{ … }` inclusive).
pub fn extract_io_source(source: &str) -> Result<String, ExtractError> {
  let views = mask_source(source);
  let decl = IO_DECL.find(&views.masked).ok_or(ExtractError::NoIoDeclaration)?;

  let masked = views.masked.as_bytes();
  let mut start = decl.end();
  while start < masked.len() && masked[start] != b'{' {
    if !masked[start].is_ascii_whitespace() {
      return Err(ExtractError::NoIoObject);
    }
    start += 1;
  }
  if start == masked.len() {
    return Err(ExtractError::NoIoObject);
  }

  let mut depth = 0i64;
  for (offset, byte) in masked[start..].iter().enumerate() {
    match byte {
      b'{' => depth += 1,
      b'}' => {
        depth -= 1;
        if depth == 0 {
          let end = start + offset + 1;
          return Ok(source[start..end].to_string());
        }
      }
      _ => {}
    }
  }
  Err(ExtractError::UnbalancedIo)
}

/// Extract the default-export function expression.
///
/// Recognises the regular async-function form first, then the async-arrow
/// form (block or expression bodied). The returned text evaluates as a
/// function expression when parenthesised.
pub fn extract_default_fn(source: &str) -> Result<String, ExtractError> {
  let views = mask_source(source);
  let decl = DEFAULT_DECL
    .find(&views.masked)
    .ok_or(ExtractError::NoDefaultExport)?;

  let masked = views.masked.as_bytes();
  let start = decl.end();
  let rest = views.masked[start..].trim_start();
  if !rest.starts_with("async") {
    return Err(ExtractError::NotAsync);
  }

  if rest.starts_with("async function")
    || rest
      .strip_prefix("async")
      .map(|r| r.trim_start().starts_with("function"))
      .unwrap_or(false)
  {
    // Body starts at the first top-level brace after the parameter list.
    let mut paren_depth = 0i64;
    let mut brace_depth = 0i64;
    let mut body_seen = false;
    for (offset, byte) in masked[start..].iter().enumerate() {
      match byte {
        b'(' => paren_depth += 1,
        b')' => paren_depth -= 1,
        b'{' if paren_depth == 0 => {
          brace_depth += 1;
          body_seen = true;
        }
        b'{' => {}
        b'}' if paren_depth == 0 && body_seen => {
          brace_depth -= 1;
          if brace_depth == 0 {
            let end = start + offset + 1;
            return Ok(source[start..end].trim().to_string());
          }
        }
        _ => {}
      }
    }
    return Err(ExtractError::UnterminatedBody);
  }

  // Async arrow: locate the top-level `=>`, then take a block or expression
  // body.
  let bytes = masked;
  let mut paren_depth = 0i64;
  let mut arrow_at = None;
  let mut i = start;
  while i < bytes.len() {
    match bytes[i] {
      b'(' => paren_depth += 1,
      b')' => paren_depth -= 1,
      b'=' if paren_depth == 0 && bytes.get(i + 1) == Some(&b'>') => {
        arrow_at = Some(i);
        break;
      }
      _ => {}
    }
    i += 1;
  }
  let arrow_at = arrow_at.ok_or(ExtractError::NotAsync)?;

  let mut j = arrow_at + 2;
  while j < bytes.len() && bytes[j].is_ascii_whitespace() {
    j += 1;
  }

  if bytes.get(j) == Some(&b'{') {
    let mut depth = 0i64;
    for (offset, byte) in bytes[j..].iter().enumerate() {
      match byte {
        b'{' => depth += 1,
        b'}' => {
          depth -= 1;
          if depth == 0 {
            let end = j + offset + 1;
            return Ok(source[start..end].trim().to_string());
          }
        }
        _ => {}
      }
    }
    Err(ExtractError::UnterminatedBody)
  } else {
    // Expression body runs to the first top-level semicolon or end of input.
    let mut depth = 0i64;
    let mut end = bytes.len();
    for (offset, byte) in bytes[j..].iter().enumerate() {
      match byte {
        b'{' | b'(' | b'[' => depth += 1,
        b'}' | b')' | b']' => depth -= 1,
        b';' if depth == 0 => {
          end = j + offset;
          break;
        }
        _ => {}
      }
    }
    Ok(source[start..end].trim().to_string())
  }
}

/// Enumerate declared dependencies: textual `importScript("id")` /
/// `importScript('id')` call sites, in order of first occurrence.
pub fn extract_deps(source: &str) -> Vec<String> {
  let mut deps = Vec::new();
  for captures in IMPORT_CALL.captures_iter(source) {
    let id = captures
      .get(1)
      .or_else(|| captures.get(2))
      .map(|m| m.as_str().to_string())
      .expect("one alternative always captures");
    if !deps.contains(&id) {
      deps.push(id);
    }
  }
  deps
}
