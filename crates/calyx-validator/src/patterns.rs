//! The dangerous-pattern table.

use regex::Regex;

/// Which derived text a pattern scans.
///
/// Most patterns run against the fully masked text so that string contents
/// cannot trigger them. Import checks need the module specifier, which lives
/// inside quotes, so they scan the comment-stripped text instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
  Masked,
  Stripped,
}

/// A single disallowed construct, keyed by its message.
#[derive(Debug, Clone)]
pub struct DangerPattern {
  pub message: String,
  pub regex: Regex,
  pub target: ScanTarget,
}

impl DangerPattern {
  pub fn new(message: impl Into<String>, pattern: &str, target: ScanTarget) -> Result<Self, regex::Error> {
    Ok(Self {
      message: message.into(),
      regex: Regex::new(pattern)?,
      target,
    })
  }
}

/// The built-in table: dynamic code, timers, synchronous HTTP, filesystem
/// imports, prototype manipulation, and runaway literal loop bounds.
pub fn default_patterns() -> Vec<DangerPattern> {
  let table: &[(&str, &str, ScanTarget)] = &[
    ("Use of eval() is not allowed", r"\beval\s*\(", ScanTarget::Masked),
    (
      "Function constructor is not allowed",
      r"\bnew\s+Function\s*\(",
      ScanTarget::Masked,
    ),
    (
      "setTimeout with zero delay is not allowed",
      r"\bsetTimeout\s*\([^)]*,\s*0\s*\)",
      ScanTarget::Masked,
    ),
    (
      "setInterval is not allowed",
      r"\bsetInterval\s*\(",
      ScanTarget::Masked,
    ),
    (
      "Synchronous XMLHttpRequest is not allowed",
      r"\bXMLHttpRequest\b",
      ScanTarget::Masked,
    ),
    (
      "Filesystem access is not allowed",
      r#"(?:\brequire\s*\(\s*["'](?:node:)?fs["']\s*\))|(?:\bfrom\s+["'](?:node:)?fs["'])"#,
      ScanTarget::Stripped,
    ),
    (
      "__proto__ access is not allowed",
      r"__proto__",
      ScanTarget::Masked,
    ),
    (
      "setPrototypeOf is not allowed",
      r"\bObject\s*\.\s*setPrototypeOf\b",
      ScanTarget::Masked,
    ),
    (
      "Loop bound exceeds allowed literal range",
      r"\b(?:for|while)\s*\([^)]*[<>]=?\s*\d{6,}",
      ScanTarget::Masked,
    ),
  ];

  table
    .iter()
    .map(|(message, pattern, target)| {
      DangerPattern::new(*message, pattern, *target).expect("static pattern")
    })
    .collect()
}
