//! The surface validator.

use std::sync::LazyLock;

use calyx_schema::IoSchema;
use regex::Regex;

use crate::extract::extract_io_source;
use crate::mask::mask_source;
use crate::patterns::{DangerPattern, ScanTarget, default_patterns};

static IO_EXPORT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"export\s+const\s+io\s*=").expect("static regex"));
static DEFAULT_EXPORT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"export\s+default\b").expect("static regex"));

const MAX_LINE_LENGTH: usize = 1000;
const MAX_NESTING: usize = 10;
const MAX_SOURCE_LENGTH: usize = 100_000;

/// Outcome of validating one source text.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
  pub valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

impl ValidationReport {
  /// All errors joined for single-line reporting.
  pub fn error_summary(&self) -> String {
    self.errors.join("; ")
  }
}

/// Surface-level script checker.
///
/// The built-in dangerous-pattern table can be extended or pruned at
/// runtime; patterns are keyed by their message.
pub struct ScriptValidator {
  patterns: Vec<DangerPattern>,
}

impl ScriptValidator {
  pub fn new() -> Self {
    Self {
      patterns: default_patterns(),
    }
  }

  /// Append a custom dangerous pattern.
  pub fn add_pattern(
    &mut self,
    message: impl Into<String>,
    pattern: &str,
    target: ScanTarget,
  ) -> Result<(), regex::Error> {
    self.patterns.push(DangerPattern::new(message, pattern, target)?);
    Ok(())
  }

  /// Remove a pattern by its message. Returns true when one was removed.
  pub fn remove_pattern(&mut self, message: &str) -> bool {
    let before = self.patterns.len();
    self.patterns.retain(|p| p.message != message);
    self.patterns.len() != before
  }

  /// Validate a script source.
  pub fn validate(&self, source: &str) -> ValidationReport {
    let mut report = ValidationReport::default();

    if source.trim().is_empty() {
      report.errors.push("Script source is empty".to_string());
      return report;
    }

    let views = mask_source(source);

    // Required shape.
    if !IO_EXPORT.is_match(&views.masked) {
      report
        .errors
        .push("Script must export a const io declaration".to_string());
    }
    if !DEFAULT_EXPORT.is_match(&views.masked) {
      report
        .errors
        .push("Script must export a default function".to_string());
    }

    // Balance checks.
    if views.unterminated_string {
      report.errors.push("Unbalanced quotes detected".to_string());
    }
    if views.unterminated_comment {
      report.errors.push("Unterminated block comment".to_string());
    }
    let net = views.brace_balance();
    if net != 0 {
      report
        .errors
        .push(format!("Unbalanced braces: {} unmatched", net.abs()));
    }

    // Dangerous patterns.
    for pattern in &self.patterns {
      let text = match pattern.target {
        ScanTarget::Masked => &views.masked,
        ScanTarget::Stripped => &views.stripped,
      };
      if pattern.regex.is_match(text) {
        report.errors.push(pattern.message.clone());
      }
    }

    // Structural warnings.
    for (index, line) in source.lines().enumerate() {
      if line.len() > MAX_LINE_LENGTH && !line.contains("options:") {
        report.warnings.push(format!(
          "line {} is {} characters long",
          index + 1,
          line.len()
        ));
      }
    }
    let nesting = views.max_nesting();
    if nesting > MAX_NESTING {
      report
        .warnings
        .push(format!("nesting depth {} exceeds {}", nesting, MAX_NESTING));
    }
    if source.len() > MAX_SOURCE_LENGTH {
      report.warnings.push(format!(
        "script is {} characters long (over {})",
        source.len(),
        MAX_SOURCE_LENGTH
      ));
    }

    // io schema sub-validation, only worthwhile when the declaration exists
    // and the braces scan cleanly.
    if report.errors.is_empty() {
      match extract_io_source(source) {
        Ok(io_source) => match IoSchema::from_source(&io_source) {
          Ok(io) => report.warnings.extend(io.warnings()),
          Err(e) => report.errors.push(format!("Invalid io schema: {}", e)),
        },
        Err(e) => report.errors.push(format!("Invalid io schema: {}", e)),
      }
    }

    report.valid = report.errors.is_empty();
    report
  }
}

impl Default for ScriptValidator {
  fn default() -> Self {
    Self::new()
  }
}
