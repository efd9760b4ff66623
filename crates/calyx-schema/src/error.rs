//! Schema errors.

/// Errors produced while parsing or applying a parameter schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
  /// The `io` value (or one of its members) has the wrong shape.
  #[error("invalid io schema: {message}")]
  BadIoShape { message: String },

  /// A parameter declared a kind outside the closed set.
  #[error("parameter '{name}' has unknown kind '{kind}'")]
  UnknownKind { name: String, kind: String },

  /// A parameter attribute has the wrong type (e.g. non-array options).
  #[error("parameter '{name}' has invalid attribute {attribute}: {message}")]
  BadAttribute {
    name: String,
    attribute: &'static str,
    message: String,
  },

  /// Declared numeric range has min > max.
  #[error("parameter '{name}' declares an invalid range: min {min} > max {max}")]
  InvalidRange { name: String, min: f64, max: f64 },

  /// A value did not match the declared kind.
  #[error("input '{name}' must be {expected}, got {found}")]
  KindMismatch {
    name: String,
    expected: &'static str,
    found: &'static str,
  },

  /// A numeric value was NaN or infinite.
  #[error("input '{name}' must be a finite number")]
  NotFinite { name: String },

  /// An integer parameter received a fractional value.
  #[error("input '{name}' must be an integer")]
  NotInteger { name: String },

  /// A numeric value fell outside the inclusive declared range.
  #[error("input '{name}' is out of range: {value} not in [{min}, {max}]")]
  OutOfRange {
    name: String,
    value: f64,
    min: f64,
    max: f64,
  },

  /// A text value was not a member of the declared options.
  #[error("input '{name}' must be one of the declared options, got {value}")]
  NotAnOption { name: String, value: String },

  /// A resource identifier was not in `namespace:path` form.
  #[error("input '{name}' must be a namespaced resource id, got '{value}'")]
  BadResourceId { name: String, value: String },

  /// A required input (visible, no default) was absent.
  #[error("Missing required input: {name}")]
  MissingRequired { name: String },

  /// Object-literal parsing failed.
  #[error("failed to parse object literal at offset {offset}: {message}")]
  Literal { offset: usize, message: String },
}
