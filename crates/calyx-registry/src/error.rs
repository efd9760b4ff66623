//! Registry errors.

/// Errors raised while resolving a script identifier.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  /// The identifier is unknown to this registry.
  #[error("script '{id}' not found: {message}")]
  NotFound { id: String, message: String },

  /// The identifier failed sanitisation.
  #[error("invalid script id '{id}': {message}")]
  InvalidId { id: String, message: String },

  /// A relative identifier reached an HTTP registry with no base URL.
  #[error("relative script id '{id}' requires a base URL")]
  MissingBaseUrl { id: String },

  /// The server answered outside the 2xx range.
  #[error("failed to fetch script '{id}': {status} {status_text}")]
  Http {
    id: String,
    status: u16,
    status_text: String,
  },

  /// Transport-level failure.
  #[error("request for script '{id}' failed: {source}")]
  Network {
    id: String,
    #[source]
    source: reqwest::Error,
  },

  /// Filesystem failure.
  #[error("failed to read script '{id}': {source}")]
  Io {
    id: String,
    #[source]
    source: std::io::Error,
  },

  /// Every child of a composite registry failed.
  #[error("all registries failed for '{id}': {}", messages.join("; "))]
  Composite { id: String, messages: Vec<String> },

  /// The registry returned something that does not normalise to source.
  #[error(
    "unsupported registry value for '{id}': expected source text or an object with a content/script member"
  )]
  UnsupportedValue { id: String },

  /// No registry is configured for the active environment.
  #[error("no registry configured for environment '{environment}'")]
  NoEnvironment { environment: String },
}

impl RegistryError {
  /// True for failures that mean "this registry cannot supply the id", as
  /// opposed to a payload that actively violates the contract.
  pub fn is_miss(&self) -> bool {
    !matches!(self, Self::UnsupportedValue { .. })
  }
}
