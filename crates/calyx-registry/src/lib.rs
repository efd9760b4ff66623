//! Script registries: pluggable resolvers from identifier to source text.
//!
//! All variants share one contract: `resolve(id)` yields the script source
//! (or a structured value that normalises to one) or fails with a
//! descriptive error. Registries compose: the composite variant tries an
//! ordered list, the cached variant adds a TTL layer over any other, and the
//! environment variant dispatches on a process-level deployment tag.

mod cached;
mod composite;
mod environment;
mod error;
mod fs;
mod hosted;
mod http;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use cached::{CachedRegistry, RegistryCacheStats};
pub use composite::CompositeRegistry;
pub use environment::{Environment, EnvironmentRegistry};
pub use error::RegistryError;
pub use fs::FsRegistry;
pub use hosted::{HostedRegistry, HostedScriptId};
pub use http::HttpRegistry;
pub use memory::InMemoryRegistry;

/// What a registry hands back for an identifier.
///
/// Most registries return source text directly; structured payloads carry a
/// `content` or `script` string member.
#[derive(Debug, Clone)]
pub enum ResolvedScript {
  Text(String),
  Value(Value),
}

impl ResolvedScript {
  /// Normalise to source text.
  ///
  /// Rules: text passes through; a string value is source; an object with a
  /// string `content` or `script` member yields that member; `null` is a
  /// miss; anything else is an unsupported value.
  pub fn into_source(self, id: &str) -> Result<String, RegistryError> {
    match self {
      Self::Text(text) => Ok(text),
      Self::Value(Value::String(text)) => Ok(text),
      Self::Value(Value::Null) => Err(RegistryError::NotFound {
        id: id.to_string(),
        message: "registry returned null".to_string(),
      }),
      Self::Value(Value::Object(map)) => map
        .get("content")
        .or_else(|| map.get("script"))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| RegistryError::UnsupportedValue { id: id.to_string() }),
      Self::Value(_) => Err(RegistryError::UnsupportedValue { id: id.to_string() }),
    }
  }
}

impl From<String> for ResolvedScript {
  fn from(text: String) -> Self {
    Self::Text(text)
  }
}

impl From<&str> for ResolvedScript {
  fn from(text: &str) -> Self {
    Self::Text(text.to_string())
  }
}

/// A resolver from script identifier to source.
#[async_trait]
pub trait ScriptRegistry: Send + Sync {
  /// Resolve an identifier to script source.
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError>;
}
