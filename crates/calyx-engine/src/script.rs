//! The loaded-script model and source inputs.

use std::sync::Arc;

use calyx_schema::IoSchema;
use calyx_validator::{extract_default_fn, extract_deps, extract_io_source};
use futures::future::BoxFuture;

use crate::error::EngineError;

/// A callback producing the current main source, used by hot-reloadable
/// engines.
pub type SourceResolver = Arc<
  dyn Fn() -> BoxFuture<'static, Result<String, Box<dyn std::error::Error + Send + Sync>>>
    + Send
    + Sync,
>;

/// The main script, as literal source or as a resolver callback.
#[derive(Clone)]
pub enum ScriptInput {
  Source(String),
  Resolver(SourceResolver),
}

impl ScriptInput {
  pub fn resolver<F>(f: F) -> Self
  where
    F: Fn() -> BoxFuture<'static, Result<String, Box<dyn std::error::Error + Send + Sync>>>
      + Send
      + Sync
      + 'static,
  {
    Self::Resolver(Arc::new(f))
  }

  /// Produce the current source text.
  pub async fn resolve(&self) -> Result<String, EngineError> {
    match self {
      Self::Source(source) => Ok(source.clone()),
      Self::Resolver(resolver) => {
        resolver()
          .await
          .map_err(|e| EngineError::SourceResolution {
            message: e.to_string(),
          })
      }
    }
  }
}

impl From<String> for ScriptInput {
  fn from(source: String) -> Self {
    Self::Source(source)
  }
}

impl From<&str> for ScriptInput {
  fn from(source: &str) -> Self {
    Self::Source(source.to_string())
  }
}

/// The introspected form of one source: identity, interface, declared
/// dependencies, and the entry-function source the host evaluates.
/// Immutable once produced.
#[derive(Debug, Clone)]
pub struct LoadedScript {
  pub id: String,
  pub io: Arc<IoSchema>,
  pub deps: Vec<String>,
  pub entry_source: String,
}

/// Extract interface, entry, and dependencies from a source text.
pub fn introspect(id: &str, source: &str) -> Result<LoadedScript, EngineError> {
  let io_source = extract_io_source(source).map_err(|e| EngineError::Introspection {
    message: e.to_string(),
  })?;
  let io = IoSchema::from_source(&io_source).map_err(|e| EngineError::Introspection {
    message: e.to_string(),
  })?;
  let entry_source = extract_default_fn(source).map_err(|e| EngineError::Introspection {
    message: e.to_string(),
  })?;
  let deps = extract_deps(source);

  Ok(LoadedScript {
    id: id.to_string(),
    io: Arc::new(io),
    deps,
    entry_source,
  })
}
