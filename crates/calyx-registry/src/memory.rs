//! In-memory registry.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// Registry backed by an id → source map. The default choice for tests and
/// for callers that assemble their script set programmatically.
#[derive(Default)]
pub struct InMemoryRegistry {
  scripts: RwLock<HashMap<String, String>>,
}

impl InMemoryRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register (or replace) a script source under an id.
  pub fn register(&self, id: impl Into<String>, source: impl Into<String>) {
    self
      .scripts
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(id.into(), source.into());
  }

  pub fn has(&self, id: &str) -> bool {
    self
      .scripts
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .contains_key(id)
  }

  /// Remove a script. Returns true if it existed.
  pub fn unregister(&self, id: &str) -> bool {
    self
      .scripts
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .remove(id)
      .is_some()
  }

  pub fn clear(&self) {
    self
      .scripts
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .clear();
  }

  /// Registered ids, sorted for stable listings.
  pub fn list(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .scripts
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .keys()
      .cloned()
      .collect();
    ids.sort();
    ids
  }
}

#[async_trait]
impl ScriptRegistry for InMemoryRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    self
      .scripts
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(id)
      .map(|source| ResolvedScript::Text(source.clone()))
      .ok_or_else(|| RegistryError::NotFound {
        id: id.to_string(),
        message: "not registered".to_string(),
      })
  }
}
