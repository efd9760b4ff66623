//! Composite registry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// Tries an ordered list of registries and returns the first success.
///
/// When every child fails, the error enumerates each child's message in
/// order.
pub struct CompositeRegistry {
  children: Vec<Arc<dyn ScriptRegistry>>,
}

impl CompositeRegistry {
  pub fn new(children: Vec<Arc<dyn ScriptRegistry>>) -> Self {
    Self { children }
  }

  pub fn push(&mut self, child: Arc<dyn ScriptRegistry>) {
    self.children.push(child);
  }

  pub fn len(&self) -> usize {
    self.children.len()
  }

  pub fn is_empty(&self) -> bool {
    self.children.is_empty()
  }
}

#[async_trait]
impl ScriptRegistry for CompositeRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    let mut messages = Vec::with_capacity(self.children.len());
    for (index, child) in self.children.iter().enumerate() {
      match child.resolve(id).await {
        Ok(resolved) => {
          debug!(id, index, "composite registry child resolved");
          return Ok(resolved);
        }
        Err(e) => messages.push(format!("[{}] {}", index, e)),
      }
    }
    Err(RegistryError::Composite {
      id: id.to_string(),
      messages,
    })
  }
}
