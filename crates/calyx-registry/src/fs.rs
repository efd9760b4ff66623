//! Filesystem registry.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// Registry reading script files from a single directory.
///
/// Identifiers are restricted to `[A-Za-z0-9_.-]` with no `..` segments, so
/// a resolved path can never escape the root.
pub struct FsRegistry {
  root: PathBuf,
}

impl FsRegistry {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &std::path::Path {
    &self.root
  }

  fn sanitize(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() {
      return Err(RegistryError::InvalidId {
        id: id.to_string(),
        message: "empty id".to_string(),
      });
    }
    if !id
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
    {
      return Err(RegistryError::InvalidId {
        id: id.to_string(),
        message: "only [A-Za-z0-9_.-] characters are allowed".to_string(),
      });
    }
    if id.contains("..") {
      return Err(RegistryError::InvalidId {
        id: id.to_string(),
        message: "path traversal is not allowed".to_string(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl ScriptRegistry for FsRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    Self::sanitize(id)?;
    let path = self.root.join(id);
    match fs::read_to_string(&path).await {
      Ok(source) => Ok(ResolvedScript::Text(source)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RegistryError::NotFound {
        id: id.to_string(),
        message: format!("no such file under {}", self.root.display()),
      }),
      Err(e) => Err(RegistryError::Io {
        id: id.to_string(),
        source: e,
      }),
    }
  }
}
