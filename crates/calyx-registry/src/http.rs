//! HTTP registry.

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// Registry fetching script sources over HTTP.
///
/// Absolute identifiers (scheme-prefixed) are fetched as-is; relative
/// identifiers are resolved against the configured base URL, and rejected
/// with a descriptive error when no base is configured.
pub struct HttpRegistry {
  client: reqwest::Client,
  base_url: Option<String>,
}

impl HttpRegistry {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: None,
    }
  }

  pub fn with_base_url(base_url: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: Some(base_url.into()),
    }
  }

  fn is_absolute(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
  }

  /// The URL a given identifier resolves to, or the rejection it earns.
  fn url_for(&self, id: &str) -> Result<String, RegistryError> {
    if Self::is_absolute(id) {
      return Ok(id.to_string());
    }
    match &self.base_url {
      Some(base) => Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        id.trim_start_matches('/')
      )),
      None => Err(RegistryError::MissingBaseUrl { id: id.to_string() }),
    }
  }
}

impl Default for HttpRegistry {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ScriptRegistry for HttpRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    let url = self.url_for(id)?;
    let response = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|source| RegistryError::Network {
        id: id.to_string(),
        source,
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(RegistryError::Http {
        id: id.to_string(),
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("unknown").to_string(),
      });
    }

    let text = response
      .text()
      .await
      .map_err(|source| RegistryError::Network {
        id: id.to_string(),
        source,
      })?;
    Ok(ResolvedScript::Text(text))
  }
}
