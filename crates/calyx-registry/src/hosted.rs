//! Hosted (repository-style) registry.

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// A parsed `host:owner/repo/path[@branch]` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedScriptId {
  pub owner: String,
  pub repo: String,
  pub path: String,
  pub branch: String,
}

impl HostedScriptId {
  /// Parse the repository-style identifier shape for a given host tag.
  pub fn parse(host: &str, id: &str) -> Result<Self, RegistryError> {
    let rest = id
      .strip_prefix(host)
      .and_then(|r| r.strip_prefix(':'))
      .ok_or_else(|| RegistryError::InvalidId {
        id: id.to_string(),
        message: format!("expected '{}:owner/repo/path[@branch]'", host),
      })?;

    let (spec, branch) = match rest.rsplit_once('@') {
      Some((spec, branch)) if !branch.is_empty() && !branch.contains('/') => (spec, branch),
      _ => (rest, "main"),
    };

    let mut segments = spec.splitn(3, '/');
    let owner = segments.next().unwrap_or_default();
    let repo = segments.next().unwrap_or_default();
    let path = segments.next().unwrap_or_default();
    if owner.is_empty() || repo.is_empty() || path.is_empty() {
      return Err(RegistryError::InvalidId {
        id: id.to_string(),
        message: format!("expected '{}:owner/repo/path[@branch]'", host),
      });
    }

    Ok(Self {
      owner: owner.to_string(),
      repo: repo.to_string(),
      path: path.to_string(),
      branch: branch.to_string(),
    })
  }
}

/// Fetches scripts from a repository hosting service by parsed coordinates.
pub struct HostedRegistry {
  host: String,
  base_url: String,
  token: Option<String>,
  client: reqwest::Client,
}

impl HostedRegistry {
  /// `host` is the identifier prefix (e.g. `github`); `base_url` is the raw
  /// content endpoint the coordinates are appended to.
  pub fn new(host: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      host: host.into(),
      base_url: base_url.into(),
      token: None,
      client: reqwest::Client::new(),
    }
  }

  /// Attach a bearer token sent with every fetch.
  pub fn with_token(mut self, token: impl Into<String>) -> Self {
    self.token = Some(token.into());
    self
  }

  /// Whether an identifier belongs to this registry's host.
  pub fn matches(&self, id: &str) -> bool {
    id.starts_with(&self.host) && id[self.host.len()..].starts_with(':')
  }

  fn url_for(&self, parsed: &HostedScriptId) -> String {
    format!(
      "{}/{}/{}/{}/{}",
      self.base_url.trim_end_matches('/'),
      parsed.owner,
      parsed.repo,
      parsed.branch,
      parsed.path
    )
  }
}

#[async_trait]
impl ScriptRegistry for HostedRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    let parsed = HostedScriptId::parse(&self.host, id)?;
    let url = self.url_for(&parsed);

    let mut request = self.client.get(&url);
    if let Some(token) = &self.token {
      request = request.header("Authorization", format!("Bearer {}", token));
    }

    let response = request
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
