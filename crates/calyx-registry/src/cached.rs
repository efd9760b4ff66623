//! TTL cache over another registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// Cached-registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegistryCacheStats {
  pub entries: usize,
  pub average_age_ms: u64,
  pub oldest_age_ms: u64,
}

/// Wraps another registry with a TTL-gated lookup cache.
pub struct CachedRegistry {
  inner: Arc<dyn ScriptRegistry>,
  ttl: Duration,
  entries: Mutex<HashMap<String, (ResolvedScript, Instant)>>,
}

impl CachedRegistry {
  pub fn new(inner: Arc<dyn ScriptRegistry>, ttl: Duration) -> Self {
    Self {
      inner,
      ttl,
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Drop one cached resolution. Returns true if it was cached.
  pub fn invalidate(&self, id: &str) -> bool {
    self.lock().remove(id).is_some()
  }

  pub fn clear(&self) {
    self.lock().clear();
  }

  pub fn stats(&self) -> RegistryCacheStats {
    let entries = self.lock();
    let count = entries.len();
    if count == 0 {
      return RegistryCacheStats::default();
    }
    let ages: Vec<u128> = entries
      .values()
      .map(|(_, at)| at.elapsed().as_millis())
      .collect();
    RegistryCacheStats {
      entries: count,
      average_age_ms: (ages.iter().sum::<u128>() / count as u128) as u64,
      oldest_age_ms: ages.into_iter().max().unwrap_or(0) as u64,
    }
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, (ResolvedScript, Instant)>> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[async_trait]
impl ScriptRegistry for CachedRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    {
      let entries = self.lock();
      if let Some((resolved, at)) = entries.get(id)
        && at.elapsed() <= self.ttl
      {
        debug!(id, "registry cache hit");
        return Ok(resolved.clone());
      }
    }

    let resolved = self.inner.resolve(id).await?;
    self
      .lock()
      .insert(id.to_string(), (resolved.clone(), Instant::now()));
    Ok(resolved)
  }
}
