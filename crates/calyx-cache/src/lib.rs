//! Keyed script cache with content hashing, TTL expiry, and LRU trimming.
//!
//! The cache stores introspected scripts keyed by identifier, each entry
//! carrying the content hash of the source it was produced from and its
//! insertion time. Entries never have their timestamps refreshed on access;
//! expiry is purely insertion-age based.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Stable fingerprint of a source text (BLAKE3, hex).
pub fn content_hash(source: &str) -> String {
  hex::encode(blake3::hash(source.as_bytes()).as_bytes())
}

/// Where a cached script came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
  Main,
  Dependency,
}

/// One cached script.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub script: T,
  pub content_hash: String,
  pub origin: CacheOrigin,
  pub inserted_at: Instant,
}

/// Eviction policy.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
  pub max_age: Duration,
  pub max_size: usize,
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self {
      max_age: DEFAULT_MAX_AGE,
      max_size: DEFAULT_MAX_SIZE,
    }
  }
}

/// A partial policy update.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePolicyUpdate {
  pub max_age: Option<Duration>,
  pub max_size: Option<usize>,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
  pub entries: usize,
  pub average_age_ms: u64,
  pub main_entries: usize,
  pub dependency_entries: usize,
}

/// Identifier-keyed cache of introspected scripts.
pub struct ScriptCache<T> {
  entries: Mutex<HashMap<String, CacheEntry<T>>>,
  policy: Mutex<CachePolicy>,
}

impl<T: Clone> ScriptCache<T> {
  pub fn new(policy: CachePolicy) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      policy: Mutex::new(policy),
    }
  }

  /// Replace parts of the eviction policy.
  pub fn set_policy(&self, update: CachePolicyUpdate) {
    let mut policy = self.lock_policy();
    if let Some(max_age) = update.max_age {
      policy.max_age = max_age;
    }
    if let Some(max_size) = update.max_size {
      policy.max_size = max_size;
    }
  }

  pub fn policy(&self) -> CachePolicy {
    *self.lock_policy()
  }

  /// Fetch a fresh entry. An entry past its max age is evicted and treated
  /// as a miss.
  pub fn get(&self, id: &str) -> Option<CacheEntry<T>> {
    let max_age = self.lock_policy().max_age;
    let mut entries = self.lock_entries();
    match entries.get(id) {
      Some(entry) if entry.inserted_at.elapsed() <= max_age => Some(entry.clone()),
      Some(_) => {
        entries.remove(id);
        None
      }
      None => None,
    }
  }

  /// Insert or replace an entry.
  pub fn put(&self, id: impl Into<String>, script: T, content_hash: String, origin: CacheOrigin) {
    self.lock_entries().insert(
      id.into(),
      CacheEntry {
        script,
        content_hash,
        origin,
        inserted_at: Instant::now(),
      },
    );
  }

  /// Drop one entry. Returns true if it existed.
  pub fn invalidate(&self, id: &str) -> bool {
    self.lock_entries().remove(id).is_some()
  }

  /// Rehash `source` and evict the entry if its content changed. Returns
  /// true when an eviction happened.
  pub fn invalidate_if_changed(&self, id: &str, source: &str) -> bool {
    let hash = content_hash(source);
    let mut entries = self.lock_entries();
    if let Some(entry) = entries.get(id)
      && entry.content_hash != hash
    {
      entries.remove(id);
      return true;
    }
    false
  }

  /// Sweep expired entries, then trim oldest-first down to the size bound.
  pub fn cleanup(&self) {
    let policy = *self.lock_policy();
    let mut entries = self.lock_entries();
    entries.retain(|_, entry| entry.inserted_at.elapsed() <= policy.max_age);

    if entries.len() > policy.max_size {
      let mut by_age: Vec<(String, Instant)> = entries
        .iter()
        .map(|(id, entry)| (id.clone(), entry.inserted_at))
        .collect();
      by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
      let excess = entries.len() - policy.max_size;
      for (id, _) in by_age.into_iter().take(excess) {
        entries.remove(&id);
      }
    }
  }

  /// Drop everything.
  pub fn clear(&self) {
    self.lock_entries().clear();
  }

  pub fn len(&self) -> usize {
    self.lock_entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock_entries().is_empty()
  }

  pub fn stats(&self) -> CacheStats {
    let entries = self.lock_entries();
    let count = entries.len();
    let total_age_ms: u128 = entries
      .values()
      .map(|e| e.inserted_at.elapsed().as_millis())
      .sum();
    CacheStats {
      entries: count,
      average_age_ms: if count == 0 {
        0
      } else {
        (total_age_ms / count as u128) as u64
      },
      main_entries: entries
        .values()
        .filter(|e| e.origin == CacheOrigin::Main)
        .count(),
      dependency_entries: entries
        .values()
        .filter(|e| e.origin == CacheOrigin::Dependency)
        .count(),
    }
  }

  fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn lock_policy(&self) -> MutexGuard<'_, CachePolicy> {
    self.policy.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl<T: Clone> Default for ScriptCache<T> {
  fn default() -> Self {
    Self::new(CachePolicy::default())
  }
}
