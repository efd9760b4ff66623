//! Execution limits: the timeout wrapper and the import/recursion guards.

use std::future::Future;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 10;
pub const DEFAULT_MAX_IMPORTED_SCRIPTS: u32 = 50;
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 100 * 1024 * 1024;

/// Limit breaches.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LimitError {
  #[error("Script execution timeout after {ms}ms")]
  Timeout { ms: u64 },

  #[error("Recursion depth limit exceeded: {depth} (max {max})")]
  RecursionDepth { depth: u32, max: u32 },

  #[error("Import limit exceeded: {count} imports (max {max})")]
  ImportCount { count: u32, max: u32 },
}

/// Read-only execution bounds for a single engine.
///
/// Normally fixed at construction; `update` exists for tooling that tightens
/// or relaxes bounds between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
  pub timeout_ms: u64,
  pub max_recursion_depth: u32,
  pub max_imported_scripts: u32,
  pub max_memory_bytes: u64,
}

impl Default for ExecutionLimits {
  fn default() -> Self {
    Self {
      timeout_ms: DEFAULT_TIMEOUT_MS,
      max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
      max_imported_scripts: DEFAULT_MAX_IMPORTED_SCRIPTS,
      max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
    }
  }
}

/// A partial update applied over existing limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitsUpdate {
  pub timeout_ms: Option<u64>,
  pub max_recursion_depth: Option<u32>,
  pub max_imported_scripts: Option<u32>,
  pub max_memory_bytes: Option<u64>,
}

impl ExecutionLimits {
  /// Apply a partial bulk update.
  pub fn update(&mut self, update: LimitsUpdate) {
    if let Some(timeout_ms) = update.timeout_ms {
      self.timeout_ms = timeout_ms;
    }
    if let Some(depth) = update.max_recursion_depth {
      self.max_recursion_depth = depth;
    }
    if let Some(imports) = update.max_imported_scripts {
      self.max_imported_scripts = imports;
    }
    if let Some(memory) = update.max_memory_bytes {
      self.max_memory_bytes = memory;
    }
  }

  /// Fail once the current nesting depth has reached the bound. With a
  /// bound of zero every call fails.
  pub fn check_recursion(&self, depth: u32) -> Result<(), LimitError> {
    if depth >= self.max_recursion_depth {
      return Err(LimitError::RecursionDepth {
        depth,
        max: self.max_recursion_depth,
      });
    }
    Ok(())
  }

  /// Fail once the import count has reached the bound. With a bound of zero
  /// every call fails.
  pub fn check_imports(&self, count: u32) -> Result<(), LimitError> {
    if count >= self.max_imported_scripts {
      return Err(LimitError::ImportCount {
        count,
        max: self.max_imported_scripts,
      });
    }
    Ok(())
  }
}

/// Run `future` against a timer; whichever settles first wins.
///
/// A zero bound fails immediately without polling the producer. The timer is
/// dropped on either outcome, so nothing keeps the scheduler alive.
pub async fn execute_with_timeout<F, T>(future: F, timeout_ms: u64) -> Result<T, LimitError>
where
  F: Future<Output = T>,
{
  if timeout_ms == 0 {
    return Err(LimitError::Timeout { ms: 0 });
  }
  tokio::time::timeout(Duration::from_millis(timeout_ms), future)
    .await
    .map_err(|_| LimitError::Timeout { ms: timeout_ms })
}
