//! Host errors.

use calyx_monitor::MonitorError;

/// Failures surfaced while running a script inside the host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
  /// The runtime or glue could not be set up.
  #[error("failed to initialise script host: {message}")]
  Init { message: String },

  /// The call outlived its bound.
  #[error("Script execution timeout after {ms}ms")]
  Timeout { ms: u64 },

  /// A memory sample exceeded the configured limit.
  #[error(transparent)]
  Memory(#[from] MonitorError),

  /// The script (or an op it called) threw. The message carries the
  /// original error text, including guard and validation messages raised
  /// inside `importScript`.
  #[error("{message}")]
  Execution { message: String },

  /// The entry function's return value did not convert to JSON.
  #[error("failed to convert script result: {message}")]
  Result { message: String },
}
