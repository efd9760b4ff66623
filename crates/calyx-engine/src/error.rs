//! Engine errors, grouped by the failure's origin.

use calyx_monitor::MonitorError;
use calyx_registry::RegistryError;
use calyx_schema::SchemaError;

/// Errors surfaced by planning or calling a script.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The main source callback failed.
  #[error("failed to resolve main script source: {message}")]
  SourceResolution { message: String },

  /// Shape or safety checks rejected a source at planning time.
  #[error("Script validation failed: {summary}")]
  Validation { summary: String },

  /// The io object or default function could not be extracted.
  #[error("Script introspection failed: {message}")]
  Introspection { message: String },

  /// A call's inputs failed schema validation.
  #[error("Input validation failed: {0}")]
  Input(#[source] SchemaError),

  /// A dependency could not be resolved.
  #[error(transparent)]
  Registry(#[from] RegistryError),

  /// The call outlived its bound.
  #[error("Script execution timeout after {ms}ms")]
  Timeout { ms: u64 },

  /// A memory sample exceeded the configured limit.
  #[error(transparent)]
  Memory(#[from] MonitorError),

  /// The entry function (or an import it performed) failed. The message
  /// carries the original error text, including guard messages such as
  /// import and recursion limits.
  #[error("{message}")]
  Execution { message: String },

  /// A call arrived after initialization had already failed.
  #[error("initialization failed: {message}")]
  InitFailed { message: String },

  /// The call was cancelled before or during execution.
  #[error("execution cancelled")]
  Cancelled,
}

impl From<calyx_host::HostError> for EngineError {
  fn from(error: calyx_host::HostError) -> Self {
    use calyx_host::HostError;
    match error {
      HostError::Timeout { ms } => Self::Timeout { ms },
      HostError::Memory(breach) => Self::Memory(breach),
      HostError::Init { message } => Self::Execution { message },
      HostError::Execution { message } => Self::Execution { message },
      HostError::Result { message } => Self::Execution { message },
    }
  }
}
