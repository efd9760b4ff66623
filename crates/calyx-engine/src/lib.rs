//! The script engine: planning, caching, and execution of capability-scoped
//! scripts.
//!
//! A [`ScriptEngine`] is a prepared, callable handle bound to one main
//! script and a configuration. Construction is cheap; the first call (or an
//! explicit [`ScriptEngine::wait_for_initialization`]) triggers planning:
//! resolve the main source, validate it, introspect its interface, and walk
//! its declared dependency tree through the configured registry, caching
//! every loaded script. Calls then validate inputs against the io schema and
//! run the entry function inside the embedded host under the configured
//! limits.
//!
//! The [`facade`] module wraps the engine in one-shot, batch, reusable,
//! hot-reloadable, and benchmarking helpers.

mod engine;
mod error;
pub mod facade;
mod planner;
mod script;

pub use calyx_cache::{CachePolicy, CachePolicyUpdate, CacheStats};
pub use calyx_limits::{ExecutionLimits, LimitsUpdate};
pub use calyx_monitor::{MonitorConfig, ResourceStats};
pub use engine::{EngineConfig, ScriptEngine};
pub use error::EngineError;
pub use facade::{
  BatchItem, BatchOutcome, BenchmarkReport, HotReloadableScript, ReusableScript,
  ValidationOutcome, benchmark, create_hot_reloadable, create_reusable, execute, execute_batch,
  execute_with_validation, validate,
};
pub use script::{LoadedScript, ScriptInput, SourceResolver};
