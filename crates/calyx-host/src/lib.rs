//! The embedded ECMAScript host.
//!
//! Each top-level call gets a fresh `deno_core::JsRuntime` carrying one
//! extension: a handful of ops (severity-classified logging, delay, registry
//! resolution, import bookkeeping, nested input validation) plus a glue
//! script that builds the capability context and implements the
//! `importScript` primitive. All per-call state — the import tracker, the
//! io table for imported scripts, the limits — lives in the op state, so
//! every nested context produced during the call shares the same counters.

mod error;
mod ops;
mod runtime;
mod state;

pub use error::HostError;
pub use runtime::{HostCall, run_call};
pub use state::{HostCallState, ImportTracker};
