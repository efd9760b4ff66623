//! Per-call op state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use calyx_limits::ExecutionLimits;
use calyx_monitor::ResourceMonitor;
use calyx_registry::ScriptRegistry;
use calyx_schema::IoSchema;
use calyx_validator::ScriptValidator;
use serde_json::Value;

/// Bookkeeping for a single top-level call.
///
/// One tracker is shared by every context frame produced during the call, so
/// the configured limits bound the whole invocation: the count and the
/// content-hash set only grow, while the stack mirrors currently-nested
/// `importScript` activations.
#[derive(Debug, Default)]
pub struct ImportTracker {
  pub import_count: u32,
  pub import_stack: Vec<String>,
  pub imported_hashes: HashSet<String>,
}

/// Everything the ops need for one call.
pub struct HostCallState {
  pub limits: ExecutionLimits,
  pub registry: Option<Arc<dyn ScriptRegistry>>,
  pub monitor: Arc<ResourceMonitor>,
  pub validator: Arc<ScriptValidator>,
  pub tracker: ImportTracker,
  /// io schemas of scripts imported during this call, keyed by minted id.
  pub io_table: HashMap<String, Arc<IoSchema>>,
  /// The main entry function source.
  pub entry_source: String,
  /// Validated main inputs handed to the entry.
  pub inputs: Value,
  /// Injected providers merged over the base capabilities.
  pub providers: Value,
}
