//! Ops exposed to the script context.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use calyx_cache::content_hash;
use calyx_schema::IoSchema;
use calyx_validator::{extract_default_fn, extract_deps, extract_io_source};
use deno_core::error::{AnyError, custom_error};
use deno_core::{OpState, op2};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::state::HostCallState;

fn guard_error(message: impl Into<String>) -> AnyError {
  custom_error("Error", message.into())
}

/// Severity-classified log sink for the script-visible logger.
#[op2(fast)]
pub fn op_calyx_log(#[string] level: &str, #[string] message: &str) {
  match level {
    "success" => info!(target: "calyx::script", status = "success", "{}", message),
    "warn" => warn!(target: "calyx::script", "{}", message),
    "error" => error!(target: "calyx::script", "{}", message),
    _ => info!(target: "calyx::script", "{}", message),
  }
}

/// Cooperative sleep used by `utils.delay`.
#[op2(async)]
pub async fn op_calyx_delay(ms: f64) {
  let ms = if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 };
  tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Resolve an importScript string argument.
///
/// With no registry configured the argument is the source. With one, a
/// successful lookup normalises to source text; a lookup miss falls through
/// to treating the raw argument as source; a payload that violates the
/// contract (non-string, non-`content`/`script` object) is fatal.
#[op2(async)]
#[string]
pub async fn op_calyx_resolve_script(
  state: Rc<RefCell<OpState>>,
  #[string] arg: String,
) -> Result<String, AnyError> {
  let registry = {
    let state = state.borrow();
    state.borrow::<HostCallState>().registry.clone()
  };
  let Some(registry) = registry else {
    return Ok(arg);
  };

  match registry.resolve(&arg).await {
    Ok(resolved) => match resolved.into_source(&arg) {
      Ok(source) => {
        debug!(id = %arg, "registry resolved import");
        Ok(source)
      }
      Err(e) if e.is_miss() => {
        debug!(id = %arg, error = %e, "registry miss, treating argument as source");
        Ok(arg)
      }
      Err(e) => Err(guard_error(e.to_string())),
    },
    Err(e) => {
      debug!(id = %arg, error = %e, "registry lookup failed, treating argument as source");
      Ok(arg)
    }
  }
}

/// The plan for one imported script: identity, interface, and the entry
/// source the glue evaluates.
#[derive(Serialize)]
pub struct ImportPlan {
  pub id: String,
  pub io: Value,
  pub deps: Vec<String>,
  pub entry_source: String,
}

/// Guards, bookkeeping, and introspection for one import.
///
/// The guards run before anything observable; bookkeeping commits before
/// introspection, so a source that fails to introspect still consumes its
/// slot of the import budget and leaves its content hash recorded for the
/// rest of the call. Only the stack frame unwinds on that failure.
#[op2]
#[serde]
pub fn op_calyx_import_begin(
  state: &mut OpState,
  #[string] source: String,
) -> Result<ImportPlan, AnyError> {
  let call = state.borrow_mut::<HostCallState>();

  call
    .limits
    .check_imports(call.tracker.import_count)
    .map_err(|e| guard_error(e.to_string()))?;
  call
    .limits
    .check_recursion(call.tracker.import_stack.len() as u32)
    .map_err(|e| guard_error(e.to_string()))?;
  call.monitor.check().map_err(|e| guard_error(e.to_string()))?;

  let hash = content_hash(&source);
  if call.tracker.imported_hashes.contains(&hash) {
    return Err(guard_error(
      "Recursive import detected: script content already imported in this execution",
    ));
  }

  let report = call.validator.validate(&source);
  if !report.valid {
    return Err(guard_error(format!(
      "Imported script validation failed: {}",
      report.error_summary()
    )));
  }

  let millis = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis())
    .unwrap_or(0);
  let id = format!(
    "imported-{}-{}",
    millis,
    &uuid::Uuid::new_v4().simple().to_string()[..8]
  );

  call.tracker.import_count += 1;
  call.tracker.import_stack.push(id.clone());
  call.tracker.imported_hashes.insert(hash);

  let (io, entry_source, deps) = match introspect_source(&source) {
    Ok(parts) => parts,
    Err(e) => {
      call.tracker.import_stack.pop();
      return Err(e);
    }
  };

  let raw_io = io.raw().clone();
  call.io_table.insert(id.clone(), Arc::new(io));

  info!(
    id = %id,
    imports = call.tracker.import_count,
    depth = call.tracker.import_stack.len(),
    "imported script ready"
  );

  Ok(ImportPlan {
    id,
    io: raw_io,
    deps,
    entry_source,
  })
}

fn introspect_source(source: &str) -> Result<(IoSchema, String, Vec<String>), AnyError> {
  let io_source = extract_io_source(source)
    .map_err(|e| guard_error(format!("Script introspection failed: {}", e)))?;
  let io = IoSchema::from_source(&io_source)
    .map_err(|e| guard_error(format!("Script introspection failed: {}", e)))?;
  let entry_source = extract_default_fn(source)
    .map_err(|e| guard_error(format!("Script introspection failed: {}", e)))?;
  Ok((io, entry_source, extract_deps(source)))
}

/// Pop the import stack as an `importScript` activation unwinds.
#[op2(fast)]
pub fn op_calyx_import_end(state: &mut OpState, #[string] id: &str) {
  let call = state.borrow_mut::<HostCallState>();
  let popped = call.tracker.import_stack.pop();
  if popped.as_deref() != Some(id) {
    warn!(expected = %id, "import stack popped out of order");
  }
}

/// Apply defaults and validate inputs for an imported script's callable.
#[op2]
#[serde]
pub fn op_calyx_validate_inputs(
  state: &mut OpState,
  #[string] id: String,
  #[serde] inputs: serde_json::Value,
) -> Result<serde_json::Value, AnyError> {
  let call = state.borrow::<HostCallState>();
  let io = call
    .io_table
    .get(&id)
    .cloned()
    .ok_or_else(|| guard_error(format!("unknown imported script '{}'", id)))?;

  let map = match inputs {
    Value::Object(map) => map,
    Value::Null => serde_json::Map::new(),
    other => {
      return Err(guard_error(format!(
        "script inputs must be an object, got {}",
        other
      )));
    }
  };

  let validated =
    calyx_schema::validate_inputs(&map, &io).map_err(|e| guard_error(e.to_string()))?;
  Ok(Value::Object(validated))
}

/// Data for the top-level run: entry source, validated inputs, providers.
#[derive(Serialize)]
pub struct MainData {
  pub entry_source: String,
  pub inputs: Value,
  pub providers: Value,
}

#[op2]
#[serde]
pub fn op_calyx_main_data(state: &mut OpState) -> MainData {
  let call = state.borrow::<HostCallState>();
  MainData {
    entry_source: call.entry_source.clone(),
    inputs: call.inputs.clone(),
    providers: call.providers.clone(),
  }
}
