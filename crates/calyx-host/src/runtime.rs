//! Per-call runtime construction and driving.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use calyx_limits::{ExecutionLimits, LimitError, execute_with_timeout};
use calyx_monitor::ResourceMonitor;
use calyx_registry::ScriptRegistry;
use calyx_validator::ScriptValidator;
use deno_core::error::JsError;
use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions, serde_v8, v8};
use serde_json::Value;
use tracing::debug;

use crate::error::HostError;
use crate::ops;
use crate::state::{HostCallState, ImportTracker};

deno_core::extension!(
  calyx_ext,
  ops = [
    ops::op_calyx_log,
    ops::op_calyx_delay,
    ops::op_calyx_resolve_script,
    ops::op_calyx_import_begin,
    ops::op_calyx_import_end,
    ops::op_calyx_validate_inputs,
    ops::op_calyx_main_data,
  ],
  options = {
    call_state: HostCallState,
  },
  state = |state, options| {
    state.put(options.call_state);
  },
);

const GLUE: &str = include_str!("js/runtime.js");

/// One top-level invocation, ready to run.
pub struct HostCall {
  pub entry_source: String,
  pub inputs: serde_json::Map<String, Value>,
  pub providers: serde_json::Map<String, Value>,
  pub limits: ExecutionLimits,
  pub registry: Option<Arc<dyn ScriptRegistry>>,
  pub monitor: Arc<ResourceMonitor>,
  pub validator: Arc<ScriptValidator>,
}

/// Run a prepared call to completion inside a fresh runtime.
///
/// Two timeout layers apply: the cooperative race for code that suspends,
/// and a watchdog holding the isolate's thread-safe handle for code that
/// never yields. A memory breach observed by the monitor also terminates
/// the isolate and wins over the generic termination error.
pub async fn run_call(call: HostCall) -> Result<Value, HostError> {
  let timeout_ms = call.limits.timeout_ms;
  let monitor = Arc::clone(&call.monitor);

  let state = HostCallState {
    limits: call.limits,
    registry: call.registry,
    monitor: Arc::clone(&call.monitor),
    validator: call.validator,
    tracker: ImportTracker::default(),
    io_table: HashMap::new(),
    entry_source: call.entry_source,
    inputs: Value::Object(call.inputs),
    providers: Value::Object(call.providers),
  };

  let mut runtime = JsRuntime::new(RuntimeOptions {
    extensions: vec![calyx_ext::init_ops(state)],
    ..Default::default()
  });

  runtime
    .execute_script("calyx:runtime.js", GLUE)
    .map_err(|e| HostError::Init {
      message: e.to_string(),
    })?;

  // Memory breaches terminate the isolate so runaway allocations cannot
  // outlive the sample that caught them.
  let breach_handle = runtime.v8_isolate().thread_safe_handle();
  monitor.set_breach_hook(Box::new(move || {
    let _ = breach_handle.terminate_execution();
  }));

  // Watchdog for non-yielding scripts. Cancelled by dropping the sender.
  let watchdog_handle = runtime.v8_isolate().thread_safe_handle();
  let watchdog_fired = Arc::new(AtomicBool::new(false));
  let fired = Arc::clone(&watchdog_fired);
  let (cancel_tx, cancel_rx) = std::sync::mpsc::channel::<()>();
  let deadline = Duration::from_millis(timeout_ms.max(1));
  std::thread::spawn(move || {
    if cancel_rx.recv_timeout(deadline).is_err() {
      fired.store(true, Ordering::SeqCst);
      let _ = watchdog_handle.terminate_execution();
    }
  });

  let outcome = execute_with_timeout(drive(&mut runtime), timeout_ms).await;
  drop(cancel_tx);

  if let Some(breach) = monitor.breach() {
    return Err(HostError::Memory(breach));
  }

  match outcome {
    Err(LimitError::Timeout { ms }) => Err(HostError::Timeout { ms }),
    Err(_) => unreachable!("timeout wrapper only produces timeouts"),
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => {
      if watchdog_fired.load(Ordering::SeqCst) {
        return Err(HostError::Timeout { ms: timeout_ms });
      }
      Err(e)
    }
  }
}

/// Kick off the entry function and pump the event loop until its promise
/// settles, then convert the result to JSON.
async fn drive(runtime: &mut JsRuntime) -> Result<Value, HostError> {
  let promise = runtime
    .execute_script("calyx:call", "globalThis.__calyxRun()")
    .map_err(|e| execution_error(&e))?;

  let resolved = {
    let resolve = runtime.resolve(promise);
    runtime
      .with_event_loop_promise(Box::pin(resolve), PollEventLoopOptions::default())
      .await
      .map_err(|e| execution_error(&e))?
  };

  debug!("entry promise settled");

  let scope = &mut runtime.handle_scope();
  let local = v8::Local::new(scope, resolved);
  serde_v8::from_v8::<Value>(scope, local).map_err(|e| HostError::Result {
    message: e.to_string(),
  })
}

/// Flatten a driver error into the script-facing message, stripping the
/// `Uncaught Error:` dressing V8 adds around thrown values.
fn execution_error(error: &deno_core::error::AnyError) -> HostError {
  let message = match error.downcast_ref::<JsError>() {
    Some(js) => {
      let text = js.exception_message.trim_start_matches("Uncaught ");
      text.strip_prefix("Error: ").unwrap_or(text).to_string()
    }
    None => error.to_string(),
  };
  HostError::Execution { message }
}

#[cfg(test)]
mod tests {
  use super::*;
  use calyx_monitor::MonitorConfig;
  use serde_json::json;

  fn call_with(entry_source: &str, inputs: Value, limits: ExecutionLimits) -> HostCall {
    HostCall {
      entry_source: entry_source.to_string(),
      inputs: inputs.as_object().unwrap().clone(),
      providers: serde_json::Map::new(),
      limits,
      registry: None,
      monitor: Arc::new(ResourceMonitor::new(MonitorConfig::default())),
      validator: Arc::new(ScriptValidator::new()),
    }
  }

  #[tokio::test]
  async fn test_entry_receives_inputs_and_context() {
    let entry = r#"async function run(inputs, context) {
      context.logger.info("running");
      return { doubled: inputs.number * 2, enhanced: context.calculator.enhance(10) };
    }"#;
    let result = run_call(call_with(entry, json!({ "number": 21 }), ExecutionLimits::default()))
      .await
      .unwrap();
    assert_eq!(result["doubled"], json!(42));
    assert!((result["enhanced"].as_f64().unwrap() - 11.0).abs() < 1e-9);
  }

  #[tokio::test]
  async fn test_entry_error_propagates() {
    let entry = r#"async function run() { throw new Error("boom from script"); }"#;
    let err = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("boom from script"));
  }

  #[tokio::test]
  async fn test_delay_and_timeout() {
    let entry = r#"async function run(inputs, context) {
      await context.utils.delay(200);
      return { done: true };
    }"#;
    let limits = ExecutionLimits {
      timeout_ms: 50,
      ..Default::default()
    };
    let err = run_call(call_with(entry, json!({}), limits)).await.unwrap_err();
    assert_eq!(err.to_string(), "Script execution timeout after 50ms");
  }

  #[tokio::test]
  async fn test_watchdog_stops_busy_loop() {
    let entry = r#"async function run() { for (;;) {} }"#;
    let limits = ExecutionLimits {
      timeout_ms: 200,
      ..Default::default()
    };
    let err = run_call(call_with(entry, json!({}), limits)).await.unwrap_err();
    assert!(err.to_string().contains("timeout"));
  }

  #[tokio::test]
  async fn test_inline_import() {
    let entry = r#"async function run(inputs, context) {
      const doubler = await context.importScript(`
export const io = {
  inputs: { number: { type: 'integer', default: 0 } },
  outputs: { result: 'integer' },
};
export default async function (inputs, context) {
  return { result: inputs.number * 2 };
}
`);
      const first = await doubler({ number: inputs.number });
      return { doubled: first.result, id: doubler.id };
    }"#;
    let result = run_call(call_with(entry, json!({ "number": 21 }), ExecutionLimits::default()))
      .await
      .unwrap();
    assert_eq!(result["doubled"], json!(42));
    assert!(result["id"].as_str().unwrap().starts_with("imported-"));
  }

  #[tokio::test]
  async fn test_recursive_content_import_rejected() {
    let entry = r#"async function run(inputs, context) {
      const src = `
export const io = { inputs: {}, outputs: {} };
export default async function () { return {}; }
`;
      await context.importScript(src);
      await context.importScript(src);
      return {};
    }"#;
    let err = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      "Recursive import detected: script content already imported in this execution"
    );
  }

  #[tokio::test]
  async fn test_import_limit_zero() {
    let entry = r#"async function run(inputs, context) {
      await context.importScript("export const io = { inputs: {}, outputs: {} };\nexport default async function () { return {}; }");
      return {};
    }"#;
    let limits = ExecutionLimits {
      max_imported_scripts: 0,
      ..Default::default()
    };
    let err = run_call(call_with(entry, json!({}), limits)).await.unwrap_err();
    assert!(err.to_string().contains("Import limit exceeded"));
  }

  #[tokio::test]
  async fn test_failed_introspection_poisons_content_hash() {
    // A sync default export passes the surface checks but fails
    // introspection. The hash is recorded before introspection runs, so a
    // retry of the same content reports a recursive import.
    let entry = r#"async function run(inputs, context) {
      const broken = "export const io = { inputs: {}, outputs: {} };\nexport default function () { return {}; }";
      let first = "";
      try {
        await context.importScript(broken);
      } catch (e) {
        first = e.message;
      }
      let second = "";
      try {
        await context.importScript(broken);
      } catch (e) {
        second = e.message;
      }
      return { first, second };
    }"#;
    let result = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap();
    assert!(
      result["first"]
        .as_str()
        .unwrap()
        .contains("Script introspection failed")
    );
    assert_eq!(
      result["second"],
      json!("Recursive import detected: script content already imported in this execution")
    );
  }

  #[tokio::test]
  async fn test_failed_introspection_consumes_import_budget() {
    let entry = r#"async function run(inputs, context) {
      const broken = "export const io = { inputs: {}, outputs: {} };\nexport default function () { return {}; }";
      try {
        await context.importScript(broken);
      } catch (e) {}
      await context.importScript("export const io = { inputs: {}, outputs: {} };\nexport default async function () { return {}; }");
      return {};
    }"#;
    let limits = ExecutionLimits {
      max_imported_scripts: 1,
      ..Default::default()
    };
    let err = run_call(call_with(entry, json!({}), limits)).await.unwrap_err();
    assert!(err.to_string().contains("Import limit exceeded"));
  }

  #[tokio::test]
  async fn test_imported_validation_failure() {
    let entry = r#"async function run(inputs, context) {
      await context.importScript("export const io = { inputs: {}, outputs: {} };\nexport default async function () { return eval('1'); }");
      return {};
    }"#;
    let err = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("Imported script validation failed"));
  }

  #[tokio::test]
  async fn test_providers_override_base() {
    let entry = r#"async function run(inputs, context) {
      return { flavour: context.flavour, calc: typeof context.calculator };
    }"#;
    let mut call = call_with(entry, json!({}), ExecutionLimits::default());
    call.providers = json!({ "flavour": "strawberry", "calculator": "overridden" })
      .as_object()
      .unwrap()
      .clone();
    let result = run_call(call).await.unwrap();
    assert_eq!(result["flavour"], json!("strawberry"));
    assert_eq!(result["calc"], json!("string"));
  }

  #[tokio::test]
  async fn test_resolver_function_argument() {
    let entry = r#"async function run(inputs, context) {
      const helper = await context.importScript(async () => `
export const io = { inputs: {}, outputs: { ok: 'boolean' } };
export default async function () { return { ok: true }; }
`);
      return await helper({});
    }"#;
    let result = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap();
    assert_eq!(result["ok"], json!(true));
  }

  #[tokio::test]
  async fn test_failing_resolver_function() {
    let entry = r#"async function run(inputs, context) {
      await context.importScript(async () => { throw new Error("registry offline"); });
      return {};
    }"#;
    let err = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap_err();
    assert!(
      err
        .to_string()
        .contains("Failed to resolve script content: registry offline")
    );
  }

  #[tokio::test]
  async fn test_registry_unsupported_value_is_fatal() {
    use async_trait::async_trait;
    use calyx_registry::{RegistryError, ResolvedScript};

    struct NumberRegistry;

    #[async_trait]
    impl ScriptRegistry for NumberRegistry {
      async fn resolve(&self, _id: &str) -> Result<ResolvedScript, RegistryError> {
        Ok(ResolvedScript::Value(json!(42)))
      }
    }

    let entry = r#"async function run(inputs, context) {
      await context.importScript("helper");
      return {};
    }"#;
    let mut call = call_with(entry, json!({}), ExecutionLimits::default());
    call.registry = Some(Arc::new(NumberRegistry));
    let err = run_call(call).await.unwrap_err();
    assert!(err.to_string().contains("unsupported registry value"));
  }

  #[tokio::test]
  async fn test_registry_miss_falls_through_to_source() {
    use async_trait::async_trait;
    use calyx_registry::{RegistryError, ResolvedScript};

    struct EmptyRegistry;

    #[async_trait]
    impl ScriptRegistry for EmptyRegistry {
      async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
        Err(RegistryError::NotFound {
          id: id.to_string(),
          message: "not registered".to_string(),
        })
      }
    }

    // The argument is not a known id, so the raw string itself is treated
    // as source.
    let entry = r#"async function run(inputs, context) {
      const inline = await context.importScript("export const io = { inputs: {}, outputs: { ok: 'boolean' } };\nexport default async function () { return { ok: true }; }");
      return await inline({});
    }"#;
    let mut call = call_with(entry, json!({}), ExecutionLimits::default());
    call.registry = Some(Arc::new(EmptyRegistry));
    let result = run_call(call).await.unwrap();
    assert_eq!(result["ok"], json!(true));
  }

  #[tokio::test]
  async fn test_nested_inputs_validated_with_defaults() {
    let entry = r#"async function run(inputs, context) {
      const greeter = await context.importScript(`
export const io = {
  inputs: { name: { type: 'text', default: 'world' } },
  outputs: { greeting: 'text' },
};
export default async function (inputs) {
  return { greeting: "hello " + inputs.name };
}
`);
      const fallback = await greeter();
      return { greeting: fallback.greeting };
    }"#;
    let result = run_call(call_with(entry, json!({}), ExecutionLimits::default()))
      .await
      .unwrap();
    assert_eq!(result["greeting"], json!("hello world"));
  }
}
