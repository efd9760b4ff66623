//! End-to-end engine tests: defaults, imports, registries, limits, reload.

use std::sync::{Arc, Mutex};

use calyx_engine::{
  BatchItem, EngineConfig, EngineError, ExecutionLimits, ScriptEngine, ScriptInput, benchmark,
  execute, execute_batch, execute_with_validation, validate,
};
use calyx_registry::{InMemoryRegistry, ScriptRegistry};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const GREETING_SCRIPT: &str = r#"
export const io = {
  inputs: {
    message: { type: 'text', default: 'Hello' },
    count: { type: 'integer', default: 1, min: 1, max: 5 },
  },
  outputs: { result: 'text' },
};

export default async function run(inputs, context) {
  context.logger.info("assembling greeting");
  return { result: Array(inputs.count).fill(inputs.message).join(" ") };
}
"#;

const DOUBLER_SCRIPT: &str = r#"
export const io = {
  inputs: { number: { type: 'integer', default: 0 } },
  outputs: { result: 'integer' },
};

export default async function run(inputs, context) {
  return { result: inputs.number * 2 };
}
"#;

fn config_with_registry(registry: Arc<dyn ScriptRegistry>) -> EngineConfig {
  EngineConfig {
    registry: Some(registry),
    ..Default::default()
  }
}

async fn call(engine: &ScriptEngine, inputs: Value) -> Result<Value, EngineError> {
  engine.call(inputs, CancellationToken::new()).await
}

#[tokio::test]
async fn test_defaults_and_simple_call() {
  let engine = ScriptEngine::new(GREETING_SCRIPT, EngineConfig::default());

  let result = call(&engine, json!({})).await.unwrap();
  assert_eq!(result, json!({ "result": "Hello" }));

  let result = call(&engine, json!({ "count": 3, "message": "Hi" })).await.unwrap();
  assert_eq!(result, json!({ "result": "Hi Hi Hi" }));

  let err = call(&engine, json!({ "count": 10 })).await.unwrap_err();
  assert!(matches!(err, EngineError::Input(_)));
  assert!(err.to_string().starts_with("Input validation failed"));

  engine.dispose();
}

#[tokio::test]
async fn test_inline_import_and_double() {
  let source = r#"
export const io = {
  inputs: { number: { type: 'integer', default: 0 } },
  outputs: { doubled: 'integer', quadrupled: 'integer' },
};

export default async function run(inputs, context) {
  const doubler = await context.importScript(`
export const io = {
  inputs: { number: { type: 'integer', default: 0 } },
  outputs: { result: 'integer' },
};
export default async function (inputs, context) {
  return { result: inputs.number * 2 };
}
`);
  const once = await doubler({ number: inputs.number });
  const twice = await doubler({ number: once.result });
  return { doubled: once.result, quadrupled: twice.result };
}
"#;

  let result = execute(source, json!({ "number": 21 }), EngineConfig::default())
    .await
    .unwrap();
  assert_eq!(result, json!({ "doubled": 42, "quadrupled": 84 }));
}

#[tokio::test]
async fn test_nested_registry_import() {
  let registry = Arc::new(InMemoryRegistry::new());
  registry.register("helper", DOUBLER_SCRIPT);

  let source = r#"
export const io = {
  inputs: { number: { type: 'integer', default: 0 } },
  outputs: { result: 'integer' },
};

export default async function run(inputs, context) {
  const helper = await context.importScript("helper");
  const out = await helper({ number: inputs.number });
  return { result: out.result };
}
"#;

  let engine = ScriptEngine::new(source, config_with_registry(registry));
  let result = call(&engine, json!({ "number": 21 })).await.unwrap();
  assert_eq!(result, json!({ "result": 42 }));

  // The declared dependency was planned through the registry and cached.
  assert_eq!(engine.get_dependencies().await.unwrap(), vec!["helper"]);
  assert_eq!(engine.cache_stats().dependency_entries, 1);

  engine.dispose();
}

#[tokio::test]
async fn test_recursive_content_import_detected() {
  let source = r#"
export const io = { inputs: {}, outputs: {} };

export default async function run(inputs, context) {
  const inline = `
export const io = { inputs: {}, outputs: {} };
export default async function () { return {}; }
`;
  await context.importScript(inline);
  await context.importScript(inline);
  return {};
}
"#;

  let err = execute(source, json!({}), EngineConfig::default()).await.unwrap_err();
  assert_eq!(
    err.to_string(),
    "Recursive import detected: script content already imported in this execution"
  );
}

#[tokio::test]
async fn test_timeout_stops_call() {
  let source = r#"
export const io = { inputs: {}, outputs: { done: 'boolean' } };

export default async function run(inputs, context) {
  await context.utils.delay(200);
  return { done: true };
}
"#;

  let engine = ScriptEngine::new(
    source,
    EngineConfig {
      limits: ExecutionLimits {
        timeout_ms: 100,
        ..Default::default()
      },
      ..Default::default()
    },
  );

  let err = call(&engine, json!({})).await.unwrap_err();
  assert_eq!(err.to_string(), "Script execution timeout after 100ms");
  assert_eq!(engine.cache_stats().entries, 1);

  engine.dispose();
}

#[tokio::test]
async fn test_hot_reload_switches_versions() {
  let source = Arc::new(Mutex::new(
    "export const io = { inputs: {}, outputs: { version: 'integer' } };\n\
     export default async function () { return { version: 1 }; }"
      .to_string(),
  ));

  let current = Arc::clone(&source);
  let input = ScriptInput::resolver(move || {
    let current = Arc::clone(&current);
    Box::pin(async move { Ok(current.lock().unwrap().clone()) })
  });

  let engine = ScriptEngine::new(input, EngineConfig::default());
  assert_eq!(call(&engine, json!({})).await.unwrap(), json!({ "version": 1 }));

  *source.lock().unwrap() =
    "export const io = { inputs: {}, outputs: { version: 'integer' } };\n\
     export default async function () { return { version: 2 }; }"
      .to_string();
  engine.reload().await.unwrap();
  assert_eq!(call(&engine, json!({})).await.unwrap(), json!({ "version": 2 }));

  // A resolver now returning an invalid source fails the reload and every
  // later call until the next successful reload.
  *source.lock().unwrap() = "this is not a script".to_string();
  assert!(engine.reload().await.is_err());
  let err = call(&engine, json!({})).await.unwrap_err();
  assert!(matches!(err, EngineError::InitFailed { .. }));

  engine.dispose();
}

#[tokio::test]
async fn test_import_guards_with_zeroed_limits() {
  let source = r#"
export const io = { inputs: {}, outputs: {} };

export default async function run(inputs, context) {
  await context.importScript("export const io = { inputs: {}, outputs: {} };\nexport default async function () { return {}; }");
  return {};
}
"#;

  let zero_imports = EngineConfig {
    limits: ExecutionLimits {
      max_imported_scripts: 0,
      ..Default::default()
    },
    ..Default::default()
  };
  let err = execute(source, json!({}), zero_imports).await.unwrap_err();
  assert!(err.to_string().contains("Import limit exceeded"));

  let zero_depth = EngineConfig {
    limits: ExecutionLimits {
      max_recursion_depth: 0,
      ..Default::default()
    },
    ..Default::default()
  };
  let err = execute(source, json!({}), zero_depth).await.unwrap_err();
  assert!(err.to_string().contains("Recursion depth limit exceeded"));
}

#[tokio::test]
async fn test_zero_timeout_fails_every_call() {
  let engine = ScriptEngine::new(
    GREETING_SCRIPT,
    EngineConfig {
      limits: ExecutionLimits {
        timeout_ms: 0,
        ..Default::default()
      },
      ..Default::default()
    },
  );
  let err = call(&engine, json!({})).await.unwrap_err();
  assert!(matches!(err, EngineError::Timeout { ms: 0 }));
  engine.dispose();
}

#[tokio::test]
async fn test_get_io_and_grouping_surface() {
  let engine = ScriptEngine::new(GREETING_SCRIPT, EngineConfig::default());
  let io = engine.get_io().await.unwrap();
  assert!(io.inputs.contains_key("message"));
  assert!(io.inputs.contains_key("count"));
  assert_eq!(io.raw()["inputs"]["message"]["default"], json!("Hello"));
  engine.dispose();
}

#[tokio::test]
async fn test_invalidate_if_changed_evicts_on_single_byte_change() {
  let registry = Arc::new(InMemoryRegistry::new());
  registry.register("helper", DOUBLER_SCRIPT);

  let source = r#"
export const io = { inputs: {}, outputs: {} };
export default async function run(inputs, context) {
  await context.importScript("helper");
  return {};
}
"#;

  let engine = ScriptEngine::new(source, config_with_registry(registry));
  engine.wait_for_initialization().await.unwrap();

  // Unchanged source leaves the entry in place.
  assert!(!engine.invalidate_if_changed("helper", DOUBLER_SCRIPT));
  assert_eq!(engine.cache_stats().dependency_entries, 1);

  // One changed byte evicts.
  let mut changed = DOUBLER_SCRIPT.to_string();
  changed.push(' ');
  assert!(engine.invalidate_if_changed("helper", &changed));
  assert_eq!(engine.cache_stats().dependency_entries, 0);

  engine.dispose();
}

#[tokio::test]
async fn test_execute_with_validation_names_missing_input() {
  let source = r#"
export const io = {
  inputs: { required_text: 'text' },
  outputs: {},
};
export default async function run(inputs) { return {}; }
"#;

  let err = execute_with_validation(source, json!({}), EngineConfig::default())
    .await
    .unwrap_err();
  assert_eq!(
    err.to_string(),
    "Input validation failed: Missing required input: required_text"
  );

  let ok = execute_with_validation(source, json!({ "required_text": "present" }), EngineConfig::default())
    .await;
  assert!(ok.is_ok());
}

#[tokio::test]
async fn test_validate_is_planning_only() {
  let outcome = validate(GREETING_SCRIPT, EngineConfig::default()).await;
  assert!(outcome.valid, "errors: {:?}", outcome.errors);
  assert!(outcome.io.is_some());
  assert!(outcome.dependencies.is_empty());

  let outcome = validate("not a script", EngineConfig::default()).await;
  assert!(!outcome.valid);
  assert!(!outcome.errors.is_empty());
}

#[tokio::test]
async fn test_execute_batch_isolates_failures() {
  let items = vec![
    BatchItem {
      content: GREETING_SCRIPT.to_string(),
      inputs: json!({ "message": "one" }),
      id: Some("first".to_string()),
    },
    BatchItem {
      content: "broken".to_string(),
      inputs: json!({}),
      id: None,
    },
    BatchItem {
      content: GREETING_SCRIPT.to_string(),
      inputs: json!({ "count": 2 }),
      id: Some("third".to_string()),
    },
  ];

  let outcomes = execute_batch(items, EngineConfig::default()).await;
  assert_eq!(outcomes.len(), 3);

  assert_eq!(outcomes[0].id, "first");
  assert!(outcomes[0].success);
  assert_eq!(outcomes[0].result.as_ref().unwrap()["result"], json!("one"));

  assert_eq!(outcomes[1].id, "script-1");
  assert!(!outcomes[1].success);
  assert!(outcomes[1].error.is_some());

  assert!(outcomes[2].success);
  assert_eq!(
    outcomes[2].result.as_ref().unwrap()["result"],
    json!("Hello Hello")
  );
}

#[tokio::test]
async fn test_benchmark_collects_timings() {
  let report = benchmark(GREETING_SCRIPT, json!({}), 3, EngineConfig::default())
    .await
    .unwrap();
  assert_eq!(report.times_ms.len(), 3);
  assert_eq!(report.results.len(), 3);
  assert!(report.min_ms <= report.average_ms);
  assert!(report.average_ms <= report.max_ms);
  assert_eq!(report.results[0], json!({ "result": "Hello" }));
}

#[tokio::test]
async fn test_cancellation_before_execution() {
  let engine = ScriptEngine::new(GREETING_SCRIPT, EngineConfig::default());
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = engine.call(json!({}), cancel).await.unwrap_err();
  assert!(matches!(err, EngineError::Cancelled));
  engine.dispose();
}

#[tokio::test]
async fn test_planning_twice_yields_identical_interface() {
  let engine_a = ScriptEngine::new(GREETING_SCRIPT, EngineConfig::default());
  let engine_b = ScriptEngine::new(GREETING_SCRIPT, EngineConfig::default());

  let io_a = engine_a.get_io().await.unwrap();
  let io_b = engine_b.get_io().await.unwrap();
  assert_eq!(io_a.raw(), io_b.raw());
  assert_eq!(
    engine_a.get_dependencies().await.unwrap(),
    engine_b.get_dependencies().await.unwrap()
  );

  engine_a.dispose();
  engine_b.dispose();
}

#[tokio::test]
async fn test_reusable_handle() {
  let handle = calyx_engine::create_reusable(GREETING_SCRIPT, EngineConfig::default());

  let io = handle.get_io().await.unwrap();
  assert!(io.inputs.contains_key("count"));

  let first = handle.execute(json!({})).await.unwrap();
  let second = handle.execute(json!({ "message": "again" })).await.unwrap();
  assert_eq!(first["result"], json!("Hello"));
  assert_eq!(second["result"], json!("again"));

  handle.dispose();
}

#[tokio::test]
async fn test_hot_reloadable_handle() {
  let source = Arc::new(Mutex::new(
    "export const io = { inputs: {}, outputs: { version: 'integer' } };\n\
     export default async function () { return { version: 1 }; }"
      .to_string(),
  ));

  let current = Arc::clone(&source);
  let handle = calyx_engine::create_hot_reloadable(
    Arc::new(move || {
      let current = Arc::clone(&current);
      Box::pin(async move { Ok(current.lock().unwrap().clone()) })
    }),
    EngineConfig::default(),
  );

  assert_eq!(handle.execute(json!({})).await.unwrap(), json!({ "version": 1 }));

  *source.lock().unwrap() =
    "export const io = { inputs: {}, outputs: { version: 'integer' } };\n\
     export default async function () { return { version: 2 }; }"
      .to_string();
  handle.reload().await.unwrap();
  assert_eq!(handle.execute(json!({})).await.unwrap(), json!({ "version": 2 }));

  handle.dispose();
}

#[tokio::test]
async fn test_user_code_error_surfaces_message() {
  let source = r#"
export const io = { inputs: {}, outputs: {} };
export default async function run() {
  throw new Error("user code exploded");
}
"#;
  let err = execute(source, json!({}), EngineConfig::default()).await.unwrap_err();
  assert!(matches!(err, EngineError::Execution { .. }));
  assert!(err.to_string().contains("user code exploded"));
}
