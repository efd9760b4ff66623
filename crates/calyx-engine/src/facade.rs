//! Convenience wrappers over the engine: one-shot execution, validation,
//! batches, reusable and hot-reloadable handles, and benchmarking.

use std::sync::Arc;
use std::time::Instant;

use calyx_schema::IoSchema;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineConfig, ScriptEngine};
use crate::error::EngineError;
use crate::script::SourceResolver;

/// One-shot: construct, call once, dispose.
pub async fn execute(
  source: &str,
  inputs: Value,
  config: EngineConfig,
) -> Result<Value, EngineError> {
  let engine = ScriptEngine::new(source, config);
  let result = engine.call(inputs, CancellationToken::new()).await;
  engine.dispose();
  result
}

/// One-shot with strict input validation before the call: every required
/// input must be supplied and every supplied input must conform.
pub async fn execute_with_validation(
  source: &str,
  inputs: Value,
  config: EngineConfig,
) -> Result<Value, EngineError> {
  let engine = ScriptEngine::new(source, config);
  let result = match engine.validate_call_inputs(&inputs).await {
    Ok(_) => engine.call(inputs, CancellationToken::new()).await,
    Err(e) => Err(e),
  };
  engine.dispose();
  result
}

/// Planning-only outcome.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
  pub valid: bool,
  pub io: Option<Value>,
  pub dependencies: Vec<String>,
  pub errors: Vec<String>,
}

/// Plan a script without calling it: validation, introspection, and the
/// dependency walk all run; the entry function does not.
pub async fn validate(source: &str, config: EngineConfig) -> ValidationOutcome {
  let engine = ScriptEngine::new(source, config);
  let outcome = match engine.wait_for_initialization().await {
    Ok(()) => {
      let io = engine.get_io().await.ok().map(|io| io.raw().clone());
      let dependencies = engine.get_dependencies().await.unwrap_or_default();
      ValidationOutcome {
        valid: true,
        io,
        dependencies,
        errors: Vec::new(),
      }
    }
    Err(e) => ValidationOutcome {
      valid: false,
      io: None,
      dependencies: Vec::new(),
      errors: vec![e.to_string()],
    },
  };
  engine.dispose();
  outcome
}

/// One script in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
  pub content: String,
  pub inputs: Value,
  pub id: Option<String>,
}

/// Per-item batch outcome.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
  pub id: String,
  pub success: bool,
  pub result: Option<Value>,
  pub error: Option<String>,
}

/// Run a batch sequentially; one item's failure does not stop the rest.
pub async fn execute_batch(items: Vec<BatchItem>, config: EngineConfig) -> Vec<BatchOutcome> {
  let mut outcomes = Vec::with_capacity(items.len());
  for (index, item) in items.into_iter().enumerate() {
    let id = item.id.unwrap_or_else(|| format!("script-{}", index));
    let outcome = match execute(&item.content, item.inputs, config.clone()).await {
      Ok(result) => BatchOutcome {
        id,
        success: true,
        result: Some(result),
        error: None,
      },
      Err(e) => BatchOutcome {
        id,
        success: false,
        result: None,
        error: Some(e.to_string()),
      },
    };
    outcomes.push(outcome);
  }
  outcomes
}

/// A prepared script handle for repeated calls.
pub struct ReusableScript {
  engine: ScriptEngine,
}

pub fn create_reusable(source: &str, config: EngineConfig) -> ReusableScript {
  ReusableScript {
    engine: ScriptEngine::new(source, config),
  }
}

impl ReusableScript {
  pub async fn execute(&self, inputs: Value) -> Result<Value, EngineError> {
    self.engine.call(inputs, CancellationToken::new()).await
  }

  pub async fn get_io(&self) -> Result<Arc<IoSchema>, EngineError> {
    self.engine.get_io().await
  }

  pub async fn get_dependencies(&self) -> Result<Vec<String>, EngineError> {
    self.engine.get_dependencies().await
  }

  pub fn dispose(&self) {
    self.engine.dispose();
  }
}

/// A handle whose source is re-fetched through a resolver on `reload`.
pub struct HotReloadableScript {
  engine: ScriptEngine,
}

pub fn create_hot_reloadable(resolver: SourceResolver, config: EngineConfig) -> HotReloadableScript {
  HotReloadableScript {
    engine: ScriptEngine::new(crate::script::ScriptInput::Resolver(resolver), config),
  }
}

impl HotReloadableScript {
  pub async fn execute(&self, inputs: Value) -> Result<Value, EngineError> {
    self.engine.call(inputs, CancellationToken::new()).await
  }

  /// Re-plan from the resolver. Failures propagate and leave the handle in
  /// the failed state until the next successful reload.
  pub async fn reload(&self) -> Result<(), EngineError> {
    self.engine.reload().await
  }

  pub async fn get_io(&self) -> Result<Arc<IoSchema>, EngineError> {
    self.engine.get_io().await
  }

  pub fn dispose(&self) {
    self.engine.dispose();
  }
}

/// Timing summary over repeated calls.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
  pub average_ms: f64,
  pub min_ms: f64,
  pub max_ms: f64,
  pub times_ms: Vec<f64>,
  pub results: Vec<Value>,
}

/// Call a script `iterations` times against one prepared engine and collect
/// wall-clock timings.
pub async fn benchmark(
  source: &str,
  inputs: Value,
  iterations: usize,
  config: EngineConfig,
) -> Result<BenchmarkReport, EngineError> {
  let engine = ScriptEngine::new(source, config);
  let mut times_ms = Vec::with_capacity(iterations);
  let mut results = Vec::with_capacity(iterations);

  for _ in 0..iterations {
    let started = Instant::now();
    let result = engine.call(inputs.clone(), CancellationToken::new()).await;
    let elapsed = started.elapsed().as_secs_f64() * 1000.0;
    match result {
      Ok(value) => {
        times_ms.push(elapsed);
        results.push(value);
      }
      Err(e) => {
        engine.dispose();
        return Err(e);
      }
    }
  }
  engine.dispose();

  let count = times_ms.len().max(1) as f64;
  let average_ms = times_ms.iter().sum::<f64>() / count;
  let min_ms = times_ms.iter().cloned().fold(f64::INFINITY, f64::min);
  let max_ms = times_ms.iter().cloned().fold(0.0_f64, f64::max);

  Ok(BenchmarkReport {
    average_ms,
    min_ms: if min_ms.is_finite() { min_ms } else { 0.0 },
    max_ms,
    times_ms,
    results,
  })
}
