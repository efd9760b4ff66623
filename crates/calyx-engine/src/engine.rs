//! The engine surface.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use calyx_cache::{CachePolicy, CachePolicyUpdate, CacheStats, ScriptCache};
use calyx_host::{HostCall, run_call};
use calyx_limits::{ExecutionLimits, LimitsUpdate};
use calyx_monitor::{MonitorConfig, ResourceMonitor, ResourceStats};
use calyx_registry::ScriptRegistry;
use calyx_schema::{IoSchema, validate_inputs};
use calyx_validator::ScriptValidator;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::EngineError;
use crate::planner;
use crate::script::{LoadedScript, ScriptInput};

/// Engine configuration.
#[derive(Clone, Default)]
pub struct EngineConfig {
  /// Resolver for declared dependencies and string imports.
  pub registry: Option<Arc<dyn ScriptRegistry>>,
  /// Execution bounds.
  pub limits: ExecutionLimits,
  /// Resource-monitor bounds.
  pub monitor: MonitorConfig,
  /// Cache eviction policy.
  pub cache_policy: CachePolicy,
  /// Values shallow-merged over the base capabilities; providers win.
  pub context_providers: Map<String, Value>,
  /// Validator to use instead of the built-in pattern table. Build one with
  /// custom patterns added or defaults removed before handing it over.
  pub validator: Option<Arc<ScriptValidator>>,
}

enum InitState {
  Pending,
  Ready { main: Arc<LoadedScript>, dependencies: Vec<String> },
  Failed { message: String },
}

/// A prepared, callable handle bound to one main script and a configuration.
pub struct ScriptEngine {
  input: ScriptInput,
  main_id: String,
  registry: Option<Arc<dyn ScriptRegistry>>,
  limits: Mutex<ExecutionLimits>,
  providers: Map<String, Value>,
  cache: Arc<ScriptCache<Arc<LoadedScript>>>,
  monitor: Arc<ResourceMonitor>,
  validator: Arc<ScriptValidator>,
  state: tokio::sync::Mutex<InitState>,
}

impl ScriptEngine {
  /// Create an engine. Planning runs on the first call or on
  /// [`ScriptEngine::wait_for_initialization`].
  pub fn new(input: impl Into<ScriptInput>, config: EngineConfig) -> Self {
    Self {
      input: input.into(),
      main_id: format!("main-{}", uuid::Uuid::new_v4()),
      registry: config.registry,
      limits: Mutex::new(config.limits),
      providers: config.context_providers,
      cache: Arc::new(ScriptCache::new(config.cache_policy)),
      monitor: Arc::new(ResourceMonitor::new(config.monitor)),
      validator: config
        .validator
        .unwrap_or_else(|| Arc::new(ScriptValidator::new())),
      state: tokio::sync::Mutex::new(InitState::Pending),
    }
  }

  /// Run planning if it has not happened yet; fail fast afterwards.
  async fn ensure_initialized(&self) -> Result<(Arc<LoadedScript>, Vec<String>), EngineError> {
    let mut state = self.state.lock().await;
    match &*state {
      InitState::Ready { main, dependencies } => Ok((Arc::clone(main), dependencies.clone())),
      InitState::Failed { message } => Err(EngineError::InitFailed {
        message: message.clone(),
      }),
      InitState::Pending => {
        let started = Instant::now();
        let result = self.initialize().await;
        match result {
          Ok(plan) => {
            info!(
              id = %self.main_id,
              elapsed_ms = started.elapsed().as_millis() as u64,
              "engine initialised"
            );
            let main = Arc::clone(&plan.main);
            let dependencies = plan.dependencies.clone();
            *state = InitState::Ready {
              main: plan.main,
              dependencies: plan.dependencies,
            };
            Ok((main, dependencies))
          }
          Err(e) => {
            error!(id = %self.main_id, error = %e, "engine initialisation failed");
            *state = InitState::Failed {
              message: e.to_string(),
            };
            Err(e)
          }
        }
      }
    }
  }

  async fn initialize(&self) -> Result<planner::Plan, EngineError> {
    let source = self.input.resolve().await?;
    planner::plan(
      &self.main_id,
      &source,
      self.registry.as_ref(),
      &self.cache,
      &self.validator,
    )
    .await
  }

  /// Await initialization, surfacing any planning failure.
  pub async fn wait_for_initialization(&self) -> Result<(), EngineError> {
    self.ensure_initialized().await.map(|_| ())
  }

  /// Validate a caller input map against the main io schema without
  /// executing anything.
  pub async fn validate_call_inputs(&self, inputs: &Value) -> Result<Map<String, Value>, EngineError> {
    let (main, _) = self.ensure_initialized().await?;
    validated_map(inputs, &main.io)
  }

  /// Execute the main script with an input map.
  pub async fn call(&self, inputs: Value, cancel: CancellationToken) -> Result<Value, EngineError> {
    let (main, _) = self.ensure_initialized().await?;

    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }

    let validated = validated_map(&inputs, &main.io)?;
    let limits = *self.limits.lock().unwrap_or_else(|e| e.into_inner());

    self.monitor.start();
    let started = Instant::now();

    let call = HostCall {
      entry_source: main.entry_source.clone(),
      inputs: validated,
      providers: self.providers.clone(),
      limits,
      registry: self.registry.clone(),
      monitor: Arc::clone(&self.monitor),
      validator: Arc::clone(&self.validator),
    };

    let result = tokio::select! {
      result = run_call(call) => result.map_err(EngineError::from),
      _ = cancel.cancelled() => Err(EngineError::Cancelled),
    };

    self.monitor.stop();

    match &result {
      Ok(_) => info!(
        id = %self.main_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "script completed"
      ),
      Err(e) => error!(
        id = %self.main_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        error = %e,
        "script failed"
      ),
    }

    result
  }

  /// The main script's interface. Requires initialization.
  pub async fn get_io(&self) -> Result<Arc<IoSchema>, EngineError> {
    let (main, _) = self.ensure_initialized().await?;
    Ok(Arc::clone(&main.io))
  }

  /// Identifiers of every dependency loaded during planning, in discovery
  /// order.
  pub async fn get_dependencies(&self) -> Result<Vec<String>, EngineError> {
    let (_, dependencies) = self.ensure_initialized().await?;
    Ok(dependencies)
  }

  /// Replace parts of the cache eviction policy.
  pub fn set_cache_policy(&self, update: CachePolicyUpdate) {
    self.cache.set_policy(update);
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.cache.stats()
  }

  /// Drop one cached script. Returns true if it was cached.
  pub fn invalidate_script(&self, id: &str) -> bool {
    self.cache.invalidate(id)
  }

  /// Evict a cached script if `source` no longer matches its hash.
  pub fn invalidate_if_changed(&self, id: &str, source: &str) -> bool {
    self.cache.invalidate_if_changed(id, source)
  }

  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  /// Replace parts of the execution limits.
  pub fn update_limits(&self, update: LimitsUpdate) {
    self.limits.lock().unwrap_or_else(|e| e.into_inner()).update(update);
  }

  pub fn limits(&self) -> ExecutionLimits {
    *self.limits.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn resource_stats(&self) -> ResourceStats {
    self.monitor.stats()
  }

  /// Clear the cache, reset initialization, and re-plan from the current
  /// source input.
  pub async fn reload(&self) -> Result<(), EngineError> {
    {
      let mut state = self.state.lock().await;
      *state = InitState::Pending;
      self.cache.clear();
    }
    info!(id = %self.main_id, "reloading");
    self.wait_for_initialization().await
  }

  /// Release everything the engine holds: cached scripts and the monitor.
  pub fn dispose(&self) {
    self.cache.clear();
    self.monitor.dispose();
  }
}

fn validated_map(inputs: &Value, io: &IoSchema) -> Result<Map<String, Value>, EngineError> {
  let map = match inputs {
    Value::Object(map) => map.clone(),
    Value::Null => Map::new(),
    other => {
      return Err(EngineError::Execution {
        message: format!("script inputs must be an object, got {}", other),
      });
    }
  };
  validate_inputs(&map, io).map_err(EngineError::Input)
}
