//! Dependency planning: breadth-first loading of a script tree.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use calyx_cache::{CacheOrigin, ScriptCache, content_hash};
use calyx_registry::ScriptRegistry;
use calyx_validator::ScriptValidator;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::script::{LoadedScript, introspect};

/// The outcome of one planning pass: the main script plus every dependency
/// identifier loaded, in BFS discovery order.
#[derive(Debug)]
pub struct Plan {
  pub main: Arc<LoadedScript>,
  pub dependencies: Vec<String>,
}

/// Load, validate, introspect, and cache the main script and its declared
/// dependency tree.
///
/// Identifier-level cycles are benign: each id is processed at most once.
/// A failed pass removes every entry it inserted, so the cache never holds
/// partial state from an aborted plan.
pub async fn plan(
  main_id: &str,
  main_source: &str,
  registry: Option<&Arc<dyn ScriptRegistry>>,
  cache: &ScriptCache<Arc<LoadedScript>>,
  validator: &ScriptValidator,
) -> Result<Plan, EngineError> {
  cache.cleanup();

  let mut inserted: Vec<String> = Vec::new();
  let result = plan_inner(main_id, main_source, registry, cache, validator, &mut inserted).await;

  if result.is_err() {
    for id in inserted {
      cache.invalidate(&id);
    }
  }
  result
}

async fn plan_inner(
  main_id: &str,
  main_source: &str,
  registry: Option<&Arc<dyn ScriptRegistry>>,
  cache: &ScriptCache<Arc<LoadedScript>>,
  validator: &ScriptValidator,
  inserted: &mut Vec<String>,
) -> Result<Plan, EngineError> {
  let report = validator.validate(main_source);
  if !report.valid {
    return Err(EngineError::Validation {
      summary: report.error_summary(),
    });
  }

  let hash = content_hash(main_source);
  let main = match cache.get(main_id) {
    Some(entry) if entry.content_hash == hash => {
      debug!(id = %main_id, "main script cache hit");
      entry.script
    }
    _ => {
      let script = Arc::new(introspect(main_id, main_source)?);
      cache.put(main_id, Arc::clone(&script), hash, CacheOrigin::Main);
      inserted.push(main_id.to_string());
      script
    }
  };

  let mut processed: HashSet<String> = HashSet::new();
  processed.insert(main_id.to_string());

  let mut queue: VecDeque<String> = main.deps.iter().cloned().collect();
  let mut dependencies = Vec::new();

  while let Some(dep_id) = queue.pop_front() {
    if !processed.insert(dep_id.clone()) {
      continue;
    }

    let script = match cache.get(&dep_id) {
      Some(entry) => {
        debug!(id = %dep_id, "dependency cache hit");
        entry.script
      }
      None => {
        debug!(id = %dep_id, "dependency cache miss");
        let registry = registry.ok_or_else(|| {
          EngineError::Registry(calyx_registry::RegistryError::NotFound {
            id: dep_id.clone(),
            message: "no registry configured to resolve dependencies".to_string(),
          })
        })?;
        let source = registry.resolve(&dep_id).await?.into_source(&dep_id)?;

        let report = validator.validate(&source);
        if !report.valid {
          return Err(EngineError::Validation {
            summary: format!("dependency '{}': {}", dep_id, report.error_summary()),
          });
        }

        let script = Arc::new(introspect(&dep_id, &source)?);
        cache.put(
          &dep_id,
          Arc::clone(&script),
          content_hash(&source),
          CacheOrigin::Dependency,
        );
        inserted.push(dep_id.clone());
        script
      }
    };

    for nested in &script.deps {
      if !processed.contains(nested) {
        queue.push_back(nested.clone());
      }
    }
    dependencies.push(dep_id);
  }

  info!(
    id = %main_id,
    dependencies = dependencies.len(),
    "planning complete"
  );

  Ok(Plan { main, dependencies })
}
