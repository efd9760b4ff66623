//! Environment-switching registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::{ResolvedScript, ScriptRegistry};

/// Deployment environments the dispatching registry understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
  Development,
  Staging,
  Production,
  Default,
}

impl Environment {
  /// Parse an environment tag; unrecognised tags map to `Default`.
  pub fn parse(tag: &str) -> Self {
    match tag.to_ascii_lowercase().as_str() {
      "development" | "dev" => Self::Development,
      "staging" | "stage" => Self::Staging,
      "production" | "prod" => Self::Production,
      _ => Self::Default,
    }
  }

  /// Read the process environment tag (`CALYX_ENV`).
  pub fn from_process_env() -> Self {
    std::env::var("CALYX_ENV")
      .map(|tag| Self::parse(&tag))
      .unwrap_or(Self::Default)
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Development => "development",
      Self::Staging => "staging",
      Self::Production => "production",
      Self::Default => "default",
    }
  }
}

/// Dispatches to one of several registries by deployment environment.
///
/// The active environment is read from the process at construction and can
/// be switched at runtime. Resolution falls back to the `Default` child when
/// the active environment has none.
pub struct EnvironmentRegistry {
  current: RwLock<Environment>,
  children: HashMap<Environment, Arc<dyn ScriptRegistry>>,
}

impl EnvironmentRegistry {
  pub fn new() -> Self {
    Self {
      current: RwLock::new(Environment::from_process_env()),
      children: HashMap::new(),
    }
  }

  pub fn with_environment(environment: Environment) -> Self {
    Self {
      current: RwLock::new(environment),
      children: HashMap::new(),
    }
  }

  /// Attach a registry for an environment (builder style).
  pub fn register(mut self, environment: Environment, registry: Arc<dyn ScriptRegistry>) -> Self {
    self.children.insert(environment, registry);
    self
  }

  pub fn environment(&self) -> Environment {
    *self.current.read().unwrap_or_else(|e| e.into_inner())
  }

  /// Switch the active environment.
  pub fn set_environment(&self, environment: Environment) {
    *self.current.write().unwrap_or_else(|e| e.into_inner()) = environment;
  }
}

impl Default for EnvironmentRegistry {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ScriptRegistry for EnvironmentRegistry {
  async fn resolve(&self, id: &str) -> Result<ResolvedScript, RegistryError> {
    let environment = self.environment();
    let child = self
      .children
      .get(&environment)
      .or_else(|| self.children.get(&Environment::Default))
      .ok_or_else(|| RegistryError::NoEnvironment {
        environment: environment.name().to_string(),
      })?;
    child.resolve(id).await
  }
}
