//! Resource monitoring: periodic heap sampling with limit enforcement.
//!
//! The monitor samples process memory on a fixed interval while started, and
//! on demand via [`ResourceMonitor::check`] (the import path triggers one
//! per import). Where the platform offers no cheap heap introspection the
//! sampler degrades to a no-op that still counts samples.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::warn;

pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1_000;

const MIB: u64 = 1024 * 1024;

/// Monitor configuration.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
  pub max_memory_bytes: u64,
  pub check_interval_ms: u64,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
      check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
    }
  }
}

/// Fatal monitor outcome.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MonitorError {
  #[error("Memory limit exceeded: {used_mib}MB used (limit {limit_mib}MB)")]
  MemoryLimit { used_mib: u64, limit_mib: u64 },
}

/// A sampled snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceStats {
  pub current_bytes: u64,
  pub max_observed_bytes: u64,
  pub limit_bytes: u64,
  pub percent: f64,
  pub duration_ms: u64,
  pub samples: u64,
}

#[derive(Default)]
struct Inner {
  samples: u64,
  current_bytes: u64,
  max_observed_bytes: u64,
  started_at: Option<Instant>,
  breach: Option<MonitorError>,
}

type BreachHook = Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>;

/// Periodic process-heap sampler with limit enforcement.
pub struct ResourceMonitor {
  config: MonitorConfig,
  inner: Arc<Mutex<Inner>>,
  task: Mutex<Option<JoinHandle<()>>>,
  on_breach: BreachHook,
}

impl ResourceMonitor {
  pub fn new(config: MonitorConfig) -> Self {
    Self {
      config,
      inner: Arc::new(Mutex::new(Inner::default())),
      task: Mutex::new(None),
      on_breach: Arc::new(Mutex::new(None)),
    }
  }

  /// Install a hook invoked once when a sample first exceeds the limit.
  /// The host uses this to terminate the running isolate.
  pub fn set_breach_hook(&self, hook: Box<dyn Fn() + Send + Sync>) {
    *self.on_breach.lock().unwrap_or_else(|e| e.into_inner()) = Some(hook);
  }

  /// Begin periodic sampling. Restarting resets the observation window but
  /// keeps the lifetime sample count.
  pub fn start(&self) {
    self.stop();
    {
      let mut inner = self.lock();
      inner.started_at = Some(Instant::now());
      inner.breach = None;
      inner.max_observed_bytes = 0;
    }
    let inner = Arc::clone(&self.inner);
    let on_breach = Arc::clone(&self.on_breach);
    let config = self.config;
    let interval = Duration::from_millis(config.check_interval_ms.max(1));
    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
      // The first tick fires immediately; skip it so the interval is real.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        sample(&inner, &on_breach, config);
      }
    });
    *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
  }

  /// Stop periodic sampling.
  pub fn stop(&self) {
    if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
      handle.abort();
    }
  }

  /// Manual sample. Fails if this or any earlier sample breached the limit.
  pub fn check(&self) -> Result<(), MonitorError> {
    sample(&self.inner, &self.on_breach, self.config);
    match &self.lock().breach {
      Some(err) => Err(err.clone()),
      None => Ok(()),
    }
  }

  /// The breach recorded during this observation window, if any.
  pub fn breach(&self) -> Option<MonitorError> {
    self.lock().breach.clone()
  }

  /// Current snapshot.
  pub fn stats(&self) -> ResourceStats {
    let inner = self.lock();
    let limit = self.config.max_memory_bytes;
    ResourceStats {
      current_bytes: inner.current_bytes,
      max_observed_bytes: inner.max_observed_bytes,
      limit_bytes: limit,
      percent: if limit == 0 {
        0.0
      } else {
        inner.current_bytes as f64 / limit as f64 * 100.0
      },
      duration_ms: inner
        .started_at
        .map(|t| t.elapsed().as_millis() as u64)
        .unwrap_or(0),
      samples: inner.samples,
    }
  }

  /// Stop sampling and drop observations.
  pub fn dispose(&self) {
    self.stop();
    *self.lock() = Inner::default();
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl Drop for ResourceMonitor {
  fn drop(&mut self) {
    if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
      handle.abort();
    }
  }
}

fn sample(inner: &Mutex<Inner>, on_breach: &BreachHook, config: MonitorConfig) {
  let used = sample_process_memory();
  let limit = config.max_memory_bytes;
  let mut breached_now = false;
  {
    let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.samples += 1;
    if let Some(used) = used {
      inner.current_bytes = used;
      inner.max_observed_bytes = inner.max_observed_bytes.max(used);
      if used > limit && inner.breach.is_none() {
        inner.breach = Some(MonitorError::MemoryLimit {
          used_mib: used / MIB,
          limit_mib: limit / MIB,
        });
        breached_now = true;
      } else if used >= limit / 5 * 4 && inner.samples % 5 == 0 {
        warn!(
          used_mib = used / MIB,
          limit_mib = limit / MIB,
          "memory utilisation above 80%"
        );
      }
    }
  }
  if breached_now
    && let Some(hook) = on_breach.lock().unwrap_or_else(|e| e.into_inner()).as_ref()
  {
    hook();
  }
}

/// Resident set size of this process, where the platform exposes it.
#[cfg(target_os = "linux")]
fn sample_process_memory() -> Option<u64> {
  let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
  let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
  Some(resident_pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn sample_process_memory() -> Option<u64> {
  None
}
