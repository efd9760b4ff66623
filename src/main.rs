use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use calyx_engine::{EngineConfig, ScriptEngine, validate};
use calyx_registry::FsRegistry;

/// Calyx - a script execution engine with planned dependencies and
/// capability injection
#[derive(Parser)]
#[command(name = "calyx")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the script registry directory (default: ~/.calyx/scripts)
  #[arg(long, global = true)]
  scripts_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a script with a JSON input payload from stdin
  Run {
    /// Path to the script file
    script_file: PathBuf,

    /// Timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
  },

  /// Validate a script and print its interface and dependencies
  Validate {
    /// Path to the script file
    script_file: PathBuf,
  },

  /// Plan a script and print the engine's cache statistics
  CacheStats {
    /// Path to the script file
    script_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let scripts_dir = cli.scripts_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".calyx")
      .join("scripts")
  });

  // The engine's runtime is not Send; keep everything on one thread.
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()?;

  match cli.command {
    Some(Commands::Run {
      script_file,
      timeout_ms,
    }) => rt.block_on(run_script(script_file, scripts_dir, timeout_ms)),
    Some(Commands::Validate { script_file }) => {
      rt.block_on(validate_script(script_file, scripts_dir))
    }
    Some(Commands::CacheStats { script_file }) => {
      rt.block_on(cache_stats(script_file, scripts_dir))
    }
    None => {
      println!("calyx - use --help to see available commands");
      Ok(())
    }
  }
}

fn engine_config(scripts_dir: PathBuf, timeout_ms: Option<u64>) -> EngineConfig {
  let mut config = EngineConfig {
    registry: Some(Arc::new(FsRegistry::new(scripts_dir))),
    ..Default::default()
  };
  if let Some(timeout_ms) = timeout_ms {
    config.limits.timeout_ms = timeout_ms;
  }
  config
}

async fn run_script(
  script_file: PathBuf,
  scripts_dir: PathBuf,
  timeout_ms: Option<u64>,
) -> Result<()> {
  let source = tokio::fs::read_to_string(&script_file)
    .await
    .with_context(|| format!("failed to read script file: {}", script_file.display()))?;

  let inputs = read_inputs_from_stdin()?;
  eprintln!("Inputs: {}", inputs);

  let engine = ScriptEngine::new(source.as_str(), engine_config(scripts_dir, timeout_ms));
  let result = engine
    .call(inputs, CancellationToken::new())
    .await
    .context("script execution failed")?;
  engine.dispose();

  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
}

async fn validate_script(script_file: PathBuf, scripts_dir: PathBuf) -> Result<()> {
  let source = tokio::fs::read_to_string(&script_file)
    .await
    .with_context(|| format!("failed to read script file: {}", script_file.display()))?;

  let outcome = validate(&source, engine_config(scripts_dir, None)).await;
  if outcome.valid {
    eprintln!("Script is valid");
    if let Some(io) = outcome.io {
      println!("{}", serde_json::to_string_pretty(&io)?);
    }
    if !outcome.dependencies.is_empty() {
      eprintln!("Dependencies: {}", outcome.dependencies.join(", "));
    }
    Ok(())
  } else {
    for error in &outcome.errors {
      eprintln!("error: {}", error);
    }
    anyhow::bail!("script failed validation");
  }
}

async fn cache_stats(script_file: PathBuf, scripts_dir: PathBuf) -> Result<()> {
  let source = tokio::fs::read_to_string(&script_file)
    .await
    .with_context(|| format!("failed to read script file: {}", script_file.display()))?;

  let engine = ScriptEngine::new(source.as_str(), engine_config(scripts_dir, None));
  engine
    .wait_for_initialization()
    .await
    .context("script planning failed")?;

  let stats = engine.cache_stats();
  eprintln!("Planned {} cached scripts", stats.entries);
  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({
      "entries": stats.entries,
      "mainEntries": stats.main_entries,
      "dependencyEntries": stats.dependency_entries,
      "averageAgeMs": stats.average_age_ms,
    }))?
  );
  engine.dispose();

  Ok(())
}

fn read_inputs_from_stdin() -> Result<serde_json::Value> {
  if io::stdin().is_terminal() {
    // No stdin pipe, use empty inputs
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read inputs from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse input JSON from stdin")
    }
  }
}
