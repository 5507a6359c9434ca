//! warpplan: the WarpPlan daemon.
//!
//! Reads monitor events as JSON lines, plans one scaling decision per
//! latency window, and writes action events as JSON lines:
//! - Configuration (defaults, TOML file, environment)
//! - Oracle client (only when an API key is configured)
//! - Planner loop
//! - stdin/stdout JSON-lines streams
//!
//! # Usage
//!
//! ```text
//! monitor | warpplan run --config planner.toml | executor
//! warpplan replay --file windows.jsonl --seed 7
//! warpplan config
//! ```
//!
//! Logs go to stderr; stdout carries only action events.

mod pump;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warpplan_core::{PlannerConfig, SystemClock};
use warpplan_oracle::OracleClient;
use warpplan_planner::Planner;

const DEFAULT_LOG_FILTER: &str = "info,warpplan=debug";

#[derive(Parser)]
#[command(name = "warpplan", about = "WarpPlan autoscaling planner")]
struct Cli {
    /// Log output format (written to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Plan from stdin to stdout until EOF or Ctrl-C.
    Run {
        /// TOML configuration file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for heartbeat jitter.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Feed a JSON-lines file through the planner and print the actions.
    Replay {
        /// Recorded events, one JSON object per line.
        #[arg(long)]
        file: PathBuf,

        /// TOML configuration file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for heartbeat jitter.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the effective configuration with the API key redacted.
    Config {
        /// TOML configuration file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run { config, seed } => run(config.as_deref(), seed).await,
        Command::Replay { file, config, seed } => replay(&file, config.as_deref(), seed).await,
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Defaults, then the optional file, then the environment.
fn load_config(path: Option<&Path>) -> anyhow::Result<PlannerConfig> {
    let Some(path) = path else {
        return PlannerConfig::from_env()
            .context("loading config from environment");
    };
    let mut config = PlannerConfig::from_file(path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.apply_env().context("reading environment")?;
    config.validate()?;
    Ok(config)
}

fn build_planner(config: PlannerConfig, seed: Option<u64>) -> anyhow::Result<Planner> {
    if !config.oracle_enabled() {
        warn!("LLM_API_KEY not set, planning with the heuristic only");
    }
    let oracle = OracleClient::from_config(&config)
        .context("building oracle client")?;

    let planner = Planner::new(config, oracle, Arc::new(SystemClock));
    Ok(match seed {
        Some(seed) => planner.with_seed(seed),
        None => planner,
    })
}

async fn run(config_path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mut planner = build_planner(config, seed)?;
    info!(config = ?planner.config(), "WarpPlan starting");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "failed to install Ctrl-C handler"),
        }
    });

    // ── Event pipeline ─────────────────────────────────────────

    let (event_tx, event_rx) = mpsc::channel(pump::CHANNEL_CAPACITY);
    // Not joined: the reader may still be blocked on stdin at shutdown.
    let _reader = pump::spawn_stdin_reader(event_tx)
        .context("spawning stdin reader")?;
    let mut stdout = tokio::io::stdout();
    let stats = pump::drive(&mut planner, event_rx, &mut stdout, shutdown_rx)
        .await?;

    info!(
        actions = stats.actions_published,
        lines = stats.lines_written,
        "WarpPlan stopped"
    );
    Ok(())
}

async fn replay(file: &Path, config_path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mut planner = build_planner(config, seed)?;

    let input = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    // Never signalled; replay ends at end of file.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut stdout = tokio::io::stdout();
    let input = BufReader::new(input);

    let stats = pump::pump(&mut planner, input, &mut stdout, shutdown_rx)
        .await?;
    info!(
        file = %file.display(),
        events = stats.events_read,
        actions = stats.actions_published,
        "replay finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "warpplan",
            "run",
            "--config",
            "planner.toml",
            "--seed",
            "9",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        match cli.command {
            Command::Run { config, seed } => {
                assert_eq!(config, Some(PathBuf::from("planner.toml")));
                assert_eq!(seed, Some(9));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn replay_requires_file() {
        assert!(Cli::try_parse_from(["warpplan", "replay"]).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/warpplan.toml"))).unwrap_err();
        assert!(err.to_string().contains("loading config"));
    }

    #[test]
    fn environment_alone_is_enough() {
        let config = load_config(None).unwrap();
        if std::env::var_os("PLAN_TARGET").is_none() {
            assert_eq!(config.target, "app");
        }
    }

    #[test]
    fn file_values_survive_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.toml");
        std::fs::write(&path, "upscale_p95_ms = 450.0\ntarget = \"checkout\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        // Environment overrides win over the file.
        if std::env::var_os("UPSCALE_P95_MS").is_none() {
            assert_eq!(config.upscale_p95_ms, 450.0);
        }
        if std::env::var_os("PLAN_TARGET").is_none() {
            assert_eq!(config.target, "checkout");
        }
    }
}
