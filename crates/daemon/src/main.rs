//! vault-sync daemon: the caller side of the sync engine.
//!
//! `run` performs one bounded sync with a plain-pull fallback, `watch`
//! repeats it on a timer until SIGINT/SIGTERM, `check` prints a diagnostic
//! report and `template` prints a starter configuration.

mod check;
mod runner;
mod scheduler;
mod signals;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vault_sync_core::config::SyncSchedule;
use vault_sync_core::VaultConfig;

use crate::runner::{RunReport, Runner};

/// Keep a git-backed vault synchronized by calling the vault-sync engine.
#[derive(Parser, Debug)]
#[command(name = "vault-sync-daemon", version, about)]
struct Args {
    /// Vault directory.
    #[arg(short = 'C', long, default_value = ".", global = true)]
    vault: PathBuf,

    /// Path to the TOML configuration file (also passed to the engine).
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync, falling back to a plain pull if the engine fails.
    Run,
    /// Sync every `interval_minutes` until interrupted.
    Watch,
    /// Check the vault, the engine and the message tool.
    Check,
    /// Print a configuration file with every default spelled out.
    Template,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match dispatch(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("vault-sync-daemon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(args: Args) -> Result<ExitCode> {
    let config_path = args.config.as_deref().map(expand_tilde);
    let config = VaultConfig::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.sync.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match args.command {
        Command::Template => {
            print!("{}", VaultConfig::default_template());
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            let checks = check::collect(&args.vault, &config);
            Ok(exit_code(check::render(&checks)))
        }
        Command::Run => {
            let runner = Runner::new(&args.vault, config_path.as_deref(), &config.daemon);
            Ok(exit_code(report(&runner.run_once().await)))
        }
        Command::Watch => {
            let interval = match config.daemon.schedule() {
                SyncSchedule::Every(interval) => interval,
                SyncSchedule::Auto => bail!(
                    "no [daemon] interval_minutes configured; in auto mode call `vault-sync-daemon run` around each unit of work"
                ),
            };
            watch(&args.vault, config_path.as_deref(), &config, interval).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn watch(
    vault: &Path,
    config_path: Option<&Path>,
    config: &VaultConfig,
    interval: std::time::Duration,
) {
    info!("========================================");
    info!("  vault-sync daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Vault         : {}", vault.display());
    info!("Engine        : {}", config.daemon.engine_binary.display());
    info!("Schedule      : {}", config.daemon.schedule());
    info!("========================================");

    let runner = Runner::new(vault, config_path, &config.daemon);
    let shutdown = signals::shutdown_flag();
    let stats = scheduler::watch(interval, &shutdown, || {
        let runner = runner.clone();
        async move { report(&runner.run_once().await) }
    })
    .await;

    info!(
        cycles = stats.total_cycles,
        failures = stats.total_failures,
        "vault-sync daemon stopped"
    );
}

/// Log the outcome of one run. Returns whether the vault was fully synced.
fn report(outcome: &RunReport) -> bool {
    match outcome {
        RunReport::Synced => info!("vault synchronized"),
        RunReport::PulledOnly { engine } => {
            warn!(error = %engine, "sync failed, vault updated by plain pull only")
        }
        RunReport::Failed { engine, pull } => {
            error!(engine = %engine, pull = %pull, "sync and fallback pull both failed")
        }
    }
    outcome.is_synced()
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
