//! vault-sync: commit, rebase-pull, resolve and push a git-backed vault.
//!
//! Exit codes: 0 on success (including a completed dry run), 2 for usage
//! errors, and a distinct non-zero code per fatal condition otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use vault_sync::SyncEngine;
use vault_sync_core::{RunMode, VaultConfig};

/// Synchronize a git-backed vault with its remote.
#[derive(Parser, Debug)]
#[command(name = "vault-sync", version, about, disable_version_flag = true)]
struct Cli {
    /// Report what would happen without changing the vault.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Vault directory.
    #[arg(short = 'C', long, default_value = ".")]
    vault: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("vault-sync: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref().map(expand_tilde);
    let config = VaultConfig::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.sync.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Normal
    };
    let engine = SyncEngine::open(&cli.vault, config, mode)
        .with_context(|| format!("failed to open vault at {}", cli.vault.display()))?;

    match engine.run() {
        Ok(stats) => {
            if mode.is_dry_run() {
                println!("Dry run complete for '{}', no changes made", stats.branch);
            } else {
                println!(
                    "Sync complete on '{}': committed={}, conflict rounds={}, resolved={}, pushed={}",
                    stats.branch,
                    stats.committed,
                    stats.conflict_rounds,
                    stats.conflicts_resolved,
                    stats.pushed
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("vault-sync: {e}");
            eprintln!("See {} for details", engine.log().path().display());
            Ok(ExitCode::from(e.exit_code()))
        }
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
