//! One bounded sync: run the engine, fall back to a plain pull.
//!
//! The engine runs as a child process under an outer wall-clock limit and is
//! killed when the limit expires. If it fails for any reason the vault is
//! still brought up to date with a time-boxed `git pull`, so the host keeps
//! working on recent notes even when local changes could not be published.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use vault_sync_core::config::DaemonConfig;

/// Why the engine run did not succeed.
#[derive(Debug, Error)]
pub enum EngineFailure {
    #[error("engine binary '{0}' could not be started: {1}")]
    Unavailable(String, std::io::Error),

    #[error("engine exited with code {code}: {detail}")]
    Exited { code: i32, detail: String },

    #[error("engine was killed by a signal")]
    Killed,

    #[error("engine timed out after {0}s")]
    TimedOut(u64),
}

/// Outcome of one [`Runner::run_once`].
#[derive(Debug)]
pub enum RunReport {
    /// The engine completed the full sync.
    Synced,
    /// The engine failed but the plain pull succeeded.
    PulledOnly { engine: EngineFailure },
    /// Both the engine and the plain pull failed.
    Failed {
        engine: EngineFailure,
        pull: String,
    },
}

impl RunReport {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Runs the engine binary against one vault.
#[derive(Debug, Clone)]
pub struct Runner {
    vault: PathBuf,
    config_path: Option<PathBuf>,
    engine_binary: PathBuf,
    engine_timeout: Duration,
    fallback_timeout: Duration,
}

impl Runner {
    pub fn new(vault: &Path, config_path: Option<&Path>, daemon: &DaemonConfig) -> Self {
        Self {
            vault: vault.to_path_buf(),
            config_path: config_path.map(Path::to_path_buf),
            engine_binary: daemon.engine_binary.clone(),
            engine_timeout: Duration::from_secs(daemon.engine_timeout_secs),
            fallback_timeout: Duration::from_secs(daemon.fallback_timeout_secs),
        }
    }

    pub fn with_timeouts(mut self, engine: Duration, fallback: Duration) -> Self {
        self.engine_timeout = engine;
        self.fallback_timeout = fallback;
        self
    }

    pub async fn run_once(&self) -> RunReport {
        let engine = match self.run_engine().await {
            Ok(()) => {
                info!(vault = %self.vault.display(), "engine sync succeeded");
                return RunReport::Synced;
            }
            Err(e) => e,
        };
        warn!(error = %engine, "engine sync failed, falling back to plain pull");

        match self.plain_pull().await {
            Ok(()) => {
                info!("plain pull succeeded");
                RunReport::PulledOnly { engine }
            }
            Err(pull) => {
                warn!(error = %pull, "plain pull failed");
                RunReport::Failed { engine, pull }
            }
        }
    }

    async fn run_engine(&self) -> Result<(), EngineFailure> {
        let mut cmd = Command::new(&self.engine_binary);
        cmd.arg("--vault").arg(&self.vault);
        if let Some(config) = &self.config_path {
            cmd.arg("--config").arg(config);
        }
        cmd.kill_on_drop(true);

        let binary = self.engine_binary.display().to_string();
        let output = match tokio::time::timeout(self.engine_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(EngineFailure::Unavailable(binary, e)),
            // Dropping the output future kills the child.
            Err(_) => return Err(EngineFailure::TimedOut(self.engine_timeout.as_secs())),
        };

        if output.status.success() {
            return Ok(());
        }
        match output.status.code() {
            Some(code) => Err(EngineFailure::Exited {
                code,
                detail: last_line(&output),
            }),
            None => Err(EngineFailure::Killed),
        }
    }

    async fn plain_pull(&self) -> Result<(), String> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.vault)
            .arg("pull")
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.fallback_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("could not run git: {e}")),
            Err(_) => {
                return Err(format!(
                    "git pull timed out after {}s",
                    self.fallback_timeout.as_secs()
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() || stdout.contains("Already up to date") {
            Ok(())
        } else {
            Err(last_line(&output))
        }
    }
}

/// Last non-empty line of stderr, else of stdout.
fn last_line(output: &Output) -> String {
    [&output.stderr, &output.stdout]
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes))
        .find_map(|text| {
            text.lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
        })
        .unwrap_or_else(|| "no output".to_string())
}
