//! Sync engine: orchestrates one run over a vault.
//!
//! State machine for a single run:
//! `Idle → Preflight → Committing → Pulling → Pushing → Done`, with any
//! fatal error moving to `Failed`.

use std::cell::Cell;
use std::path::Path;

use chrono::Local;
use tracing::info;

use vault_sync_core::conflict::ConflictClassifier;
use vault_sync_core::errors::SyncError;
use vault_sync_core::git::{GitCli, VersionControl};
use vault_sync_core::message::{CommandMessageSource, MessageSource};
use vault_sync_core::models::SyncStats;
use vault_sync_core::retry::{Sleeper, ThreadSleeper};
use vault_sync_core::{RunMode, SyncLog, VaultConfig};

use crate::commit_stage::CommitStage;
use crate::preflight::{PreflightGuard, PreflightOutcome};
use crate::pull_stage::PullStage;
use crate::push_stage::PushStage;

/// Current phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Preflight,
    Committing,
    Pulling,
    Pushing,
    Done,
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Preflight => write!(f, "preflight"),
            Self::Committing => write!(f, "committing"),
            Self::Pulling => write!(f, "pulling"),
            Self::Pushing => write!(f, "pushing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Runs preflight, commit, pull and push against one vault.
pub struct SyncEngine<G: VersionControl> {
    config: VaultConfig,
    git: G,
    log: SyncLog,
    classifier: ConflictClassifier,
    messages: Option<Box<dyn MessageSource>>,
    sleeper: Box<dyn Sleeper>,
    state: Cell<SyncState>,
}

impl SyncEngine<GitCli> {
    /// Open the vault at `vault` with the git CLI, the configured message
    /// tool and real sleeps.
    pub fn open(vault: &Path, config: VaultConfig, mode: RunMode) -> Result<Self, SyncError> {
        let git = GitCli::open(vault)?;
        let log = SyncLog::new(config.log_path(git.vault(), git.git_dir()), mode);
        let messages = CommandMessageSource::from_config(&config.message)
            .map(|src| Box::new(src) as Box<dyn MessageSource>);

        let mut engine = Self::new(config, git, log);
        engine.messages = messages;
        Ok(engine)
    }
}

impl<G: VersionControl> SyncEngine<G> {
    /// Engine with no message source and real sleeps.
    pub fn new(config: VaultConfig, git: G, log: SyncLog) -> Self {
        let classifier = ConflictClassifier::from(&config.conflicts);
        Self {
            config,
            git,
            log,
            classifier,
            messages: None,
            sleeper: Box::new(ThreadSleeper),
            state: Cell::new(SyncState::Idle),
        }
    }

    pub fn with_message_source(mut self, source: Box<dyn MessageSource>) -> Self {
        self.messages = Some(source);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    /// Run one full sync.
    pub fn run(&self) -> Result<SyncStats, SyncError> {
        match self.run_phases() {
            Ok(stats) => {
                self.set_state(SyncState::Done);
                Ok(stats)
            }
            Err(e) => {
                self.set_state(SyncState::Failed);
                self.log
                    .error(&format!("Sync failed (exit {}): {e}", e.exit_code()))
                    .ok();
                Err(e)
            }
        }
    }

    fn run_phases(&self) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats {
            started_at: Some(Local::now()),
            ..Default::default()
        };
        let dry_run = self.log.mode().is_dry_run();

        self.set_state(SyncState::Preflight);
        let preflight = PreflightGuard::new(&self.git, &self.config, &self.log).run()?;
        let branch = match preflight {
            PreflightOutcome::Ready {
                branch,
                stale_cleared,
            } => {
                stats.stale_rebase_cleared = stale_cleared;
                branch
            }
            PreflightOutcome::StaleRebaseReported => {
                self.log
                    .info("Dry run stopped early: remaining steps depend on clearing the stale rebase")?;
                stats.completed_at = Some(Local::now());
                return Ok(stats);
            }
        };
        stats.branch = branch.clone();

        self.set_state(SyncState::Committing);
        let messages = self.messages.as_ref().map(|m| -> &dyn MessageSource { m.as_ref() });
        stats.committed = CommitStage::new(&self.git, &self.config, &self.log, messages).run()?;

        self.set_state(SyncState::Pulling);
        let pulled = PullStage::new(
            &self.git,
            &self.config,
            &self.log,
            &self.classifier,
            self.sleeper.as_ref(),
        )
        .run(&branch)?;
        stats.conflict_rounds = pulled.conflict_rounds;
        stats.conflicts_resolved = pulled.conflicts_resolved;

        self.set_state(SyncState::Pushing);
        stats.pushed =
            PushStage::new(&self.git, &self.config, &self.log, self.sleeper.as_ref()).run(&branch)?;

        stats.completed_at = Some(Local::now());
        if dry_run {
            self.log.info("Dry run complete, no changes were made")?;
        } else {
            self.log.info("Sync completed successfully")?;
        }
        Ok(stats)
    }

    fn set_state(&self, new_state: SyncState) {
        info!(from = %self.state.get(), to = %new_state, "state transition");
        self.state.set(new_state);
    }
}
