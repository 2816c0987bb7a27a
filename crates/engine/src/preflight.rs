//! Preflight guard: everything that must hold before the vault is touched.
//!
//! In order: rotate the sync log, clear a stale rebase left by a crashed
//! run, apply the repository settings the engine relies on, and refuse to
//! continue on a detached HEAD.

use tracing::{debug, info};

use vault_sync_core::errors::SyncError;
use vault_sync_core::git::VersionControl;
use vault_sync_core::{SyncLog, VaultConfig};

/// Repository settings applied on every run. Re-applying is harmless.
pub const REPO_SETTINGS: &[(&str, &str)] = &[
    ("rerere.enabled", "true"),
    ("rerere.autoupdate", "true"),
    ("merge.conflictstyle", "diff3"),
    ("pull.rebase", "true"),
    ("rebase.autoStash", "true"),
    ("merge.ours.driver", "true"),
];

/// Result of a successful preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightOutcome {
    /// Safe to proceed on `branch`.
    Ready { branch: String, stale_cleared: bool },
    /// Dry run found a stale rebase. A real run would abort it first, so
    /// nothing after this point can be simulated faithfully.
    StaleRebaseReported,
}

pub struct PreflightGuard<'a, G: VersionControl> {
    git: &'a G,
    config: &'a VaultConfig,
    log: &'a SyncLog,
}

impl<'a, G: VersionControl> PreflightGuard<'a, G> {
    pub fn new(git: &'a G, config: &'a VaultConfig, log: &'a SyncLog) -> Self {
        Self { git, config, log }
    }

    pub fn run(&self) -> Result<PreflightOutcome, SyncError> {
        self.log.rotate(self.config.sync.log_max_lines, self.config.sync.log_keep_lines)?;
        self.log.info("Starting vault sync")?;

        let stale_cleared = match self.clear_stale_rebase()? {
            Some(cleared) => cleared,
            None => return Ok(PreflightOutcome::StaleRebaseReported),
        };

        self.apply_repo_settings()?;

        let branch = match self.git.current_branch()? {
            Some(branch) => branch,
            None => {
                self.log.error("Not on a branch (detached HEAD), refusing to sync")?;
                return Err(SyncError::DetachedHead);
            }
        };
        debug!(branch = %branch, "branch check passed");

        Ok(PreflightOutcome::Ready {
            branch,
            stale_cleared,
        })
    }

    /// `Some(cleared)` when it is fine to continue; `None` when a dry run
    /// has to stop at the report.
    fn clear_stale_rebase(&self) -> Result<Option<bool>, SyncError> {
        if !self.git.rebase_in_progress()? {
            return Ok(Some(false));
        }

        if self.log.mode().is_dry_run() {
            self.log
                .warn("Stale rebase in progress from a previous run; a real run would abort it")?;
            return Ok(None);
        }

        self.log
            .warn("Stale rebase in progress from a previous run, aborting it")?;
        let abort_detail = match self.git.rebase_abort() {
            Ok(()) => String::new(),
            Err(e) => e.diagnostic(),
        };

        if self.git.rebase_in_progress()? {
            self.log.error(&format!(
                "FATAL: could not clear stale rebase state, manual intervention required{}",
                if abort_detail.is_empty() {
                    String::new()
                } else {
                    format!(": {abort_detail}")
                }
            ))?;
            return Err(SyncError::StaleRebase {
                detail: abort_detail,
            });
        }

        self.log.info("Stale rebase aborted")?;
        Ok(Some(true))
    }

    fn apply_repo_settings(&self) -> Result<(), SyncError> {
        for (key, value) in REPO_SETTINGS {
            if let Err(e) = self.git.set_config(key, value) {
                self.log
                    .warn(&format!("Could not set {key}={value}: {}", e.diagnostic()))?;
            }
        }
        info!(count = REPO_SETTINGS.len(), "repository settings applied");
        Ok(())
    }
}
