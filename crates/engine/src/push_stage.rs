//! Publish the rebased branch.
//!
//! A push that keeps failing is fatal but never rolls anything back: the
//! local commits stay put and the next run pushes them.

use vault_sync_core::errors::SyncError;
use vault_sync_core::git::VersionControl;
use vault_sync_core::retry::{RetryPolicy, Sleeper};
use vault_sync_core::{SyncLog, VaultConfig};

pub struct PushStage<'a, G: VersionControl> {
    git: &'a G,
    config: &'a VaultConfig,
    log: &'a SyncLog,
    sleeper: &'a dyn Sleeper,
}

impl<'a, G: VersionControl> PushStage<'a, G> {
    pub fn new(git: &'a G, config: &'a VaultConfig, log: &'a SyncLog, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            git,
            config,
            log,
            sleeper,
        }
    }

    /// Returns whether anything was pushed (always `false` in a dry run).
    pub fn run(&self, branch: &str) -> Result<bool, SyncError> {
        let remote = &self.config.sync.remote;
        if self.log.mode().is_dry_run() {
            self.log.info(&format!("Would push {branch} to {remote}"))?;
            return Ok(false);
        }

        let policy = RetryPolicy::from(&self.config.retry);
        let max = policy.max_attempts();
        let result = policy.run("push", self.sleeper, |attempt| {
            self.git.push(remote, branch).map_err(|e| {
                self.log
                    .warn(&format!("Push attempt {attempt}/{max} failed: {}", e.diagnostic()))
                    .ok();
                e
            })
        });

        match result {
            Ok(_) => {
                self.log.info(&format!("Pushed {branch} to {remote}"))?;
                Ok(true)
            }
            Err(failure) => {
                self.log.error(&format!(
                    "FATAL: push failed after {} attempts, local commits kept for the next run: {}",
                    failure.attempts,
                    failure.error.diagnostic()
                ))?;
                Err(SyncError::NetworkExhausted {
                    operation: "push".into(),
                    attempts: failure.attempts,
                    detail: failure.error.diagnostic(),
                })
            }
        }
    }
}
