//! Stage everything in the vault and commit it.

use chrono::Local;

use vault_sync_core::errors::SyncError;
use vault_sync_core::git::VersionControl;
use vault_sync_core::message::{resolve_commit_message, MessageOrigin, MessageSource};
use vault_sync_core::{SyncLog, VaultConfig};

pub struct CommitStage<'a, G: VersionControl> {
    git: &'a G,
    config: &'a VaultConfig,
    log: &'a SyncLog,
    messages: Option<&'a dyn MessageSource>,
}

impl<'a, G: VersionControl> CommitStage<'a, G> {
    pub fn new(
        git: &'a G,
        config: &'a VaultConfig,
        log: &'a SyncLog,
        messages: Option<&'a dyn MessageSource>,
    ) -> Self {
        Self {
            git,
            config,
            log,
            messages,
        }
    }

    /// Returns whether a commit was created.
    pub fn run(&self) -> Result<bool, SyncError> {
        if self.log.mode().is_dry_run() {
            return self.describe();
        }

        self.git.stage_all()?;
        let diff = self.git.staged_diff()?;
        if diff.trim().is_empty() {
            self.log.info("No local changes to commit")?;
            return Ok(false);
        }

        let message = resolve_commit_message(
            self.messages,
            &diff,
            self.config.message.min_length,
            Local::now(),
        );
        if let MessageOrigin::Fallback(reason) = &message.origin {
            self.log
                .warn(&format!("Commit message generation failed ({reason}), using fallback"))?;
        }

        if let Err(e) = self.git.commit(&message.text) {
            self.log
                .error(&format!("FATAL: commit failed: {}", e.diagnostic()))?;
            return Err(SyncError::CommitFailed(e));
        }
        self.log.info(&format!("Committed: {}", message.text))?;
        Ok(true)
    }

    fn describe(&self) -> Result<bool, SyncError> {
        let changes = self.git.pending_changes()?;
        if changes.is_empty() {
            self.log.info("No local changes to commit")?;
            return Ok(false);
        }
        self.log.info(&format!(
            "Would stage and commit {} changed path(s):",
            changes.len()
        ))?;
        for line in &changes {
            self.log.info(&format!("  {line}"))?;
        }
        let summary = self.git.diff_summary()?;
        for line in summary.lines().filter(|l| !l.trim().is_empty()) {
            self.log.info(&format!("  {}", line.trim()))?;
        }
        Ok(false)
    }
}
