//! Rebase-pull from the remote, resolving conflicts as they come up.
//!
//! ```text
//! ATTEMPT_PULL ─┬─ ok ───────────────► done
//!               ├─ no rebase state ──► retry, then fatal
//!               └─ rebase stopped ───► RESOLVE ─┬─ continue ok ──► (rebase over? done : RESOLVE)
//!                                               ├─ continue failed ► RESOLVE (next round)
//!                                               └─ unresolved ────► abort, fatal
//! ```
//!
//! Resolution rounds are bounded; every fatal exit aborts the rebase so the
//! vault is never left mid-rebase.

use tracing::debug;

use vault_sync_core::conflict::{ConflictClassifier, ConflictResolver};
use vault_sync_core::errors::{GitError, SyncError};
use vault_sync_core::git::VersionControl;
use vault_sync_core::retry::{RetryPolicy, Sleeper};
use vault_sync_core::{SyncLog, VaultConfig};

/// What the pull stage went through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOutcome {
    pub conflict_rounds: u32,
    pub conflicts_resolved: usize,
}

/// Why a single pull attempt failed.
#[derive(Debug)]
enum PullFailure {
    /// The rebase stopped on conflicts.
    Conflict(GitError),
    /// Nothing was changed locally; most likely the network or remote.
    Transient(GitError),
    /// The repository state could not even be inspected.
    Inspect(GitError),
}

impl std::fmt::Display for PullFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(e) => write!(f, "rebase stopped on conflicts: {e}"),
            Self::Transient(e) => write!(f, "{e}"),
            Self::Inspect(e) => write!(f, "could not inspect rebase state: {e}"),
        }
    }
}

pub struct PullStage<'a, G: VersionControl> {
    git: &'a G,
    config: &'a VaultConfig,
    log: &'a SyncLog,
    classifier: &'a ConflictClassifier,
    sleeper: &'a dyn Sleeper,
}

impl<'a, G: VersionControl> PullStage<'a, G> {
    pub fn new(
        git: &'a G,
        config: &'a VaultConfig,
        log: &'a SyncLog,
        classifier: &'a ConflictClassifier,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            git,
            config,
            log,
            classifier,
            sleeper,
        }
    }

    pub fn run(&self, branch: &str) -> Result<PullOutcome, SyncError> {
        let remote = &self.config.sync.remote;
        if self.log.mode().is_dry_run() {
            self.log
                .info(&format!("Would pull --rebase from {remote}/{branch}"))?;
            return Ok(PullOutcome::default());
        }

        let policy = RetryPolicy::from(&self.config.retry);
        let max = policy.max_attempts();
        let attempt_pull = |attempt: u32| -> Result<String, PullFailure> {
            let err = match self.git.pull_rebase(remote, branch) {
                Ok(out) => return Ok(out),
                Err(e) => e,
            };
            match self.git.rebase_in_progress() {
                Ok(true) => Err(PullFailure::Conflict(err)),
                Ok(false) => {
                    self.log
                        .warn(&format!(
                            "Pull attempt {attempt}/{max} failed: {}",
                            err.diagnostic()
                        ))
                        .ok();
                    Err(PullFailure::Transient(err))
                }
                Err(inspect) => Err(PullFailure::Inspect(inspect)),
            }
        };

        let failure = match policy.run_while("pull", self.sleeper, attempt_pull, |f| {
            matches!(f, PullFailure::Transient(_))
        }) {
            Ok(_) => {
                self.log
                    .info(&format!("Pulled and rebased onto {remote}/{branch}"))?;
                return Ok(PullOutcome::default());
            }
            Err(failure) => failure,
        };

        match failure.error {
            PullFailure::Transient(e) => {
                self.log.error(&format!(
                    "FATAL: pull failed after {} attempts: {}",
                    failure.attempts,
                    e.diagnostic()
                ))?;
                Err(SyncError::NetworkExhausted {
                    operation: "pull".into(),
                    attempts: failure.attempts,
                    detail: e.diagnostic(),
                })
            }
            PullFailure::Inspect(e) => {
                self.log.error(&format!(
                    "FATAL: could not inspect rebase state after failed pull: {}",
                    e.diagnostic()
                ))?;
                self.abort_rebase();
                Err(SyncError::Git(e))
            }
            PullFailure::Conflict(_) => {
                self.log.warn("Rebase stopped on conflicts, resolving")?;
                self.resolve_rebase()
            }
        }
    }

    /// Drive the stopped rebase to completion, or abort it on any failure.
    fn resolve_rebase(&self) -> Result<PullOutcome, SyncError> {
        let result = self.resolve_rounds();
        if result.is_err() {
            self.abort_rebase();
        }
        result
    }

    fn resolve_rounds(&self) -> Result<PullOutcome, SyncError> {
        let max_rounds = self.config.sync.max_conflict_rounds;
        let resolver = ConflictResolver::new(self.classifier);
        let mut outcome = PullOutcome::default();

        while self.git.rebase_in_progress()? {
            if outcome.conflict_rounds >= max_rounds {
                self.log.error(&format!(
                    "FATAL: conflicts persist after {max_rounds} resolution rounds, aborting rebase"
                ))?;
                return Err(SyncError::ConflictRoundsExceeded { rounds: max_rounds });
            }
            outcome.conflict_rounds += 1;
            let round = outcome.conflict_rounds;

            let conflicts = self.git.list_conflicts()?;
            self.log.info(&format!(
                "Conflict round {round}/{max_rounds}: {} conflicted path(s)",
                conflicts.len()
            ))?;

            let report = resolver.resolve(self.git, &conflicts);
            for (path, rule) in &report.resolved {
                self.log.info(&format!("  Resolved {path} ({rule})"))?;
            }
            if !report.is_complete() {
                for (path, why) in &report.unresolved {
                    self.log.error(&format!("  Could not resolve {path}: {why}"))?;
                }
                self.log
                    .error("FATAL: unresolvable conflicts, aborting rebase")?;
                return Err(SyncError::UnresolvedConflicts {
                    paths: report.unresolved_paths(),
                });
            }
            outcome.conflicts_resolved += report.resolved_count();

            match self.git.rebase_continue() {
                Ok(_) => debug!(round, "rebase continued"),
                Err(e) => {
                    if self.git.list_conflicts()?.is_empty() {
                        self.log.warn(&format!(
                            "rebase --continue failed without conflicts, retrying: {}",
                            e.diagnostic()
                        ))?;
                    } else {
                        self.log
                            .info("Rebase stopped on the next commit with new conflicts")?;
                    }
                }
            }
        }

        self.log.info(&format!(
            "Rebase completed after {} conflict round(s), {} path(s) resolved",
            outcome.conflict_rounds, outcome.conflicts_resolved
        ))?;
        Ok(outcome)
    }

    fn abort_rebase(&self) {
        if matches!(self.git.rebase_in_progress(), Ok(false)) {
            return;
        }
        match self.git.rebase_abort() {
            Ok(()) => {
                self.log.warn("Rebase aborted, vault restored to its pre-pull state").ok();
            }
            Err(e) => {
                self.log
                    .error(&format!(
                        "Could not abort rebase, manual intervention required: {}",
                        e.diagnostic()
                    ))
                    .ok();
            }
        }
    }
}
