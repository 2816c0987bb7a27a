//! Shared data types.

use serde::{Deserialize, Serialize};

/// Whether a run mutates the vault or only describes what it would do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    Normal,
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::DryRun => write!(f, "dry-run"),
        }
    }
}

/// Summary of a completed sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Branch that was synchronized.
    pub branch: String,
    /// A commit was created for local changes.
    pub committed: bool,
    /// Whether a stale rebase from an earlier run was aborted.
    pub stale_rebase_cleared: bool,
    /// Conflict resolution rounds needed during the rebase.
    pub conflict_rounds: u32,
    /// Conflicted paths resolved across all rounds.
    pub conflicts_resolved: usize,
    /// The rebased branch reached the remote.
    pub pushed: bool,
    pub started_at: Option<chrono::DateTime<chrono::Local>>,
    pub completed_at: Option<chrono::DateTime<chrono::Local>>,
}
