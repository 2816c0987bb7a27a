//! The narrow interface the sync engine needs from a version-control tool.

use crate::errors::GitError;

/// Operations the engine performs on a vault.
///
/// Every method is a blocking call. Failures carry the tool's captured
/// diagnostic text in the error.
///
/// Inside a rebase, "ours" is the upstream side being rebased onto and
/// "theirs" is the local commit being replayed.
pub trait VersionControl {
    /// Current branch name, or `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>, GitError>;

    /// Whether an interrupted rebase is recorded in the repository.
    fn rebase_in_progress(&self) -> Result<bool, GitError>;

    /// Set a repository-local configuration value.
    fn set_config(&self, key: &str, value: &str) -> Result<(), GitError>;

    /// Stage additions, modifications and deletions across the whole tree.
    fn stage_all(&self) -> Result<(), GitError>;

    /// Diff of the staging area against HEAD. Empty when nothing is staged.
    fn staged_diff(&self) -> Result<String, GitError>;

    /// Short status lines for every changed or untracked path.
    fn pending_changes(&self) -> Result<Vec<String>, GitError>;

    /// `--stat` summary of tracked changes against HEAD, staged or not.
    /// Touches neither the index nor the working tree.
    fn diff_summary(&self) -> Result<String, GitError>;

    /// Commit the staged changes.
    fn commit(&self, message: &str) -> Result<String, GitError>;

    /// Fetch `branch` from `remote` and rebase the current branch onto it.
    fn pull_rebase(&self, remote: &str, branch: &str) -> Result<String, GitError>;

    /// Continue a rebase after its conflicts were resolved.
    fn rebase_continue(&self) -> Result<String, GitError>;

    /// Abort the rebase in progress, restoring the pre-rebase branch.
    fn rebase_abort(&self) -> Result<(), GitError>;

    /// Paths currently unmerged in the index.
    fn list_conflicts(&self) -> Result<Vec<String>, GitError>;

    /// Take the "ours" side of a conflicted path into the working tree.
    fn checkout_ours(&self, path: &str) -> Result<(), GitError>;

    /// Take the "theirs" side of a conflicted path into the working tree.
    fn checkout_theirs(&self, path: &str) -> Result<(), GitError>;

    /// Write the union of both sides of a conflicted text file.
    fn merge_union(&self, path: &str) -> Result<(), GitError>;

    /// Stage a single path, marking it resolved.
    fn stage_path(&self, path: &str) -> Result<(), GitError>;

    /// Push `branch` to `remote`.
    fn push(&self, remote: &str, branch: &str) -> Result<String, GitError>;
}
