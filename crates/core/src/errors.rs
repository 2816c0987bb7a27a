//! Error types for the vault-sync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`. The
//! fatal outcomes of a sync run are collected in [`SyncError`], which also
//! knows the process exit code each of them maps to.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from driving the `git` command-line tool.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git {command} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GitError {
    /// Captured diagnostic text for log entries.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::CommandFailed { stderr, .. } => stderr.trim().to_string(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Commit message errors
// ---------------------------------------------------------------------------

/// Reasons a commit message could not be generated. None of these are fatal.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The message tool is not installed or disabled.
    #[error("message tool unavailable: {0}")]
    Unavailable(String),

    /// The tool did not finish before its deadline and was killed.
    #[error("message tool timed out after {0}s")]
    TimedOut(u64),

    /// The tool exited unsuccessfully.
    #[error("message tool failed (exit {exit_code}): {stderr}")]
    Failed { exit_code: i32, stderr: String },

    /// The tool answered with something too short to be a message.
    #[error("message too short ({len} chars, need {min})")]
    TooShort { len: usize, min: usize },

    /// Generic I/O wrapper.
    #[error("message tool I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync log errors
// ---------------------------------------------------------------------------

/// Errors writing or rotating the sync log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("sync log I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Fatal outcomes of a sync run. Any of these ends the run with a non-zero
/// exit code.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The vault has no current branch.
    #[error("working tree is in detached HEAD state")]
    DetachedHead,

    /// A rebase left behind by an earlier run could not be aborted.
    #[error("stale rebase state could not be cleared, manual intervention required: {detail}")]
    StaleRebase { detail: String },

    /// At least one conflicted path could not be resolved.
    #[error("unresolved conflicts: {}", paths.join(", "))]
    UnresolvedConflicts { paths: Vec<String> },

    /// Conflicts kept recurring past the round bound.
    #[error("conflicts still present after {rounds} resolution rounds")]
    ConflictRoundsExceeded { rounds: u32 },

    /// A network operation failed on every attempt.
    #[error("{operation} failed after {attempts} attempts: {detail}")]
    NetworkExhausted {
        operation: String,
        attempts: u32,
        detail: String,
    },

    /// Creating the commit failed (e.g. no identity configured).
    #[error("commit failed: {0}")]
    CommitFailed(#[source] GitError),

    /// Any other git failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The sync log could not be written.
    #[error(transparent)]
    Log(#[from] LogError),
}

impl SyncError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::DetachedHead => 3,
            Self::StaleRebase { .. } => 4,
            Self::UnresolvedConflicts { .. } => 5,
            Self::ConflictRoundsExceeded { .. } => 6,
            Self::NetworkExhausted { .. } => 7,
            Self::CommitFailed(_) => 8,
            Self::Git(_) | Self::Log(_) => 1,
        }
    }
}
