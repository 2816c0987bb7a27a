//! Configuration for vault-sync.
//!
//! A single immutable [`VaultConfig`] value is built once per process and
//! threaded into every component. Every section is optional in the TOML
//! file; missing values fall back to the defaults documented on each field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Engine behaviour: remote, log file, conflict round bound.
    #[serde(default)]
    pub sync: SyncSection,

    /// Network retry/backoff policy for pull and push.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Commit message generation.
    #[serde(default)]
    pub message: MessageConfig,

    /// Conflict classification rules.
    #[serde(default)]
    pub conflicts: ConflictRulesConfig,

    /// Settings for the timer-driven caller.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

// ---------------------------------------------------------------------------
// Sync section
// ---------------------------------------------------------------------------

/// Core engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Remote to pull from and push to (default `origin`).
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Sync log location. Relative paths resolve against the vault root;
    /// when unset the log lives in the git directory.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Rotate the log once it holds more than this many lines.
    #[serde(default = "default_log_max_lines")]
    pub log_max_lines: usize,

    /// Lines retained by a rotation.
    #[serde(default = "default_log_keep_lines")]
    pub log_keep_lines: usize,

    /// Resolution rounds allowed before a rebase is declared unresolvable.
    #[serde(default = "default_max_conflict_rounds")]
    pub max_conflict_rounds: u32,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_remote() -> String {
    "origin".into()
}

fn default_log_max_lines() -> usize {
    1000
}

fn default_log_keep_lines() -> usize {
    500
}

fn default_max_conflict_rounds() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            log_file: None,
            log_max_lines: default_log_max_lines(),
            log_keep_lines: default_log_keep_lines(),
            max_conflict_rounds: default_max_conflict_rounds(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Exponential backoff settings shared by pull and push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after each failure.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_secs() -> u64 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commit messages
// ---------------------------------------------------------------------------

/// External commit message generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Set to `false` to always use the timestamped fallback.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program and arguments. The staged diff is written to its stdin and
    /// the first non-empty line of stdout becomes the message.
    #[serde(default = "default_message_command")]
    pub command: Vec<String>,

    /// Hard deadline; the tool is killed when it expires.
    #[serde(default = "default_message_timeout_secs")]
    pub timeout_secs: u64,

    /// Shorter answers are discarded in favour of the fallback.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// The diff handed to the tool is truncated to this many bytes.
    #[serde(default = "default_max_diff_bytes")]
    pub max_diff_bytes: usize,
}

fn default_true() -> bool {
    true
}

fn default_message_command() -> Vec<String> {
    vec![
        "claude".into(),
        "-p".into(),
        "Write a single-line git commit message (under 72 characters) summarising \
         the diff on stdin. Reply with the message only."
            .into(),
    ]
}

fn default_message_timeout_secs() -> u64 {
    30
}

fn default_min_length() -> usize {
    5
}

fn default_max_diff_bytes() -> usize {
    16_000
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_message_command(),
            timeout_secs: default_message_timeout_secs(),
            min_length: default_min_length(),
            max_diff_bytes: default_max_diff_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict rules
// ---------------------------------------------------------------------------

/// Glob patterns driving conflict classification.
///
/// Precedence is fixed: union patterns are tried first, then local
/// patterns; anything unmatched takes the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRulesConfig {
    /// Text files whose conflicting sides are both kept.
    #[serde(default = "default_union_patterns")]
    pub union_patterns: Vec<String>,

    /// Paths where the local version always wins.
    #[serde(default = "default_local_patterns")]
    pub local_patterns: Vec<String>,
}

fn default_union_patterns() -> Vec<String> {
    vec!["*.md".into()]
}

fn default_local_patterns() -> Vec<String> {
    vec![".obsidian/**".into()]
}

impl Default for ConflictRulesConfig {
    fn default() -> Self {
        Self {
            union_patterns: default_union_patterns(),
            local_patterns: default_local_patterns(),
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Settings for `vault-sync-daemon`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Minutes between timer-driven syncs. Unset means "auto": the host
    /// invokes a sync around each unit of work instead.
    #[serde(default)]
    pub interval_minutes: Option<u64>,

    /// Outer wall-clock limit for one engine invocation.
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,

    /// Limit for the plain `git pull` fallback.
    #[serde(default = "default_fallback_timeout_secs")]
    pub fallback_timeout_secs: u64,

    /// Engine executable, looked up on `$PATH` when not absolute.
    #[serde(default = "default_engine_binary")]
    pub engine_binary: PathBuf,
}

fn default_engine_timeout_secs() -> u64 {
    120
}

fn default_fallback_timeout_secs() -> u64 {
    30
}

fn default_engine_binary() -> PathBuf {
    PathBuf::from("vault-sync")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_minutes: None,
            engine_timeout_secs: default_engine_timeout_secs(),
            fallback_timeout_secs: default_fallback_timeout_secs(),
            engine_binary: default_engine_binary(),
        }
    }
}

/// When the vault gets synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSchedule {
    /// The host syncs before and after each unit of work.
    Auto,
    /// A background timer syncs every interval.
    Every(Duration),
}

impl std::fmt::Display for SyncSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto (before/after each unit of work)"),
            Self::Every(d) => write!(f, "every {} minutes", d.as_secs() / 60),
        }
    }
}

impl DaemonConfig {
    pub fn schedule(&self) -> SyncSchedule {
        match self.interval_minutes {
            Some(mins) => SyncSchedule::Every(Duration::from_secs(mins.saturating_mul(60))),
            None => SyncSchedule::Auto,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl VaultConfig {
    /// Load a [`VaultConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: VaultConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults; then validate.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => {
                debug!("no configuration file given, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.remote.trim().is_empty() {
            return Err(invalid("sync.remote", "remote name must not be empty"));
        }
        if self.sync.max_conflict_rounds == 0 {
            return Err(invalid("sync.max_conflict_rounds", "must be > 0"));
        }
        if self.sync.log_keep_lines >= self.sync.log_max_lines {
            return Err(invalid(
                "sync.log_keep_lines",
                "must be smaller than sync.log_max_lines",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be > 0"));
        }
        if self.message.enabled && self.message.command.is_empty() {
            return Err(invalid(
                "message.command",
                "command must not be empty while message generation is enabled",
            ));
        }
        if self.message.timeout_secs == 0 {
            return Err(invalid("message.timeout_secs", "must be > 0"));
        }
        if self.daemon.interval_minutes == Some(0) {
            return Err(invalid("daemon.interval_minutes", "must be > 0 when set"));
        }
        if self.daemon.engine_timeout_secs == 0 {
            return Err(invalid("daemon.engine_timeout_secs", "must be > 0"));
        }
        Ok(())
    }

    /// Where the sync log lives for a vault whose git directory is `git_dir`.
    pub fn log_path(&self, vault: &Path, git_dir: &Path) -> PathBuf {
        match &self.sync.log_file {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => vault.join(p),
            None => git_dir.join("vault-sync.log"),
        }
    }

    /// Generate a commented TOML template with every default spelled out.
    pub fn default_template() -> &'static str {
        r#"# vault-sync configuration

[sync]
remote = "origin"
# log_file = ".git/vault-sync.log"
log_max_lines = 1000
log_keep_lines = 500
max_conflict_rounds = 3
log_level = "info"

[retry]
max_attempts = 3
initial_delay_secs = 2

[message]
enabled = true
# command = ["claude", "-p", "Write a one-line commit message for this diff."]
timeout_secs = 30
min_length = 5
max_diff_bytes = 16000

[conflicts]
union_patterns = ["*.md"]
local_patterns = [".obsidian/**"]

[daemon]
# interval_minutes = 15   # unset = auto
engine_timeout_secs = 120
fallback_timeout_secs = 30
engine_binary = "vault-sync"
"#
    }
}

fn invalid(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        detail: detail.into(),
    }
}
