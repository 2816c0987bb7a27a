//! The engine's durable, bounded, append-only log file.
//!
//! One line per event: `[YYYY-MM-DD HH:MM:SS] message`. Lines written in
//! dry-run mode carry a `[DRY-RUN]` tag after the timestamp. Every entry is
//! mirrored to `tracing`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::errors::LogError;
use crate::models::RunMode;

/// Severity of a log entry; decides the `tracing` level and line prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Appends timestamped entries to the sync log.
#[derive(Debug, Clone)]
pub struct SyncLog {
    path: PathBuf,
    mode: RunMode,
}

impl SyncLog {
    pub fn new(path: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn info(&self, message: &str) -> Result<(), LogError> {
        self.write(Level::Info, message)
    }

    pub fn warn(&self, message: &str) -> Result<(), LogError> {
        self.write(Level::Warn, message)
    }

    pub fn error(&self, message: &str) -> Result<(), LogError> {
        self.write(Level::Error, message)
    }

    /// Append one entry.
    pub fn write(&self, level: Level, message: &str) -> Result<(), LogError> {
        match level {
            Level::Info => info!(dry_run = self.mode.is_dry_run(), "{message}"),
            Level::Warn => warn!(dry_run = self.mode.is_dry_run(), "{message}"),
            Level::Error => error!(dry_run = self.mode.is_dry_run(), "{message}"),
        }

        let line = format_line(&timestamp(), self.mode, level, message);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(file, "{line}").map_err(|e| self.io_err(e))
    }

    /// Truncate the log to its newest `keep` lines once it exceeds `max`,
    /// then record the rotation. Returns whether a rotation happened.
    pub fn rotate(&self, max: usize, keep: usize) -> Result<bool, LogError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.io_err(e)),
        };

        let lines: Vec<&str> = contents.lines().collect();
        if lines.len() <= max {
            return Ok(false);
        }

        let keep = keep.min(lines.len());
        let dropped = lines.len() - keep;
        let mut kept = lines[dropped..].join("\n");
        kept.push('\n');

        // Write the tail beside the log and rename over it so a crash never
        // leaves a half-written log.
        let tmp = self.path.with_extension("rotating");
        fs::write(&tmp, kept).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        self.info(&format!(
            "Log rotated: dropped {dropped} old lines, kept last {keep}"
        ))?;
        Ok(true)
    }

    fn io_err(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_line(ts: &str, mode: RunMode, level: Level, message: &str) -> String {
    let tag = if mode.is_dry_run() { "[DRY-RUN] " } else { "" };
    let prefix = match level {
        Level::Info => "",
        Level::Warn => "WARNING: ",
        Level::Error => "ERROR: ",
    };
    format!("[{ts}] {tag}{prefix}{message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn is_timestamped(line: &str) -> bool {
        // [YYYY-MM-DD HH:MM:SS]
        let bytes = line.as_bytes();
        line.len() > 22
            && bytes[0] == b'['
            && bytes[5] == b'-'
            && bytes[8] == b'-'
            && bytes[11] == b' '
            && bytes[14] == b':'
            && bytes[17] == b':'
            && bytes[20] == b']'
    }

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line("2025-01-02 03:04:05", RunMode::Normal, Level::Info, "Pushed"),
            "[2025-01-02 03:04:05] Pushed"
        );
        assert_eq!(
            format_line("2025-01-02 03:04:05", RunMode::DryRun, Level::Warn, "x"),
            "[2025-01-02 03:04:05] [DRY-RUN] WARNING: x"
        );
        assert_eq!(
            format_line("2025-01-02 03:04:05", RunMode::Normal, Level::Error, "y"),
            "[2025-01-02 03:04:05] ERROR: y"
        );
    }

    #[test]
    fn test_append_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.log");
        let log = SyncLog::new(&path, RunMode::Normal);
        log.info("first").unwrap();
        log.error("second").unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| is_timestamped(l)));
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] ERROR: second"));
    }

    #[test]
    fn test_dry_run_entries_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");
        SyncLog::new(&path, RunMode::DryRun).info("Would push").unwrap();
        let lines = read_lines(&path);
        assert!(lines[0].contains("] [DRY-RUN] Would push"));
    }

    #[test]
    fn test_rotation_keeps_newest_lines_plus_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");
        let body: String = (1..=1001).map(|i| format!("line {i}\n")).collect();
        fs::write(&path, body).unwrap();

        let log = SyncLog::new(&path, RunMode::Normal);
        assert!(log.rotate(1000, 500).unwrap());

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 501);
        assert_eq!(lines[0], "line 502");
        assert_eq!(lines[499], "line 1001");
        assert!(lines[500].contains("Log rotated"));
    }

    #[test]
    fn test_no_rotation_at_or_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");
        let body: String = (1..=1000).map(|i| format!("line {i}\n")).collect();
        fs::write(&path, body).unwrap();

        let log = SyncLog::new(&path, RunMode::Normal);
        assert!(!log.rotate(1000, 500).unwrap());
        assert_eq!(read_lines(&path).len(), 1000);
    }

    #[test]
    fn test_rotation_with_keep_above_line_count_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");
        fs::write(&path, "a\nb\nc\nd\ne\n").unwrap();

        let log = SyncLog::new(&path, RunMode::Normal);
        assert!(log.rotate(3, 10).unwrap());

        let lines = read_lines(&path);
        assert_eq!(&lines[..5], ["a", "b", "c", "d", "e"]);
        assert!(lines[5].contains("dropped 0 old lines, kept last 5"));
    }

    #[test]
    fn test_rotation_of_missing_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = SyncLog::new(dir.path().join("absent.log"), RunMode::Normal);
        assert!(!log.rotate(1000, 500).unwrap());
        assert!(!log.path().exists());
    }
}
