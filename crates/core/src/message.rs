//! Commit message generation with a guaranteed fallback.
//!
//! A [`MessageSource`] turns a staged diff into a one-line message. Its
//! failure is never fatal: [`resolve_commit_message`] substitutes a
//! timestamped `backup:` message whenever the source is missing, fails,
//! times out or answers with too little text.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::config::MessageConfig;
use crate::errors::MessageError;

/// Something that can propose a commit message for a diff.
pub trait MessageSource {
    fn generate(&self, diff: &str) -> Result<String, MessageError>;
}

/// How the final message was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOrigin {
    Generated,
    /// The fallback was used; carries the reason.
    Fallback(String),
}

/// The message to commit with, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub text: String,
    pub origin: MessageOrigin,
}

/// `backup: YYYY-MM-DD HH:MM:SS`
pub fn fallback_message(now: DateTime<Local>) -> String {
    format!("backup: {}", now.format("%Y-%m-%d %H:%M:%S"))
}

/// Ask `source` for a message; fall back on any problem.
pub fn resolve_commit_message(
    source: Option<&dyn MessageSource>,
    diff: &str,
    min_length: usize,
    now: DateTime<Local>,
) -> CommitMessage {
    let outcome = match source {
        None => Err(MessageError::Unavailable("no message source configured".into())),
        Some(src) => src.generate(diff).and_then(|text| {
            let text = text.trim().to_string();
            let len = text.chars().count();
            if len < min_length {
                Err(MessageError::TooShort { len, min: min_length })
            } else {
                Ok(text)
            }
        }),
    };

    match outcome {
        Ok(text) => {
            debug!(message = %text, "using generated commit message");
            CommitMessage {
                text,
                origin: MessageOrigin::Generated,
            }
        }
        Err(e) => {
            warn!(reason = %e, "falling back to timestamped commit message");
            CommitMessage {
                text: fallback_message(now),
                origin: MessageOrigin::Fallback(e.to_string()),
            }
        }
    }
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 character.
pub fn truncate_diff(diff: &str, max_bytes: usize) -> &str {
    if diff.len() <= max_bytes {
        return diff;
    }
    let mut end = max_bytes;
    while !diff.is_char_boundary(end) {
        end -= 1;
    }
    &diff[..end]
}

// ---------------------------------------------------------------------------
// External command source
// ---------------------------------------------------------------------------

/// Runs an external program with the diff on stdin and a hard deadline.
#[derive(Debug, Clone)]
pub struct CommandMessageSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    max_diff_bytes: usize,
}

impl CommandMessageSource {
    pub fn new(command: &[String], timeout: Duration, max_diff_bytes: usize) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            max_diff_bytes,
        })
    }

    /// Build from config; `None` when generation is disabled.
    pub fn from_config(cfg: &MessageConfig) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        Self::new(
            &cfg.command,
            Duration::from_secs(cfg.timeout_secs),
            cfg.max_diff_bytes,
        )
    }
}

impl MessageSource for CommandMessageSource {
    fn generate(&self, diff: &str) -> Result<String, MessageError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MessageError::Unavailable(format!("{} not found", self.program))
                } else {
                    MessageError::IoError(e)
                }
            })?;

        // Pipes are drained on helper threads so a chatty or stubborn child
        // cannot block us past the deadline.
        let input = truncate_diff(diff, self.max_diff_bytes).to_owned();
        let stdin = child.stdin.take();
        // Not joined: a helper the tool leaves behind may never read stdin.
        thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading closes the pipe early.
                let _ = stdin.write_all(input.as_bytes());
            }
        });
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!(program = %self.program, timeout_secs = self.timeout.as_secs(), "killing message tool");
                let _ = child.kill();
                let _ = child.wait();
                return Err(MessageError::TimedOut(self.timeout.as_secs()));
            }
            thread::sleep(Duration::from_millis(50));
        };

        // Background processes spawned by the tool inherit the pipes, so
        // reading to EOF is bounded by the same deadline as the child.
        let timed_out = || {
            warn!(program = %self.program, "message tool left its output pipes open");
            MessageError::TimedOut(self.timeout.as_secs())
        };
        let stdout = collect_output(stdout_reader, deadline).ok_or_else(timed_out)?;
        let stderr = collect_output(stderr_reader, deadline).ok_or_else(timed_out)?;

        if !status.success() {
            return Err(MessageError::Failed {
                exit_code: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string())
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
    });
    rx
}

/// Wait for a reader until `deadline`; `None` if the pipe is still open then.
fn collect_output(reader: Option<mpsc::Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = reader else {
        return Some(String::new());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(text) => Some(text),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    struct Fixed(Result<&'static str, ()>);

    impl MessageSource for Fixed {
        fn generate(&self, _diff: &str) -> Result<String, MessageError> {
            match self.0 {
                Ok(s) => Ok(s.to_string()),
                Err(()) => Err(MessageError::TimedOut(30)),
            }
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 12, 5, 9).unwrap()
    }

    #[test]
    fn test_fallback_format_is_sortable() {
        assert_eq!(fallback_message(noon()), "backup: 2025-03-14 12:05:09");
    }

    #[test]
    fn test_generated_message_is_used() {
        let src = Fixed(Ok("  Add meeting notes for Friday \n"));
        let msg = resolve_commit_message(Some(&src), "diff", 5, noon());
        assert_eq!(msg.text, "Add meeting notes for Friday");
        assert_eq!(msg.origin, MessageOrigin::Generated);
    }

    #[test]
    fn test_short_message_falls_back() {
        let src = Fixed(Ok("ok"));
        let msg = resolve_commit_message(Some(&src), "diff", 5, noon());
        assert_eq!(msg.text, "backup: 2025-03-14 12:05:09");
        assert!(matches!(msg.origin, MessageOrigin::Fallback(ref r) if r.contains("too short")));
    }

    #[test]
    fn test_failure_and_absence_fall_back() {
        let msg = resolve_commit_message(Some(&Fixed(Err(()))), "diff", 5, noon());
        assert!(msg.text.starts_with("backup: "));

        let msg = resolve_commit_message(None, "diff", 5, noon());
        assert!(matches!(msg.origin, MessageOrigin::Fallback(_)));
    }

    #[test]
    fn test_truncate_diff_respects_char_boundaries() {
        assert_eq!(truncate_diff("abcdef", 10), "abcdef");
        assert_eq!(truncate_diff("abcdef", 3), "abc");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate_diff("aé", 2), "a");
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let src = CommandMessageSource::new(
            &["definitely-not-a-real-binary-4242".to_string()],
            Duration::from_secs(5),
            1000,
        )
        .unwrap();
        assert!(matches!(src.generate("diff"), Err(MessageError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_reads_first_line_of_stdout() {
        let cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat >/dev/null; printf '\\nUpdate daily notes\\nsecond line\\n'".to_string(),
        ];
        let src = CommandMessageSource::new(&cmd, Duration::from_secs(10), 1000).unwrap();
        assert_eq!(src.generate("some diff").unwrap(), "Update daily notes");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_is_killed_at_deadline() {
        let cmd = vec!["sleep".to_string(), "10".to_string()];
        let src = CommandMessageSource::new(&cmd, Duration::from_millis(200), 1000).unwrap();
        let started = Instant::now();
        assert!(matches!(src.generate("diff"), Err(MessageError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_background_helper_holding_stdout_hits_deadline() {
        let cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            "sleep 8 & echo 'Update daily notes'".to_string(),
        ];
        let src = CommandMessageSource::new(&cmd, Duration::from_secs(1), 1000).unwrap();
        let started = Instant::now();
        assert!(matches!(src.generate("diff"), Err(MessageError::TimedOut(1))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reports_exit_code() {
        let cmd = vec!["sh".to_string(), "-c".to_string(), "echo nope >&2; exit 3".to_string()];
        let src = CommandMessageSource::new(&cmd, Duration::from_secs(10), 1000).unwrap();
        match src.generate("diff") {
            Err(MessageError::Failed { exit_code, stderr }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_disabled_config_has_no_source() {
        let cfg = MessageConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(CommandMessageSource::from_config(&cfg).is_none());
        assert!(CommandMessageSource::from_config(&MessageConfig::default()).is_some());
    }
}
