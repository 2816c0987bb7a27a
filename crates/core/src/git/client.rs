//! [`VersionControl`] over the `git` command-line tool.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, instrument, warn};

use super::port::VersionControl;
use crate::errors::GitError;

/// Runs `git -C <vault> ...` for every operation.
#[derive(Debug, Clone)]
pub struct GitCli {
    vault: PathBuf,
    git_dir: PathBuf,
}

impl GitCli {
    /// Open the git repository containing `vault`.
    pub fn open<P: AsRef<Path>>(vault: P) -> Result<Self, GitError> {
        let vault = vault.as_ref().to_path_buf();
        let mut client = Self {
            git_dir: PathBuf::new(),
            vault,
        };
        let out = client.run(&["rev-parse", "--absolute-git-dir"])?;
        client.git_dir = PathBuf::from(out.trim());
        info!(vault = %client.vault.display(), git_dir = %client.git_dir.display(), "opened vault");
        Ok(client)
    }

    pub fn vault(&self) -> &Path {
        &self.vault
    }

    /// Absolute path of the repository's git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Run git and return stdout, failing on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run_raw(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_raw(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = self.spawn(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let stdout = String::from_utf8_lossy(&output.stdout);
            let exit_code = output.status.code().unwrap_or(-1);
            // Conflict reports from rebase land on stdout.
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr
            };
            debug!(command = args[0], exit_code, stderr = %detail, "git command failed");
            return Err(GitError::CommandFailed {
                command: args[0].to_string(),
                exit_code,
                stderr: detail,
            });
        }
        Ok(output)
    }

    fn spawn(&self, args: &[&str]) -> Result<Output, GitError> {
        debug!(cmd = ?format!("git {}", args.join(" ")), "running git command");
        Command::new("git")
            .arg("-C")
            .arg(&self.vault)
            .args(args)
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::BinaryNotFound("git".into())
                } else {
                    GitError::IoError(e)
                }
            })
    }

    fn resolve(&self, git_path: &str) -> PathBuf {
        let p = PathBuf::from(git_path.trim());
        if p.is_absolute() {
            p
        } else {
            self.vault.join(p)
        }
    }

    /// Content of index stage `stage` (1 base, 2 ours, 3 theirs) for a
    /// conflicted path; empty when that side does not have the file.
    fn stage_blob(&self, stage: u8, path: &str) -> Result<Vec<u8>, GitError> {
        let spec = format!(":{stage}:{path}");
        match self.run_raw(&["show", &spec]) {
            Ok(output) => Ok(output.stdout),
            Err(GitError::CommandFailed { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

impl VersionControl for GitCli {
    fn current_branch(&self) -> Result<Option<String>, GitError> {
        match self.run(&["symbolic-ref", "--short", "-q", "HEAD"]) {
            Ok(out) => {
                let name = out.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            // `-q` exits 1 silently when HEAD is detached.
            Err(GitError::CommandFailed { exit_code: 1, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn rebase_in_progress(&self) -> Result<bool, GitError> {
        for marker in ["rebase-merge", "rebase-apply"] {
            let path = self.run(&["rev-parse", "--git-path", marker])?;
            if self.resolve(&path).exists() {
                debug!(marker, "rebase state present");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run(&["config", key, value]).map(drop)
    }

    fn stage_all(&self) -> Result<(), GitError> {
        self.run(&["add", "-A"]).map(drop)
    }

    fn staged_diff(&self) -> Result<String, GitError> {
        self.run(&["diff", "--cached", "--no-color", "--no-ext-diff"])
    }

    fn pending_changes(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["status", "--porcelain"])?;
        Ok(out
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn diff_summary(&self) -> Result<String, GitError> {
        match self.run(&["diff", "HEAD", "--stat", "--no-color"]) {
            Ok(out) => Ok(out),
            // No commits yet: compare against the index instead.
            Err(GitError::CommandFailed { .. }) => self.run(&["diff", "--stat", "--no-color"]),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, message))]
    fn commit(&self, message: &str) -> Result<String, GitError> {
        let out = self.run(&["commit", "-m", message])?;
        info!("created commit");
        Ok(out)
    }

    #[instrument(skip(self))]
    fn pull_rebase(&self, remote: &str, branch: &str) -> Result<String, GitError> {
        self.run(&["pull", "--rebase", remote, branch])
    }

    fn rebase_continue(&self) -> Result<String, GitError> {
        self.run(&["rebase", "--continue"])
    }

    fn rebase_abort(&self) -> Result<(), GitError> {
        self.run(&["rebase", "--abort"]).map(drop)
    }

    fn list_conflicts(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U", "-z"])?;
        let mut paths: Vec<String> = out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        paths.dedup();
        Ok(paths)
    }

    fn checkout_ours(&self, path: &str) -> Result<(), GitError> {
        self.run(&["checkout", "--ours", "--", path]).map(drop)
    }

    fn checkout_theirs(&self, path: &str) -> Result<(), GitError> {
        self.run(&["checkout", "--theirs", "--", path]).map(drop)
    }

    fn merge_union(&self, path: &str) -> Result<(), GitError> {
        let scratch = tempfile::tempdir()?;
        let base = scratch.path().join("base");
        let ours = scratch.path().join("ours");
        let theirs = scratch.path().join("theirs");
        std::fs::write(&base, self.stage_blob(1, path)?)?;
        std::fs::write(&ours, self.stage_blob(2, path)?)?;
        std::fs::write(&theirs, self.stage_blob(3, path)?)?;

        let (ours_s, base_s, theirs_s) = (
            ours.to_string_lossy().to_string(),
            base.to_string_lossy().to_string(),
            theirs.to_string_lossy().to_string(),
        );
        let output = self.spawn(&["merge-file", "--union", "-p", &ours_s, &base_s, &theirs_s])?;
        // merge-file exits with the number of conflicts (capped at 127);
        // anything above that is an error.
        match output.status.code() {
            Some(code) if (0..128).contains(&code) => {}
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                warn!(path, %stderr, "merge-file failed");
                return Err(GitError::CommandFailed {
                    command: "merge-file".into(),
                    exit_code: code.unwrap_or(-1),
                    stderr,
                });
            }
        }

        let target = self.vault.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, output.stdout)?;
        debug!(path, "wrote union merge");
        Ok(())
    }

    fn stage_path(&self, path: &str) -> Result<(), GitError> {
        self.run(&["add", "--", path]).map(drop)
    }

    #[instrument(skip(self))]
    fn push(&self, remote: &str, branch: &str) -> Result<String, GitError> {
        self.run(&["push", remote, branch])
    }
}
