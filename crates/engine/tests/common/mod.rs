//! Shared test fixtures: a scripted in-memory vault implementing the
//! version-control port, a recording sleeper and a fixed message source.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use vault_sync::SyncEngine;
use vault_sync_core::errors::{GitError, MessageError};
use vault_sync_core::git::VersionControl;
use vault_sync_core::message::MessageSource;
use vault_sync_core::retry::Sleeper;
use vault_sync_core::{RunMode, SyncLog, VaultConfig};

/// What the next `pull --rebase` does.
#[derive(Debug, Clone)]
pub enum PullStep {
    Ok,
    Network,
    Conflict(Vec<String>),
}

/// What the next `rebase --continue` does.
#[derive(Debug, Clone)]
pub enum ContinueStep {
    /// The rebase finishes.
    Done,
    /// The rebase stops on the next commit with these conflicts.
    Conflicts(Vec<String>),
    /// Fails without leaving any conflicted path.
    FailClean,
}

/// Operations that change the vault, its index, history or the remote.
pub const MUTATING: &[&str] = &[
    "stage_all",
    "commit",
    "pull_rebase",
    "rebase_continue",
    "rebase_abort",
    "checkout_ours",
    "checkout_theirs",
    "merge_union",
    "stage_path",
    "push",
];

#[derive(Debug)]
pub struct FakeState {
    pub branch: Option<String>,
    pub rebase_in_progress: bool,
    pub abort_clears: bool,
    /// Reading the rebase state fails while a rebase is in progress.
    pub inspect_fails_mid_rebase: bool,
    pub pending: Vec<String>,
    pub staged: Vec<String>,
    pub pulls: VecDeque<PullStep>,
    pub continues: VecDeque<ContinueStep>,
    pub conflicts: Vec<String>,
    pub failing_paths: Vec<String>,
    pub push_failures: u32,
    pub commit_fails: bool,
    pub commits: Vec<String>,
    pub config: Vec<(String, String)>,
    pub calls: Vec<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            branch: Some("main".into()),
            rebase_in_progress: false,
            abort_clears: true,
            inspect_fails_mid_rebase: false,
            pending: Vec::new(),
            staged: Vec::new(),
            pulls: VecDeque::new(),
            continues: VecDeque::new(),
            conflicts: Vec::new(),
            failing_paths: Vec::new(),
            push_failures: 0,
            commit_fails: false,
            commits: Vec::new(),
            config: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// Scripted vault. Clones share state so a test can inspect it after the
/// engine has taken ownership.
#[derive(Debug, Clone, Default)]
pub struct FakeGit {
    pub state: Rc<RefCell<FakeState>>,
}

fn failed(command: &str, stderr: &str) -> GitError {
    GitError::CommandFailed {
        command: command.into(),
        exit_code: 1,
        stderr: stderr.into(),
    }
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(f: impl FnOnce(&mut FakeState)) -> Self {
        let git = Self::default();
        f(&mut git.state.borrow_mut());
        git
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| MUTATING.contains(&c.split(' ').next().unwrap_or_default()))
            .collect()
    }

    fn call(&self, entry: String) {
        self.state.borrow_mut().calls.push(entry);
    }

    fn resolve_path(&self, op: &str, path: &str) -> Result<(), GitError> {
        self.call(format!("{op} {path}"));
        if self.state.borrow().failing_paths.iter().any(|p| p == path) {
            return Err(failed("checkout", &format!("error: path '{path}' does not have that version")));
        }
        Ok(())
    }
}

impl VersionControl for FakeGit {
    fn current_branch(&self) -> Result<Option<String>, GitError> {
        self.call("current_branch".into());
        Ok(self.state.borrow().branch.clone())
    }

    fn rebase_in_progress(&self) -> Result<bool, GitError> {
        let s = self.state.borrow();
        if s.rebase_in_progress && s.inspect_fails_mid_rebase {
            return Err(failed("rev-parse", "fatal: unable to read index"));
        }
        Ok(s.rebase_in_progress)
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.call(format!("set_config {key}"));
        self.state
            .borrow_mut()
            .config
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn stage_all(&self) -> Result<(), GitError> {
        self.call("stage_all".into());
        let mut s = self.state.borrow_mut();
        let pending = std::mem::take(&mut s.pending);
        s.staged.extend(pending);
        Ok(())
    }

    fn staged_diff(&self) -> Result<String, GitError> {
        Ok(self
            .state
            .borrow()
            .staged
            .iter()
            .map(|p| format!("diff --git a/{p} b/{p}\n"))
            .collect())
    }

    fn pending_changes(&self) -> Result<Vec<String>, GitError> {
        Ok(self
            .state
            .borrow()
            .pending
            .iter()
            .map(|p| format!(" M {p}"))
            .collect())
    }

    fn diff_summary(&self) -> Result<String, GitError> {
        let s = self.state.borrow();
        let mut out: String = s
            .pending
            .iter()
            .map(|p| format!(" {p} | 1 +\n"))
            .collect();
        if !s.pending.is_empty() {
            out.push_str(&format!(
                " {} file(s) changed, {} insertion(s)(+)\n",
                s.pending.len(),
                s.pending.len()
            ));
        }
        Ok(out)
    }

    fn commit(&self, message: &str) -> Result<String, GitError> {
        self.call(format!("commit {message}"));
        let mut s = self.state.borrow_mut();
        if s.commit_fails {
            return Err(failed("commit", "Author identity unknown"));
        }
        s.staged.clear();
        s.commits.push(message.to_string());
        Ok(String::new())
    }

    fn pull_rebase(&self, remote: &str, branch: &str) -> Result<String, GitError> {
        self.call(format!("pull_rebase {remote}/{branch}"));
        let mut s = self.state.borrow_mut();
        match s.pulls.pop_front().unwrap_or(PullStep::Ok) {
            PullStep::Ok => Ok("Current branch main is up to date.".into()),
            PullStep::Network => Err(failed("pull", "fatal: unable to access remote")),
            PullStep::Conflict(paths) => {
                s.rebase_in_progress = true;
                s.conflicts = paths;
                Err(failed("pull", "CONFLICT (content): Merge conflict"))
            }
        }
    }

    fn rebase_continue(&self) -> Result<String, GitError> {
        self.call("rebase_continue".into());
        let mut s = self.state.borrow_mut();
        match s.continues.pop_front().unwrap_or(ContinueStep::Done) {
            ContinueStep::Done => {
                s.rebase_in_progress = false;
                Ok(String::new())
            }
            ContinueStep::Conflicts(paths) => {
                s.conflicts = paths;
                Err(failed("rebase", "CONFLICT (content): Merge conflict"))
            }
            ContinueStep::FailClean => Err(failed("rebase", "could not apply commit")),
        }
    }

    fn rebase_abort(&self) -> Result<(), GitError> {
        self.call("rebase_abort".into());
        let mut s = self.state.borrow_mut();
        if !s.abort_clears {
            return Err(failed("rebase", "error: could not remove rebase-merge directory"));
        }
        s.rebase_in_progress = false;
        s.conflicts.clear();
        Ok(())
    }

    fn list_conflicts(&self) -> Result<Vec<String>, GitError> {
        Ok(self.state.borrow().conflicts.clone())
    }

    fn checkout_ours(&self, path: &str) -> Result<(), GitError> {
        self.resolve_path("checkout_ours", path)
    }

    fn checkout_theirs(&self, path: &str) -> Result<(), GitError> {
        self.resolve_path("checkout_theirs", path)
    }

    fn merge_union(&self, path: &str) -> Result<(), GitError> {
        self.resolve_path("merge_union", path)
    }

    fn stage_path(&self, path: &str) -> Result<(), GitError> {
        self.call(format!("stage_path {path}"));
        self.state.borrow_mut().conflicts.retain(|p| p != path);
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<String, GitError> {
        self.call(format!("push {remote}/{branch}"));
        let mut s = self.state.borrow_mut();
        if s.push_failures > 0 {
            s.push_failures -= 1;
            return Err(failed("push", "fatal: Could not read from remote repository."));
        }
        Ok(String::new())
    }
}

/// Sleeper that only records the requested delays.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper(pub Rc<RefCell<Vec<Duration>>>);

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.0.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

/// Message source returning a fixed answer.
pub struct FixedMessage(pub &'static str);

impl MessageSource for FixedMessage {
    fn generate(&self, _diff: &str) -> Result<String, MessageError> {
        Ok(self.0.to_string())
    }
}

/// Engine over `git` logging into `dir`, with a recording sleeper.
pub fn engine(
    git: &FakeGit,
    dir: &Path,
    mode: RunMode,
    sleeper: &RecordingSleeper,
) -> SyncEngine<FakeGit> {
    let log = SyncLog::new(dir.join("vault-sync.log"), mode);
    SyncEngine::new(VaultConfig::default(), git.clone(), log)
        .with_sleeper(Box::new(sleeper.clone()))
}

pub fn log_lines(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("vault-sync.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
