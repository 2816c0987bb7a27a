//! Applies classification rules to the conflicted paths of a rebase stop.

use tracing::{info, warn};

use super::classifier::{ConflictClassifier, ConflictRule};
use crate::errors::GitError;
use crate::git::VersionControl;

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Paths resolved and staged, with the rule applied.
    pub resolved: Vec<(String, ConflictRule)>,
    /// Paths whose resolution action failed, with the failure text.
    pub unresolved: Vec<(String, String)>,
}

impl ResolveReport {
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// `true` when every conflicted path was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn unresolved_paths(&self) -> Vec<String> {
        self.unresolved.iter().map(|(p, _)| p.clone()).collect()
    }
}

/// Resolves conflicts without interaction.
///
/// Local and remote are expressed in rebase terms: the local commit being
/// replayed is git's "theirs", the upstream is git's "ours".
pub struct ConflictResolver<'a> {
    classifier: &'a ConflictClassifier,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(classifier: &'a ConflictClassifier) -> Self {
        Self { classifier }
    }

    /// Resolve and stage every path in `conflicts`.
    pub fn resolve<G: VersionControl + ?Sized>(&self, git: &G, conflicts: &[String]) -> ResolveReport {
        let mut report = ResolveReport::default();

        for path in conflicts {
            let rule = self.classifier.classify(path);
            match Self::apply(git, path, rule) {
                Ok(()) => {
                    info!(path = %path, rule = %rule, "resolved conflict");
                    report.resolved.push((path.clone(), rule));
                }
                Err(e) => {
                    warn!(path = %path, rule = %rule, error = %e, "could not resolve conflict");
                    report.unresolved.push((path.clone(), e.diagnostic()));
                }
            }
        }

        report
    }

    fn apply<G: VersionControl + ?Sized>(git: &G, path: &str, rule: ConflictRule) -> Result<(), GitError> {
        match rule {
            ConflictRule::Union => git.merge_union(path)?,
            ConflictRule::KeepLocal => git.checkout_theirs(path)?,
            ConflictRule::KeepRemote => git.checkout_ours(path)?,
        }
        git.stage_path(path)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::ConflictRulesConfig;

    /// Records the calls the resolver makes; fails checkouts of listed paths.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
        failing: Vec<String>,
    }

    impl Recorder {
        fn record(&self, op: &str, path: &str) -> Result<(), GitError> {
            self.calls.borrow_mut().push(format!("{op} {path}"));
            if self.failing.iter().any(|f| f == path) {
                return Err(GitError::CommandFailed {
                    command: "checkout".into(),
                    exit_code: 1,
                    stderr: format!("error: path '{path}' does not have our version"),
                });
            }
            Ok(())
        }
    }

    impl VersionControl for Recorder {
        fn current_branch(&self) -> Result<Option<String>, GitError> {
            unreachable!()
        }
        fn rebase_in_progress(&self) -> Result<bool, GitError> {
            unreachable!()
        }
        fn set_config(&self, _: &str, _: &str) -> Result<(), GitError> {
            unreachable!()
        }
        fn stage_all(&self) -> Result<(), GitError> {
            unreachable!()
        }
        fn staged_diff(&self) -> Result<String, GitError> {
            unreachable!()
        }
        fn pending_changes(&self) -> Result<Vec<String>, GitError> {
            unreachable!()
        }
        fn diff_summary(&self) -> Result<String, GitError> {
            unreachable!()
        }
        fn commit(&self, _: &str) -> Result<String, GitError> {
            unreachable!()
        }
        fn pull_rebase(&self, _: &str, _: &str) -> Result<String, GitError> {
            unreachable!()
        }
        fn rebase_continue(&self) -> Result<String, GitError> {
            unreachable!()
        }
        fn rebase_abort(&self) -> Result<(), GitError> {
            unreachable!()
        }
        fn list_conflicts(&self) -> Result<Vec<String>, GitError> {
            unreachable!()
        }
        fn checkout_ours(&self, path: &str) -> Result<(), GitError> {
            self.record("ours", path)
        }
        fn checkout_theirs(&self, path: &str) -> Result<(), GitError> {
            self.record("theirs", path)
        }
        fn merge_union(&self, path: &str) -> Result<(), GitError> {
            self.record("union", path)
        }
        fn stage_path(&self, path: &str) -> Result<(), GitError> {
            self.calls.borrow_mut().push(format!("add {path}"));
            Ok(())
        }
        fn push(&self, _: &str, _: &str) -> Result<String, GitError> {
            unreachable!()
        }
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mixed_conflict_set_fully_resolved() {
        let classifier = ConflictClassifier::from(&ConflictRulesConfig::default());
        let git = Recorder::default();
        let report = ConflictResolver::new(&classifier).resolve(
            &git,
            &paths(&["notes/today.md", ".obsidian/workspace.json", "image.png"]),
        );

        assert!(report.is_complete());
        assert_eq!(report.resolved_count(), 3);
        assert_eq!(
            report.resolved,
            vec![
                ("notes/today.md".to_string(), ConflictRule::Union),
                (".obsidian/workspace.json".to_string(), ConflictRule::KeepLocal),
                ("image.png".to_string(), ConflictRule::KeepRemote),
            ]
        );
        assert_eq!(
            *git.calls.borrow(),
            vec![
                "union notes/today.md",
                "add notes/today.md",
                "theirs .obsidian/workspace.json",
                "add .obsidian/workspace.json",
                "ours image.png",
                "add image.png",
            ]
        );
    }

    #[test]
    fn test_failed_action_is_unresolved_and_not_staged() {
        let classifier = ConflictClassifier::from(&ConflictRulesConfig::default());
        let git = Recorder {
            failing: vec!["deleted.bin".into()],
            ..Default::default()
        };
        let report =
            ConflictResolver::new(&classifier).resolve(&git, &paths(&["a.md", "deleted.bin"]));

        assert!(!report.is_complete());
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(report.unresolved_paths(), vec!["deleted.bin"]);
        assert!(report.unresolved[0].1.contains("does not have our version"));
        assert!(!git.calls.borrow().contains(&"add deleted.bin".to_string()));
    }

    #[test]
    fn test_empty_conflict_set_is_complete() {
        let classifier = ConflictClassifier::from(&ConflictRulesConfig::default());
        let report = ConflictResolver::new(&classifier).resolve(&Recorder::default(), &[]);
        assert!(report.is_complete());
        assert_eq!(report.resolved_count(), 0);
    }
}
