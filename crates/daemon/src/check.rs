//! `check`: diagnostic report for a vault and its daemon setup.

use std::path::{Path, PathBuf};

use console::Style;

use vault_sync_core::git::{GitCli, VersionControl};
use vault_sync_core::VaultConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn mark(self) -> (&'static str, Style) {
        match self {
            Self::Ok => ("✓", Style::new().green()),
            Self::Warn => ("⚠", Style::new().yellow()),
            Self::Fail => ("✗", Style::new().red()),
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone)]
pub struct Check {
    pub label: &'static str,
    pub status: Status,
    pub detail: String,
}

impl Check {
    fn new(label: &'static str, status: Status, detail: impl Into<String>) -> Self {
        Self {
            label,
            status,
            detail: detail.into(),
        }
    }

    /// Report line: status mark, padded label, detail.
    fn line(&self) -> String {
        let (symbol, style) = self.status.mark();
        format!(
            "{} {:<16} {}",
            style.apply_to(symbol),
            self.label,
            self.detail
        )
    }
}

/// Inspect the vault and the daemon's dependencies.
pub fn collect(vault: &Path, config: &VaultConfig) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match config.validate() {
        Ok(()) => Check::new("Configuration", Status::Ok, "valid"),
        Err(e) => Check::new("Configuration", Status::Fail, e.to_string()),
    });

    if !vault.is_dir() {
        checks.push(Check::new(
            "Vault",
            Status::Fail,
            format!("{} (missing)", vault.display()),
        ));
        return checks;
    }
    checks.push(Check::new("Vault", Status::Ok, vault.display().to_string()));

    match GitCli::open(vault) {
        Ok(git) => {
            checks.push(Check::new(
                "Git repository",
                Status::Ok,
                git.git_dir().display().to_string(),
            ));
            checks.push(match git.current_branch() {
                Ok(Some(branch)) => Check::new("Branch", Status::Ok, branch),
                Ok(None) => Check::new("Branch", Status::Fail, "detached HEAD"),
                Err(e) => Check::new("Branch", Status::Fail, e.diagnostic()),
            });
            if let Ok(true) = git.rebase_in_progress() {
                checks.push(Check::new(
                    "Rebase state",
                    Status::Warn,
                    "stale rebase present, the next run will abort it",
                ));
            }
            checks.push(Check::new(
                "Sync log",
                Status::Ok,
                config
                    .log_path(git.vault(), git.git_dir())
                    .display()
                    .to_string(),
            ));
        }
        Err(e) => checks.push(Check::new("Git repository", Status::Fail, e.diagnostic())),
    }

    let engine = &config.daemon.engine_binary;
    checks.push(match find_executable(engine) {
        Some(path) => Check::new("Engine", Status::Ok, path.display().to_string()),
        None => Check::new(
            "Engine",
            Status::Fail,
            format!("{} not found, runs will only pull", engine.display()),
        ),
    });

    checks.push(if !config.message.enabled {
        Check::new("Message tool", Status::Ok, "disabled, timestamp messages")
    } else {
        match config.message.command.first() {
            Some(tool) => match find_executable(Path::new(tool)) {
                Some(path) => Check::new("Message tool", Status::Ok, path.display().to_string()),
                None => Check::new(
                    "Message tool",
                    Status::Warn,
                    format!("{tool} not found, timestamp messages will be used"),
                ),
            },
            None => Check::new("Message tool", Status::Fail, "no command configured"),
        }
    });

    checks.push(Check::new(
        "Schedule",
        Status::Ok,
        config.daemon.schedule().to_string(),
    ));

    checks
}

/// Print the report. Returns whether nothing failed.
pub fn render(checks: &[Check]) -> bool {
    let title = "vault-sync check";
    println!();
    println!("{}", Style::new().bold().apply_to(title));
    println!("{}", "═".repeat(title.len()));
    println!();

    for check in checks {
        println!("  {}", check.line());
    }

    let failures = checks.iter().filter(|c| c.status == Status::Fail).count();
    let summary = match failures {
        0 => "All checks passed.".to_string(),
        n => format!("{n} check(s) failed."),
    };
    println!();
    println!("  {}", Style::new().dim().apply_to(summary));
    failures == 0
}

/// Resolve `program` like the shell does: paths with a separator are taken
/// as-is, bare names are looked up on `PATH`.
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
