//! Version-control facet (git)

use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::debug;

use crate::config::ContextConfig;
use crate::context::command::{self, CommandOutput};
use crate::error::FacetError;
use crate::types::{CommitSummary, FileRef, VcsContext, WorkingTreeStatus};

const FIELD_SEP: char = '\u{1f}';

struct Git<'a> {
    binary: &'a str,
    root: &'a Path,
    config: &'a ContextConfig,
}

impl Git<'_> {
    fn run(&self, args: &[&str]) -> Result<CommandOutput, FacetError> {
        command::run(self.binary, args, Some(self.root), self.config.command_timeout())
    }

    fn line(&self, args: &[&str]) -> Result<String, FacetError> {
        Ok(self.run(args)?.stdout.trim().to_string())
    }
}

/// Capture branch, working tree status and recent history for `root`.
///
/// When `location` carries a line, the commit that last touched it is
/// looked up as well; that lookup is best effort and never fails the facet.
pub(crate) fn extract(
    root: &Path,
    location: Option<&FileRef>,
    config: &ContextConfig,
) -> Result<VcsContext, FacetError> {
    let git = Git {
        binary: &config.vcs_binary,
        root,
        config,
    };

    let toplevel = PathBuf::from(git.line(&["rev-parse", "--show-toplevel"])?);

    let current = git.line(&["branch", "--show-current"])?;
    let (branch, detached) = if current.is_empty() {
        (git.line(&["rev-parse", "--short", "HEAD"])?, true)
    } else {
        (current, false)
    };

    let status = parse_status(&git.run(&["status", "--porcelain"])?.stdout);

    let count = format!("-n{}", config.commit_count.max(1));
    let format = format!("--format=%h{0}%an{0}%ad{0}%s", FIELD_SEP);
    let log = git.run(&["log", &count, &format, "--date=short"])?;
    let recent_commits = parse_log(&log.stdout);

    let line_last_changed = location.and_then(|loc| blame_line(&git, &toplevel, loc));

    Ok(VcsContext {
        branch,
        detached,
        status,
        recent_commits,
        line_last_changed,
    })
}

fn blame_line(git: &Git<'_>, toplevel: &Path, location: &FileRef) -> Option<CommitSummary> {
    let line = location.line?;
    let absolute = if location.path.is_absolute() {
        location.path.clone()
    } else {
        git.root.join(&location.path)
    };
    // Compare canonical forms so symlinked temp dirs still strip cleanly
    let absolute = absolute.canonicalize().ok()?;
    let toplevel = toplevel.canonicalize().ok()?;
    let relative = absolute.strip_prefix(&toplevel).ok()?;
    let relative = relative.to_str()?;

    let range = format!("-L{0},{0}", line);
    match git.run(&["blame", "--porcelain", &range, "--", relative]) {
        Ok(out) => parse_blame(&out.stdout),
        Err(e) => {
            debug!("git blame skipped for {}: {}", relative, e);
            None
        }
    }
}

/// Count porcelain v1 status entries by kind.
fn parse_status(porcelain: &str) -> WorkingTreeStatus {
    let mut status = WorkingTreeStatus::default();
    for line in porcelain.lines() {
        let code = line.get(..2).unwrap_or("");
        if code == "??" {
            status.untracked += 1;
        } else if code.contains('R') {
            status.renamed += 1;
        } else if code.contains('A') {
            status.added += 1;
        } else if code.contains('D') {
            status.deleted += 1;
        } else if !code.trim().is_empty() {
            status.modified += 1;
        }
    }
    status
}

fn parse_log(output: &str) -> Vec<CommitSummary> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(4, FIELD_SEP);
            Some(CommitSummary {
                sha: fields.next()?.to_string(),
                author: fields.next()?.to_string(),
                date: fields.next()?.to_string(),
                subject: fields.next().unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Parse `git blame --porcelain` output for a single line.
///
/// Lines that are not committed yet (all-zero SHA) yield `None`.
fn parse_blame(output: &str) -> Option<CommitSummary> {
    let mut lines = output.lines();
    let sha = lines.next()?.split_whitespace().next()?;
    if sha.chars().all(|c| c == '0') {
        return None;
    }

    let mut author = String::new();
    let mut date = String::new();
    let mut subject = String::new();
    for line in lines {
        if let Some(v) = line.strip_prefix("author ") {
            author = v.to_string();
        } else if let Some(v) = line.strip_prefix("author-time ") {
            date = v
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
        } else if let Some(v) = line.strip_prefix("summary ") {
            subject = v.to_string();
        }
    }

    Some(CommitSummary {
        sha: sha.chars().take(7).collect(),
        author,
        date,
        subject,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]);
        git(dir.path(), &["config", "user.email", "dev@example.com"]);
        git(dir.path(), &["config", "user.name", "Dev"]);
        git(dir.path(), &["config", "commit.gpgsign", "false"]);
        std::fs::write(dir.path().join("app.py"), "a = 1\nb = [1]\nprint(b[3])\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "Add app"]);
        dir
    }

    fn slow_host_config() -> ContextConfig {
        ContextConfig {
            command_timeout_ms: 10_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_status_counts() {
        let status = parse_status(" M src/a.rs\nM  src/b.rs\nA  new.rs\n D gone.rs\nR  old.rs -> new2.rs\n?? scratch.txt\n?? tmp/\n");
        assert_eq!(status.modified, 2);
        assert_eq!(status.added, 1);
        assert_eq!(status.deleted, 1);
        assert_eq!(status.renamed, 1);
        assert_eq!(status.untracked, 2);
        assert!(parse_status("").short() == "clean");
    }

    #[test]
    fn test_parse_log_fields() {
        let out = "abc1234\u{1f}Ada\u{1f}2024-03-01\u{1f}Fix: handle a | b\nzzz9999\u{1f}Bob\u{1f}2024-02-28\u{1f}\n";
        let commits = parse_log(out);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "abc1234");
        assert_eq!(commits[0].subject, "Fix: handle a | b");
        assert_eq!(commits[1].subject, "");
    }

    #[test]
    fn test_parse_blame_porcelain() {
        let out = "1f2e3d4c5b6a79881f2e3d4c5b6a79881f2e3d4c 3 3 1\nauthor Ada\nauthor-mail <ada@example.com>\nauthor-time 1709251200\nauthor-tz +0000\nsummary Add app\nfilename app.py\n\tprint(b[3])\n";
        let commit = parse_blame(out).unwrap();
        assert_eq!(commit.sha, "1f2e3d4");
        assert_eq!(commit.author, "Ada");
        assert_eq!(commit.date, "2024-03-01");
        assert_eq!(commit.subject, "Add app");

        let uncommitted = "0000000000000000000000000000000000000000 1 1 1\nauthor Not Committed Yet\n";
        assert!(parse_blame(uncommitted).is_none());
    }

    #[test]
    fn test_extract_from_repository() {
        if !git_available() {
            return;
        }
        let dir = repo();
        std::fs::write(dir.path().join("notes.txt"), "scratch").unwrap();

        let loc = FileRef::new("app.py", Some(3));
        let ctx = extract(dir.path(), Some(&loc), &slow_host_config()).unwrap();

        assert_eq!(ctx.branch, "main");
        assert!(!ctx.detached);
        assert_eq!(ctx.status.untracked, 1);
        assert_eq!(ctx.recent_commits.len(), 1);
        assert_eq!(ctx.recent_commits[0].subject, "Add app");
        assert_eq!(ctx.recent_commits[0].author, "Dev");
        let blamed = ctx.line_last_changed.unwrap();
        assert_eq!(blamed.subject, "Add app");
    }

    #[test]
    fn test_not_a_repository_is_unavailable() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        assert!(extract(dir.path(), None, &slow_host_config()).is_err());
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let config = ContextConfig {
            vcs_binary: "tracelens-no-such-vcs".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            extract(dir.path(), None, &config),
            Err(FacetError::Io(_))
        ));
    }
}
