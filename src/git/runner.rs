use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, WiggumError};

/// Captured git/gh invocation: exit status plus both streams already
/// decoded, so callers match on content without re-reading the raw output.
pub struct CommandOutcome {
    success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Turn a non-zero exit into a git error tagged with what was being
    /// attempted.
    fn require(self, doing: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(WiggumError::Git(format!(
                "{}: {}",
                doing,
                self.stderr.trim()
            )))
        }
    }

    fn stdout_lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub struct GitRunner {
    working_dir: PathBuf,
}

impl GitRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<CommandOutcome> {
        debug!(dir = %self.working_dir.display(), ?args, "git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await?;

        Ok(CommandOutcome::from_output(output))
    }

    pub async fn is_repository(&self) -> bool {
        matches!(self.git(&["rev-parse", "--git-dir"]).await, Ok(o) if o.success())
    }

    /// Resolve a revision to its commit hash.
    pub async fn rev_parse(&self, rev: &str) -> Result<String> {
        let outcome = self.git(&["rev-parse", rev]).await?.require("rev-parse")?;
        Ok(outcome.stdout.trim().to_string())
    }

    pub async fn add_all(&self) -> Result<()> {
        self.git(&["add", "-A"]).await?.require("stage changes")?;
        Ok(())
    }

    /// Commit staged changes. Returns false when there was nothing to
    /// commit, which callers treat as a clean no-op.
    pub async fn commit(&self, message: &str) -> Result<bool> {
        let outcome = self.git(&["commit", "-m", message]).await?;
        if outcome.success() {
            return Ok(true);
        }

        let noise = format!("{}{}", outcome.stdout, outcome.stderr);
        if noise.contains("nothing to commit") {
            Ok(false)
        } else {
            Err(WiggumError::Git(format!(
                "commit: {}",
                outcome.stderr.trim()
            )))
        }
    }

    /// `git status --porcelain`, one line per dirty path.
    pub async fn status_porcelain(&self) -> Result<Vec<String>> {
        let outcome = self
            .git(&["status", "--porcelain"])
            .await?
            .require("status")?;
        Ok(outcome.stdout_lines())
    }

    pub async fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(!self.status_porcelain().await?.is_empty())
    }

    pub async fn diff_stat(&self, base: &str) -> Result<String> {
        Ok(self.git(&["diff", "--stat", base]).await?.stdout)
    }

    pub async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.git(&["push", "-u", remote, branch])
            .await?
            .require("push")?;
        Ok(())
    }

    pub async fn branch_exists(&self, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{}", branch);
        Ok(self
            .git(&["rev-parse", "--verify", &refname])
            .await?
            .success())
    }

    pub async fn delete_branch(&self, branch: &str) -> Result<bool> {
        Ok(self.git(&["branch", "-D", branch]).await?.success())
    }

    /// Add a worktree for the task branch. A branch that already exists is
    /// checked out as-is (a follow-up attempt continuing earlier work); a
    /// new one is created off the base revision.
    pub async fn worktree_add(&self, path: &Path, branch: &str, base: &str) -> Result<()> {
        let target = utf8_path(path)?;

        let mut args = vec!["worktree", "add"];
        let create_branch = !self.branch_exists(branch).await?;
        if create_branch {
            args.extend(["-b", branch, target, base]);
        } else {
            args.extend([target, branch]);
        }

        let outcome = self.git(&args).await?;
        worktree_result(outcome, path)
    }

    pub async fn worktree_remove(&self, path: &Path) -> Result<()> {
        let target = utf8_path(path)?;
        let outcome = self.git(&["worktree", "remove", "--force", target]).await?;
        worktree_result(outcome, path)
    }

    pub async fn worktree_prune(&self) -> Result<()> {
        self.git(&["worktree", "prune"]).await?;
        Ok(())
    }

    /// Trial-merge a branch without committing or touching the index on
    /// failure. Returns true when the merge would conflict.
    pub async fn merge_would_conflict(&self, branch: &str) -> Result<bool> {
        let outcome = self.git(&["merge", "--no-commit", "--no-ff", branch]).await?;
        // Leave the working tree as it was either way.
        let _ = self.git(&["merge", "--abort"]).await;
        Ok(!outcome.success())
    }

    pub async fn merge(&self, branch: &str, message: &str) -> Result<()> {
        self.git(&["merge", "--no-ff", branch, "-m", message])
            .await?
            .require("merge")?;
        Ok(())
    }
}

/// git takes worktree paths as command-line strings; reject anything that
/// cannot be represented.
fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| WiggumError::Worktree {
        message: "path is not valid UTF-8".to_string(),
        path: path.to_path_buf(),
    })
}

fn worktree_result(outcome: CommandOutcome, path: &Path) -> Result<()> {
    if outcome.success() {
        Ok(())
    } else {
        Err(WiggumError::Worktree {
            message: outcome.stderr.trim().to_string(),
            path: path.to_path_buf(),
        })
    }
}

pub struct GhRunner {
    working_dir: PathBuf,
}

impl GhRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    async fn gh(&self, args: &[&str]) -> Result<CommandOutcome> {
        debug!(?args, "gh");

        let output = Command::new("gh")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await?;

        Ok(CommandOutcome::from_output(output))
    }

    pub async fn create_pr(&self, branch: &str, title: &str, body: &str) -> Result<String> {
        let outcome = self
            .gh(&[
                "pr", "create", "--head", branch, "--title", title, "--body", body,
            ])
            .await?;

        if !outcome.success() {
            return Err(WiggumError::PullRequest(outcome.stderr.trim().to_string()));
        }

        let url = outcome.stdout.trim().to_string();
        if url.is_empty() {
            warn!(branch = %branch, "gh reported success but printed no PR URL");
        }
        Ok(url)
    }

    pub async fn merge_pr(&self, branch: &str) -> Result<()> {
        let outcome = self.gh(&["pr", "merge", branch, "--merge"]).await?;

        if !outcome.success() {
            return Err(WiggumError::PullRequest(outcome.stderr.trim().to_string()));
        }

        Ok(())
    }
}
