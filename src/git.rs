//! Minimal git plumbing.
//!
//! Flowspec is not a git-worktree manager; it only needs enough git
//! awareness to find the project root and to name the current feature
//! (`FLOWSPEC_FEATURE`). Shells out to `git` directly rather than a libgit2
//! binding, preferring thin wrappers over the `git` binary plus precise,
//! purpose-built parsing.

use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug)]
pub enum GitError {
    NotARepository,
    CommandFailed(String),
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_EMOJI};
        match self {
            GitError::NotARepository => {
                write!(f, "{ERROR_EMOJI} {ERROR}not inside a git repository{ERROR:#}")
            }
            GitError::CommandFailed(msg) => write!(f, "{ERROR_EMOJI} {ERROR}{msg}{ERROR:#}"),
        }
    }
}

impl std::error::Error for GitError {}

/// Finds the repository root by walking up from `start` looking for `.git`.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Returns the current branch name, or `None` in detached-HEAD state.
pub fn current_branch(repo_root: &Path) -> Result<Option<String>, GitError> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["symbolic-ref", "--short", "-q", "HEAD"])
        .output()
        .map_err(|e| GitError::CommandFailed(e.to_string()))?;

    if !out.status.success() {
        return Ok(None);
    }
    let name = String::from_utf8_lossy(&out.stdout).trim().to_string();
    Ok(if name.is_empty() { None } else { Some(name) })
}

/// Resolves the "current feature" name used to scope backlog/telemetry
/// context: `FLOWSPEC_FEATURE` env override first, then the current git
/// branch, then `None` when neither is available (e.g. outside a repo).
pub fn current_feature(repo_root: Option<&Path>) -> Option<String> {
    if let Ok(v) = std::env::var("FLOWSPEC_FEATURE") {
        if !v.is_empty() {
            return Some(v);
        }
    }
    repo_root.and_then(|root| current_branch(root).ok().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn feature_env_override_wins() {
        unsafe {
            env::set_var("FLOWSPEC_FEATURE", "my-feature");
        }
        assert_eq!(current_feature(None), Some("my-feature".to_string()));
        unsafe {
            env::remove_var("FLOWSPEC_FEATURE");
        }
    }

    #[test]
    fn find_repo_root_none_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_repo_root(dir.path()).is_none());
    }
}
