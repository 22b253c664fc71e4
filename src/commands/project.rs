//! Project-root and workflow-path discovery shared by every subcommand.

use std::path::{Path, PathBuf};

use flowspec::workflow;

/// Resolves the project root: the `-C`/`--directory` override if given,
/// otherwise the enclosing git repository root, falling back to the
/// current directory outside a repo (a freshly-`flow init`ed project may
/// not be a git repository yet).
pub fn discover_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(flowspec::git::find_repo_root(&cwd).unwrap_or(cwd))
}

/// The workflow document path within `project_root`: the canonical
/// filename if present, else the legacy alias, else the canonical path as
/// the default write target for `flow init`.
pub fn workflow_path(project_root: &Path) -> PathBuf {
    let canonical = project_root.join(workflow::CANONICAL_FILENAME);
    if canonical.exists() {
        return canonical;
    }
    let legacy = project_root.join(workflow::LEGACY_FILENAME);
    if legacy.exists() {
        return legacy;
    }
    canonical
}
