//! Shared fixtures for the integration suite: a minimal on-disk project
//! (workflow document + empty backlog dir) that each scenario file builds on.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

pub const WORKFLOW_YAML: &str = r#"
version: "1.0"
states: [To Do, Specified]
workflows:
  specify:
    command: /flow:specify
    agents: ["@pm"]
    input_states: [To Do]
    output_state: Specified
transitions:
  - from: To Do
    to: Specified
    via: specify
"#;

/// Writes `yaml` to `<tempdir>/flowspec_workflow.yml` and returns the
/// directory (kept alive for the caller) and the workflow file path.
pub fn project_with_workflow(yaml: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let workflow_path = dir.path().join("flowspec_workflow.yml");
    fs::write(&workflow_path, yaml).expect("write workflow document");
    (dir, workflow_path)
}
