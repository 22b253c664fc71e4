use std::path::{Path, PathBuf};

use flowspec::error::has_errors;
use flowspec::workflow::{self, LoadResult};

use super::{print_findings_human, print_findings_json, print_success};

/// Maps a validation outcome's rule ids to the exit code table of the
/// external `workflow validate` interface: file errors take precedence
/// over schema errors, which take precedence over semantic errors.
fn classify_exit_code(rule_ids: impl Iterator<Item = &'static str>) -> i32 {
    let mut saw_semantic_error = false;
    for rule_id in rule_ids {
        if rule_id.starts_with("E001") || rule_id.starts_with("E002") {
            return 2;
        }
        if rule_id.starts_with("E003") || rule_id.starts_with("E004") {
            return 3;
        }
        if rule_id.starts_with("E1") {
            saw_semantic_error = true;
        }
    }
    if saw_semantic_error { 1 } else { 0 }
}

pub fn validate(project_root: &Path, file: Option<PathBuf>, json: bool) -> i32 {
    let path = file.unwrap_or_else(|| super::project::workflow_path(project_root));
    let schema = workflow::generate_schema();

    match workflow::load(&path, &schema) {
        LoadResult::Ok { warnings, .. } => {
            if json {
                print_findings_json(&warnings);
            } else {
                print_findings_human(&warnings);
                print_success(&format!("{} is valid", path.display()));
            }
            classify_exit_code(warnings.iter().map(|f| f.rule_id))
        }
        LoadResult::Err(findings) => {
            let code = classify_exit_code(findings.iter().map(|f| f.rule_id));
            debug_assert!(has_errors(&findings));
            if json {
                print_findings_json(&findings);
            } else {
                print_findings_human(&findings);
            }
            code
        }
    }
}
