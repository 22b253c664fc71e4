//! §8.4 S2 — invalid transition: a task already in `Specified` cannot
//! dispatch `/flow:specify` again; the error names the offending state and
//! the states the command actually requires.

use flowspec::backlog::CreateOptions;
use flowspec::dispatch::{DispatchOptions, Dispatcher};
use flowspec::error::DomainError;

use super::common::{project_with_workflow, WORKFLOW_YAML};

#[test]
fn s2_invalid_transition_reports_required_states() {
    let (dir, workflow_path) = project_with_workflow(WORKFLOW_YAML);
    let dispatcher = Dispatcher::new(dir.path(), workflow_path);

    dispatcher
        .backlog()
        .create("task-2", CreateOptions { status: Some("Specified".to_string()), ..Default::default() })
        .expect("create task-2");

    let err = dispatcher
        .dispatch("/flow:specify", "task-2", "all", &DispatchOptions::default())
        .expect_err("dispatch should reject a task already past the command's input states");

    assert_eq!(err.rule_id(), "E201_INVALID_STATE_TRANSITION");
    assert_eq!(err.exit_code(), 1);
    assert_eq!(
        err.to_string(),
        "task is in `Specified`; the `/flow:specify` command requires `[To Do]`"
    );
}
