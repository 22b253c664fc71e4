//! §8.4 S1 — happy-path dispatch: a task in `To Do` dispatches `/flow:specify`
//! and, once committed, lands in `Specified` with an audit note.

use flowspec::backlog::CreateOptions;
use flowspec::dispatch::{DispatchOptions, Dispatcher};

use super::common::{project_with_workflow, WORKFLOW_YAML};

#[test]
fn s1_happy_path_dispatch() {
    let (dir, workflow_path) = project_with_workflow(WORKFLOW_YAML);
    let dispatcher = Dispatcher::new(dir.path(), workflow_path);

    dispatcher
        .backlog()
        .create("task-1", CreateOptions { status: Some("To Do".to_string()), ..Default::default() })
        .expect("create task-1");

    let result = dispatcher
        .dispatch("/flow:specify", "task-1", "all", &DispatchOptions::default())
        .expect("dispatch should succeed for a task in To Do");

    assert_eq!(result.status, "OK");
    assert_eq!(result.transition.from, "To Do");
    assert_eq!(result.transition.to, "Specified");
    assert_eq!(result.transition.via, "specify");

    let task = dispatcher.commit_transition(dir.path(), "task-1", &result).expect("commit_transition");
    assert_eq!(task.frontmatter.status, "Specified");
    assert!(
        task.notes.starts_with("— transitioned To Do → Specified via specify"),
        "unexpected notes: {}",
        task.notes
    );
}
