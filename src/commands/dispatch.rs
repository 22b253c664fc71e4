use std::path::Path;

use flowspec::dispatch::{DispatchError, DispatchOptions, DispatchResult, Dispatcher};

use super::{print_hint, print_success, report_domain_error};

fn build_dispatcher(project_root: &Path) -> Dispatcher {
    let workflow_path = super::project::workflow_path(project_root);
    Dispatcher::new(project_root, workflow_path)
}

fn print_plan_human(result: &DispatchResult) {
    print_success(&format!(
        "{} → {} via {}",
        result.transition.from, result.transition.to, result.transition.via
    ));
    if !result.plan.agents.is_empty() {
        print_hint(&format!("agents: {}", result.plan.agents.join(", ")));
    }
}

fn print_invalid_transition_hint(dispatcher: &Dispatcher, task_id: &str, role: &str) {
    let Ok(role) = role.parse() else { return };
    if let Ok(commands) = dispatcher.legal_commands_for(task_id, &role) {
        if !commands.is_empty() {
            print_hint(&format!("legal commands from here: {}", commands.join(", ")));
        }
    }
}

/// `flow dispatch <command> --task <id>`: builds and prints the plan
/// without mutating anything.
pub fn run(project_root: &Path, command: &str, task: &str, role: &str, approved: bool, json: bool) -> i32 {
    let dispatcher = build_dispatcher(project_root);
    let options = DispatchOptions { approved };

    match dispatcher.dispatch(command, task, role, &options) {
        Ok(result) => {
            if json {
                let value = serde_json::to_string_pretty(&result).expect("DispatchResult serialization never fails");
                flowspec::styling::println!("{value}");
            } else {
                print_plan_human(&result);
            }
            0
        }
        Err(err) => {
            let code = report_domain_error(&err, json);
            if matches!(err, DispatchError::InvalidStateTransition { .. }) && !json {
                print_invalid_transition_hint(&dispatcher, task, role);
            }
            code
        }
    }
}

/// `flow commit <command> --task <id>`: re-derives the same plan, then
/// commits the transition (validates output artifacts, writes status,
/// appends an audit note).
pub fn commit(project_root: &Path, command: &str, task: &str, role: &str, approved: bool, json: bool) -> i32 {
    let dispatcher = build_dispatcher(project_root);
    let options = DispatchOptions { approved };

    let result = match dispatcher.dispatch(command, task, role, &options) {
        Ok(result) => result,
        Err(err) => return report_domain_error(&err, json),
    };

    match dispatcher.commit_transition(project_root, task, &result) {
        Ok(updated) => {
            if json {
                let value = serde_json::to_string_pretty(&updated.frontmatter).expect("TaskFrontmatter serialization never fails");
                flowspec::styling::println!("{value}");
            } else {
                print_success(&format!("task {} is now `{}`", updated.id(), updated.frontmatter.status));
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}
