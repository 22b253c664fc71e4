//! `flow backlog task {create,edit,list,search,archive,archive-many}`:
//! thin wrappers over [`flowspec::backlog::Store`].

use std::path::Path;
use std::str::FromStr;

use flowspec::backlog::{ArchiveFilter, CreateOptions, EditMutations, ListFilters, Priority, Store, Task, TaskFrontmatter};
use flowspec::styling::{self, ERROR, ERROR_EMOJI};

use super::{print_hint, print_success, report_domain_error};

fn store(project_root: &Path) -> Store {
    Store::new(project_root.join("backlog"))
}

/// Prints a CLI argument error (not a [`flowspec::error::DomainError`] -
/// these never reach the library) and returns the "invalid field" exit code.
fn invalid_field(message: &str) -> i32 {
    styling::eprintln!("{ERROR_EMOJI} {ERROR}{message}{ERROR:#}");
    2
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    Priority::from_str(raw).map_err(|_| format!("unknown priority `{raw}` (expected low, medium, high, or critical)"))
}

fn parse_done_before(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp `{raw}`: {e}"))
}

#[derive(serde::Serialize)]
struct AcView<'a> {
    text: &'a str,
    checked: bool,
}

#[derive(serde::Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    frontmatter: &'a TaskFrontmatter,
    description: &'a str,
    acceptance_criteria: Vec<AcView<'a>>,
    notes: &'a str,
    ac_progress: Option<(usize, usize)>,
}

fn view(task: &Task) -> TaskView<'_> {
    TaskView {
        frontmatter: &task.frontmatter,
        description: &task.description,
        acceptance_criteria: task
            .acceptance_criteria
            .iter()
            .map(|ac| AcView { text: &ac.text, checked: ac.checked })
            .collect(),
        notes: &task.notes,
        ac_progress: task.ac_progress(),
    }
}

fn print_task_json(task: &Task) {
    let json = serde_json::to_string_pretty(&view(task)).expect("TaskView serialization never fails");
    styling::println!("{json}");
}

fn print_task_human(task: &Task) {
    let progress = match task.ac_progress() {
        Some((done, total)) => format!(" — {done}/{total} AC"),
        None => String::new(),
    };
    print_success(&format!(
        "{} [{}] {}{progress}",
        task.id(),
        task.frontmatter.status,
        task.frontmatter.title
    ));
}

#[allow(clippy::too_many_arguments)]
pub fn create(
    project_root: &Path,
    title: &str,
    description: Option<String>,
    acceptance_criteria: Vec<String>,
    labels: Vec<String>,
    priority: Option<String>,
    status: Option<String>,
    assignee: Vec<String>,
    dependencies: Vec<String>,
    json: bool,
) -> i32 {
    let priority = match priority.as_deref().map(parse_priority).transpose() {
        Ok(p) => p.unwrap_or_default(),
        Err(message) => return invalid_field(&message),
    };

    let opts = CreateOptions {
        description: description.unwrap_or_default(),
        acceptance_criteria,
        labels,
        priority,
        status,
        assignee,
        dependencies,
    };

    match store(project_root).create(title, opts) {
        Ok(task) => {
            if json {
                print_task_json(&task);
            } else {
                print_task_human(&task);
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    project_root: &Path,
    id: &str,
    status: Option<String>,
    priority: Option<String>,
    assignee: Option<Vec<String>>,
    labels: Option<Vec<String>>,
    note: Option<String>,
    check_ac: Vec<usize>,
    uncheck_ac: Vec<usize>,
    json: bool,
) -> i32 {
    let priority = match priority.as_deref().map(parse_priority).transpose() {
        Ok(p) => p,
        Err(message) => return invalid_field(&message),
    };

    let mutations = EditMutations {
        status,
        priority,
        assignee,
        labels,
        notes_append: note,
        check_ac,
        uncheck_ac,
    };

    match store(project_root).edit(id, mutations) {
        Ok(task) => {
            if json {
                print_task_json(&task);
            } else {
                print_task_human(&task);
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}

pub fn list(project_root: &Path, status: Option<String>, label: Option<String>, assignee: Option<String>, role: Option<String>, json: bool) -> i32 {
    let filters = ListFilters { status, label, assignee, role };
    match store(project_root).list(filters) {
        Ok(tasks) => {
            if json {
                let views: Vec<_> = tasks.iter().map(view).collect();
                styling::println!("{}", serde_json::to_string_pretty(&views).expect("Vec<TaskView> serialization never fails"));
            } else if tasks.is_empty() {
                print_hint("no tasks match");
            } else {
                for task in &tasks {
                    print_task_human(task);
                }
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}

pub fn search(project_root: &Path, query: &str, json: bool) -> i32 {
    match store(project_root).search(query) {
        Ok(results) => {
            if json {
                #[derive(serde::Serialize)]
                struct ScoredView<'a> {
                    #[serde(flatten)]
                    task: TaskView<'a>,
                    score: u8,
                }
                let views: Vec<_> = results.iter().map(|(t, score)| ScoredView { task: view(t), score: *score }).collect();
                styling::println!("{}", serde_json::to_string_pretty(&views).expect("search results serialize"));
            } else if results.is_empty() {
                print_hint(&format!("no tasks match `{query}`"));
            } else {
                for (task, score) in &results {
                    print_task_human(task);
                    print_hint(&format!("  score: {score}"));
                }
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}

pub fn archive(project_root: &Path, id: &str, json: bool) -> i32 {
    match store(project_root).archive(id) {
        Ok(task) => {
            if json {
                print_task_json(&task);
            } else {
                print_success(&format!("archived {}", task.id()));
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}

pub fn archive_many(project_root: &Path, status: Option<String>, done_before: Option<String>, json: bool) -> i32 {
    let done_before = match done_before.as_deref().map(parse_done_before).transpose() {
        Ok(d) => d,
        Err(message) => return invalid_field(&message),
    };

    match store(project_root).archive_many(ArchiveFilter { status, done_before }) {
        Ok(ids) => {
            if json {
                styling::println!("{}", serde_json::to_string_pretty(&ids).expect("Vec<String> serialization never fails"));
            } else if ids.is_empty() {
                print_hint("no tasks matched the archive filter");
            } else {
                print_success(&format!("archived {}: {}", ids.len(), ids.join(", ")));
            }
            0
        }
        Err(err) => report_domain_error(&err, json),
    }
}
