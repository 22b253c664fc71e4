//! `flow debug {schema,diagnostic}`: maintenance commands, not part of the
//! day-to-day dispatch loop.

use std::fs;
use std::path::Path;

use flowspec::backlog::{ListFilters, Store};
use flowspec::materialize::{detect_installed_agents, AGENT_PROFILES};
use flowspec::workflow::{self, LoadResult};
use minijinja::{context, Environment};

use super::print_success;

/// Markdown template for `flow debug diagnostic`, in the teacher's
/// `diagnostic.rs` `REPORT_TEMPLATE` style: the structure is visible in the
/// template itself, and `format_report` only fills in variables.
const REPORT_TEMPLATE: &str = r#"# flowspec diagnostic

- project root: `{{ project_root }}`
- workflow file: `{{ workflow_path }}`
- workflow status: {{ workflow_status }}
{%- for finding in workflow_findings %}
  - {{ finding }}
{%- endfor %}
- active backlog tasks: {{ backlog_summary }}
- detected agents: {{ detected_agents }}
- flow version: {{ flow_version }}
{%- if log_tail %}

## recent log output

```
{{ log_tail }}
```
{%- endif %}
"#;

/// `flow debug schema`: regenerates the shipped JSON Schema for the
/// workflow document under `memory/`, so it stays in lockstep with
/// `workflow::document::WorkflowDocument`.
pub fn schema(project_root: &Path) -> i32 {
    let schema = workflow::generate_schema();
    let rendered = serde_json::to_string_pretty(&schema).expect("schema serialization never fails");

    let out_dir = project_root.join("memory");
    if let Err(err) = fs::create_dir_all(&out_dir) {
        flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
        return 2;
    }
    let out_path = out_dir.join("flowspec_workflow.schema.json");
    if let Err(err) = fs::write(&out_path, rendered) {
        flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
        return 2;
    }
    print_success(&format!("wrote {}", out_path.display()));
    0
}

/// `flow debug diagnostic`: a human-readable snapshot of project state,
/// useful when filing an issue - workflow validity, backlog counts,
/// resolved agent profiles.
pub fn diagnostic(project_root: &Path) -> i32 {
    let workflow_path = super::project::workflow_path(project_root);
    let schema = workflow::generate_schema();

    let (workflow_status, workflow_findings) = match workflow::load(&workflow_path, &schema) {
        LoadResult::Ok { warnings, .. } => (format!("valid ({} warnings)", warnings.len()), Vec::new()),
        LoadResult::Err(findings) => (
            format!("INVALID ({} findings)", findings.len()),
            findings.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
        ),
    };

    let store = Store::new(project_root.join("backlog"));
    let backlog_summary = match store.list(ListFilters::default()) {
        Ok(tasks) => tasks.len().to_string(),
        Err(err) => format!("error ({err})"),
    };

    let installed = detect_installed_agents(AGENT_PROFILES);
    let detected_agents = if installed.is_empty() {
        "none".to_string()
    } else {
        installed.iter().map(|p| p.display_name).collect::<Vec<_>>().join(", ")
    };

    let log_tail = crate::verbose_log::contents();

    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE).expect("REPORT_TEMPLATE is valid minijinja syntax");
    let template = env.get_template("report").expect("just added");
    let report = template
        .render(context! {
            project_root => project_root.display().to_string(),
            workflow_path => workflow_path.display().to_string(),
            workflow_status,
            workflow_findings,
            backlog_summary,
            detected_agents,
            flow_version => crate::cli::version_str(),
            log_tail,
        })
        .expect("context matches the template's variables");

    let out_dir = project_root.join(".flowspec");
    if let Err(err) = fs::create_dir_all(&out_dir) {
        flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
        return 2;
    }
    let out_path = out_dir.join("diagnostic.md");
    if let Err(err) = fs::write(&out_path, &report) {
        flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
        return 2;
    }

    print_success(&format!("wrote {}", out_path.display()));
    flowspec::styling::println!("{report}");
    0
}
