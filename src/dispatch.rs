//! Command Dispatcher & Role Router (C6): turns a command invocation into a
//! validated plan, and the post-execution `commit_transition` hook that
//! writes the result back to the Backlog Store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::backlog::{BacklogError, CreateOptions, Store, Task};
use crate::error::{DomainError, Finding};
use crate::workflow::{self, command_namespace, Artifact, ExecutionMode, Model, RoleKey};

#[derive(Debug)]
pub enum DispatchError {
    WorkflowInvalid(Vec<Finding>),
    UnknownCommand(String),
    Backlog(BacklogError),
    RoleMismatch {
        command_token: String,
        invoker_role: String,
        expected_namespace: String,
    },
    InvalidStateTransition {
        task_id: String,
        command_token: String,
        current_state: String,
        required_states: Vec<String>,
    },
    ApprovalRequired {
        command_token: String,
    },
    OutputArtifactMissing {
        path: String,
    },
    Io(std::io::Error),
}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        DispatchError::Io(e)
    }
}

impl From<BacklogError> for DispatchError {
    fn from(e: BacklogError) -> Self {
        DispatchError::Backlog(e)
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::WorkflowInvalid(findings) => {
                write!(f, "workflow document is invalid: {} finding(s)", findings.len())
            }
            DispatchError::UnknownCommand(cmd) => write!(f, "unknown command `{cmd}`"),
            DispatchError::Backlog(e) => write!(f, "{e}"),
            DispatchError::RoleMismatch { command_token, invoker_role, expected_namespace } => write!(
                f,
                "role `{invoker_role}` may not invoke `{command_token}`; it is namespaced to `{expected_namespace}`"
            ),
            DispatchError::InvalidStateTransition { task_id: _, command_token, current_state, required_states } => write!(
                f,
                "task is in `{current_state}`; the `{command_token}` command requires `[{}]`",
                required_states.join(", ")
            ),
            DispatchError::ApprovalRequired { command_token } => {
                write!(f, "`{command_token}` requires human approval; pass `--approved` once it has been given")
            }
            DispatchError::OutputArtifactMissing { path } => write!(f, "required output artifact `{path}` was not produced"),
            DispatchError::Io(e) => write!(f, "dispatch I/O error: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl DomainError for DispatchError {
    fn rule_id(&self) -> &'static str {
        match self {
            DispatchError::WorkflowInvalid(_) => "E001_WORKFLOW_INVALID",
            DispatchError::UnknownCommand(_) => "E200_UNKNOWN_COMMAND",
            DispatchError::InvalidStateTransition { .. } => "E201_INVALID_STATE_TRANSITION",
            DispatchError::RoleMismatch { .. } => "E202_ROLE_MISMATCH",
            DispatchError::ApprovalRequired { .. } => "E203_APPROVAL_REQUIRED",
            DispatchError::OutputArtifactMissing { .. } => "E204_OUTPUT_ARTIFACT_MISSING",
            DispatchError::Backlog(e) => e.rule_id(),
            DispatchError::Io(_) => "E205_DISPATCH_IO",
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            DispatchError::WorkflowInvalid(_) | DispatchError::UnknownCommand(_) => 2,
            DispatchError::InvalidStateTransition { .. } => 1,
            DispatchError::RoleMismatch { .. } | DispatchError::ApprovalRequired { .. } => 3,
            DispatchError::OutputArtifactMissing { .. } => 1,
            DispatchError::Backlog(e) => e.exit_code(),
            DispatchError::Io(_) => 2,
        }
    }

    fn remediation(&self) -> Option<String> {
        match self {
            DispatchError::InvalidStateTransition { command_token, required_states, .. } => Some(format!(
                "run a command that produces one of `{required_states:?}` before retrying `{command_token}`"
            )),
            DispatchError::ApprovalRequired { .. } => Some("retry with `--approved` once a human has signed off".to_string()),
            DispatchError::Backlog(e) => e.remediation(),
            _ => None,
        }
    }
}

/// Options threaded through [`Dispatcher::dispatch`] beyond the command
/// token, task id, and invoker role.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionSummary {
    pub from: String,
    pub to: String,
    pub via: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchPlan {
    pub agents: Vec<String>,
    pub execution_mode: ExecutionMode,
    pub output_artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub status: &'static str,
    pub plan: DispatchPlan,
    pub transition: TransitionSummary,
}

/// Content-hash cache for the built [`Model`] (§4.2 "Caching"): rebuilt only
/// when the workflow file's mtime or content hash changes. Held as a field
/// of [`Dispatcher`], never as global state.
struct ModelCache {
    hash: [u8; 32],
    mtime: SystemTime,
    model: Model,
}

/// Holds the `ModelCache` and a `Backlog` [`Store`] handle for one project.
/// The CLI's `dispatch`/`commit` subcommands construct one per invocation
/// from the discovered project root.
pub struct Dispatcher {
    workflow_path: PathBuf,
    schema: serde_json::Value,
    backlog: Store,
    cache: std::cell::RefCell<Option<ModelCache>>,
}

impl Dispatcher {
    pub fn new(project_root: &Path, workflow_path: PathBuf) -> Self {
        Dispatcher {
            workflow_path,
            schema: workflow::generate_schema(),
            backlog: Store::new(project_root.join("backlog")),
            cache: std::cell::RefCell::new(None),
        }
    }

    fn load_model(&self) -> Result<(), DispatchError> {
        let bytes = std::fs::read(&self.workflow_path)?;
        let mtime = std::fs::metadata(&self.workflow_path)?.modified()?;
        let hash: [u8; 32] = Sha256::digest(&bytes).into();

        if let Some(cached) = self.cache.borrow().as_ref() {
            if cached.hash == hash && cached.mtime == mtime {
                return Ok(());
            }
        }

        match workflow::load(&self.workflow_path, &self.schema) {
            workflow::LoadResult::Ok { model, .. } => {
                *self.cache.borrow_mut() = Some(ModelCache { hash, mtime, model });
                Ok(())
            }
            workflow::LoadResult::Err(findings) => Err(DispatchError::WorkflowInvalid(findings)),
        }
    }

    fn with_model<R>(&self, f: impl FnOnce(&Model) -> R) -> Result<R, DispatchError> {
        self.load_model()?;
        let cache = self.cache.borrow();
        let model = &cache.as_ref().expect("load_model populates the cache").model;
        Ok(f(model))
    }

    pub fn backlog(&self) -> &Store {
        &self.backlog
    }

    /// Turns a command invocation into a validated [`DispatchResult`],
    /// following the eight-step algorithm of §4.6. Pure over filesystem
    /// state except for task creation when `wf.creates_backlog_tasks` and
    /// the task doesn't exist yet - no task's status is mutated here;
    /// mutation happens in [`Dispatcher::commit_transition`].
    pub fn dispatch(
        &self,
        command_token: &str,
        task_id: &str,
        invoker_role: &str,
        options: &DispatchOptions,
    ) -> Result<DispatchResult, DispatchError> {
        self.load_model()?;
        let cache = self.cache.borrow();
        let model = &cache.as_ref().expect("load_model populates the cache").model;

        let workflow_name = model
            .get_workflow_name(command_token)
            .ok_or_else(|| DispatchError::UnknownCommand(command_token.to_string()))?
            .to_string();
        let wf = model.get_workflow_by_name(&workflow_name).expect("name came from the model");

        let task = match self.backlog.get(task_id)? {
            Some(t) => t,
            None if wf.creates_backlog_tasks => self.backlog.create_with_id(
                task_id,
                task_id,
                CreateOptions {
                    status: model.initial_state().map(str::to_string),
                    ..Default::default()
                },
            )?,
            None => return Err(BacklogError::TaskNotFound(task_id.to_string()).into()),
        };

        if let Some(namespace) = command_namespace(command_token) {
            if invoker_role != "all" && invoker_role != namespace {
                return Err(DispatchError::RoleMismatch {
                    command_token: command_token.to_string(),
                    invoker_role: invoker_role.to_string(),
                    expected_namespace: namespace.to_string(),
                });
            }
        }

        let current_state = task.frontmatter.status.clone();
        if !wf.input_states.iter().any(|s| s == &current_state) {
            return Err(DispatchError::InvalidStateTransition {
                task_id: task_id.to_string(),
                command_token: command_token.to_string(),
                current_state,
                required_states: wf.input_states.clone(),
            });
        }

        if wf.requires_human_approval && !options.approved {
            return Err(DispatchError::ApprovalRequired { command_token: command_token.to_string() });
        }

        let output_artifacts = model
            .document()
            .transitions
            .iter()
            .find(|t| t.from == current_state && t.to == wf.output_state && t.via.workflow_name() == Some(workflow_name.as_str()))
            .map(|t| t.output_artifacts.clone())
            .unwrap_or_default();

        Ok(DispatchResult {
            status: "OK",
            plan: DispatchPlan {
                agents: wf.agents.iter().map(|a| a.name().to_string()).collect(),
                execution_mode: wf.execution_mode.unwrap_or(ExecutionMode::Sequential),
                output_artifacts,
            },
            transition: TransitionSummary {
                from: current_state,
                to: wf.output_state.clone(),
                via: workflow_name,
            },
        })
    }

    /// Validates declared output artifacts (glob patterns, honoring
    /// `required`), writes `task.status = transition.to`, and appends an
    /// audit entry to the task's Notes section.
    pub fn commit_transition(
        &self,
        project_root: &Path,
        task_id: &str,
        result: &DispatchResult,
    ) -> Result<Task, DispatchError> {
        for artifact in &result.plan.output_artifacts {
            let pattern = project_root.join(&artifact.path);
            let matched = glob::glob(&pattern.to_string_lossy())
                .map(|paths| paths.filter_map(Result::ok).next().is_some())
                .unwrap_or(false);
            if artifact.required && !matched {
                return Err(DispatchError::OutputArtifactMissing { path: artifact.path.clone() });
            }
        }

        let note = format!("— transitioned {} → {} via {}", result.transition.from, result.transition.to, result.transition.via);

        let task = self.backlog.edit(
            task_id,
            crate::backlog::EditMutations {
                status: Some(result.transition.to.clone()),
                notes_append: Some(note),
                ..Default::default()
            },
        )?;
        Ok(task)
    }

    /// All command tokens currently legal for `task_id`'s state, filtered by
    /// `invoker_role` - used by the CLI to suggest a next step on
    /// `E201_INVALID_STATE_TRANSITION`.
    pub fn legal_commands_for(&self, task_id: &str, invoker_role: &RoleKey) -> Result<Vec<String>, DispatchError> {
        let Some(task) = self.backlog.get(task_id)? else {
            return Err(BacklogError::TaskNotFound(task_id.to_string()).into());
        };
        self.with_model(|model| {
            model
                .legal_commands_for_role(&task.frontmatter.status, invoker_role)
                .into_iter()
                .map(str::to_string)
                .collect()
        })
    }
}

/// Tally of dispatch outcomes by `rule_id`, used by `flow debug diagnostic`.
pub fn summarize_outcomes(results: &[Result<DispatchResult, DispatchError>]) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for r in results {
        let key = match r {
            Ok(_) => "OK",
            Err(e) => e.rule_id(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const WORKFLOW_YAML: &str = r#"
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

    fn setup() -> (tempfile::TempDir, Dispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let workflow_path = dir.path().join("flowspec_workflow.yml");
        fs::write(&workflow_path, WORKFLOW_YAML).unwrap();
        let dispatcher = Dispatcher::new(dir.path(), workflow_path);
        (dir, dispatcher)
    }

    #[test]
    fn s1_happy_path_dispatch() {
        let (dir, dispatcher) = setup();
        dispatcher
            .backlog()
            .create(
                "task-1",
                CreateOptions { status: Some("To Do".to_string()), ..Default::default() },
            )
            .unwrap();

        let result = dispatcher
            .dispatch("/flow:specify", "task-1", "all", &DispatchOptions::default())
            .unwrap();
        assert_eq!(result.status, "OK");
        assert_eq!(result.transition.from, "To Do");
        assert_eq!(result.transition.to, "Specified");
        assert_eq!(result.transition.via, "specify");

        let task = dispatcher.commit_transition(dir.path(), "task-1", &result).unwrap();
        assert_eq!(task.frontmatter.status, "Specified");
        assert!(task.notes.starts_with("— transitioned To Do → Specified via specify"));
    }

    #[test]
    fn s2_invalid_transition_reports_required_states() {
        let (_dir, dispatcher) = setup();
        dispatcher
            .backlog()
            .create(
                "task-2",
                CreateOptions { status: Some("Specified".to_string()), ..Default::default() },
            )
            .unwrap();

        let err = dispatcher
            .dispatch("/flow:specify", "task-2", "all", &DispatchOptions::default())
            .unwrap_err();
        assert_eq!(err.rule_id(), "E201_INVALID_STATE_TRANSITION");
        assert!(err.to_string().contains("task is in `Specified`"));
        assert!(err.to_string().contains("/flow:specify"));
    }

    #[test]
    fn unknown_command_is_e200() {
        let (_dir, dispatcher) = setup();
        let err = dispatcher
            .dispatch("/flow:nope", "task-1", "all", &DispatchOptions::default())
            .unwrap_err();
        assert_eq!(err.rule_id(), "E200_UNKNOWN_COMMAND");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn task_not_found_without_creates_backlog_tasks() {
        let (_dir, dispatcher) = setup();
        let err = dispatcher
            .dispatch("/flow:specify", "task-999", "all", &DispatchOptions::default())
            .unwrap_err();
        assert_eq!(err.rule_id(), "E300_TASK_NOT_FOUND");
    }

    #[test]
    fn role_mismatch_for_namespaced_command() {
        let dir = tempfile::tempdir().unwrap();
        let workflow_path = dir.path().join("flowspec_workflow.yml");
        fs::write(
            &workflow_path,
            r#"
version: "1.0"
states: [To Do, Assessed]
workflows:
  assess:
    command: /pm:assess
    agents: ["@pm"]
    input_states: [To Do]
    output_state: Assessed
transitions:
  - from: To Do
    to: Assessed
    via: assess
"#,
        )
        .unwrap();
        let dispatcher = Dispatcher::new(dir.path(), workflow_path);
        dispatcher
            .backlog()
            .create("task-1", CreateOptions { status: Some("To Do".to_string()), ..Default::default() })
            .unwrap();

        let err = dispatcher
            .dispatch("/pm:assess", "task-1", "dev", &DispatchOptions::default())
            .unwrap_err();
        assert_eq!(err.rule_id(), "E202_ROLE_MISMATCH");
    }

    #[test]
    fn approval_required_halts_without_approved_flag() {
        let dir = tempfile::tempdir().unwrap();
        let workflow_path = dir.path().join("flowspec_workflow.yml");
        fs::write(
            &workflow_path,
            r#"
version: "1.0"
states: [To Do, Deployed]
workflows:
  operate:
    command: /flow:operate
    agents: ["@ops"]
    input_states: [To Do]
    output_state: Deployed
    requires_human_approval: true
transitions:
  - from: To Do
    to: Deployed
    via: operate
"#,
        )
        .unwrap();
        let dispatcher = Dispatcher::new(dir.path(), workflow_path);
        dispatcher
            .backlog()
            .create("task-1", CreateOptions { status: Some("To Do".to_string()), ..Default::default() })
            .unwrap();

        let err = dispatcher
            .dispatch("/flow:operate", "task-1", "all", &DispatchOptions::default())
            .unwrap_err();
        assert_eq!(err.rule_id(), "E203_APPROVAL_REQUIRED");

        let ok = dispatcher
            .dispatch("/flow:operate", "task-1", "all", &DispatchOptions { approved: true })
            .unwrap();
        assert_eq!(ok.status, "OK");
    }

    #[test]
    fn model_cache_reused_when_file_unchanged() {
        let (_dir, dispatcher) = setup();
        dispatcher
            .backlog()
            .create("task-1", CreateOptions { status: Some("To Do".to_string()), ..Default::default() })
            .unwrap();
        dispatcher.load_model().unwrap();
        let first_hash = dispatcher.cache.borrow().as_ref().unwrap().hash;
        dispatcher.load_model().unwrap();
        let second_hash = dispatcher.cache.borrow().as_ref().unwrap().hash;
        assert_eq!(first_hash, second_hash);
    }

    #[test]
    fn p3_ok_dispatch_is_always_a_valid_transition() {
        let (dir, dispatcher) = setup();
        dispatcher
            .backlog()
            .create("task-1", CreateOptions { status: Some("To Do".to_string()), ..Default::default() })
            .unwrap();
        let result = dispatcher
            .dispatch("/flow:specify", "task-1", "all", &DispatchOptions::default())
            .unwrap();
        let valid = dispatcher
            .with_model(|m| m.is_valid_transition(&result.transition.from, &result.transition.to, &result.transition.via))
            .unwrap();
        assert!(valid);
        let _ = dir;
    }
}
