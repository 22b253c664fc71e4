//! Workflow schema validation and the workflow model/query API: parsing and
//! structural+semantic validation of a workflow document, and an indexed
//! view over the result for querying legal commands and transitions.

pub mod document;
pub mod model;
pub mod schema;

pub use document::{
    AgentLoopGroup, AgentLoops, AgentRef, Artifact, ExecutionMode, Role, RoleKey, SpecialTransition,
    StateDef, Telemetry, Transition, TransitionVia, ValidationMode, Workflow, WorkflowDocument,
    WorkflowVersion,
};
pub use model::{command_namespace, Model};
pub use schema::{load, normalize_source, validate_schema, validate_semantics, LoadResult, CANONICAL_FILENAME, LEGACY_FILENAME};

/// Generates the JSON Schema for [`WorkflowDocument`], shipped alongside the
/// tool and backing the `flow debug schema` maintenance command.
pub fn generate_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(WorkflowDocument);
    serde_json::to_value(schema).expect("schemars output is always valid JSON")
}

/// The default workflow document written by `flow init`: the illustrative
/// `To Do -> ... -> Done` state diagram from the dispatcher design,
/// expressed as ordinary data rather than special-cased in code.
pub const DEFAULT_WORKFLOW_YAML: &str = include_str!("../../templates/flowspec_workflow.default.yml");
