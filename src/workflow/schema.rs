//! Workflow document validation: structural schema checks plus semantic
//! analysis.
//!
//! `validate_schema` checks a raw YAML document against the JSON Schema
//! shipped at `memory/flowspec_workflow.schema.json` (generated from
//! [`super::document`]'s types via `schemars` - see `flow debug schema`).
//! `validate_semantics` runs the semantic passes over an already-typed
//! [`WorkflowDocument`]. `load` combines file I/O, YAML parsing, schema
//! validation, and semantic validation into the one entry point most
//! callers want.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use super::document::{StateDef, WorkflowDocument};
use super::model::Model;
use crate::error::Finding;

/// The canonical (`flowspec_workflow.yml`) and legacy-alias
/// (`speckit_workflow.yml`) file names accepted for the workflow document.
pub const CANONICAL_FILENAME: &str = "flowspec_workflow.yml";
pub const LEGACY_FILENAME: &str = "speckit_workflow.yml";

/// Normalizes a BOM and CRLF/CR line endings before parsing: a workflow
/// document with a BOM or CRLF line endings is accepted, not rejected.
pub fn normalize_source(raw: &str) -> String {
    let without_bom = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    without_bom.replace("\r\n", "\n").replace('\r', "\n")
}

/// Structural validation against the JSON Schema (Draft-07) derived from
/// [`super::document::WorkflowDocument`].
///
/// `schema` is the compiled schema document (see
/// [`crate::workflow::generate_schema`]); `doc_value` is the workflow
/// document re-serialized to `serde_json::Value` for schema-level checking
/// (schema validation runs against JSON Value, not the typed struct,
/// because it must also report on documents that fail to deserialize into
/// the typed shape at all).
pub fn validate_schema(doc_value: &serde_json::Value, schema: &serde_json::Value) -> Vec<Finding> {
    let compiled = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            // A malformed *schema* document is a programmer error, not user
            // data - but we still report it as a Finding so `load()` keeps
            // its "never raises on user-data errors" contract; the caller
            // distinguishes this from a semantic problem via the rule_id.
            return vec![Finding::error(
                "/",
                "E003_SCHEMA_INVALID",
                format!("internal schema is invalid: {e}"),
            )];
        }
    };

    compiled
        .iter_errors(doc_value)
        .map(|e| {
            Finding::error(
                format!("/{}", e.instance_path),
                "E004_SCHEMA_VIOLATION",
                e.to_string(),
            )
        })
        .collect()
}

/// Semantic validation over a parsed [`WorkflowDocument`]: reference
/// resolution, reachability, cycle detection, role conflict detection, and
/// unused-agent warnings.
pub fn validate_semantics(doc: &WorkflowDocument) -> Vec<Finding> {
    let mut findings = Vec::new();

    if doc.states.is_empty() {
        findings.push(Finding::error("/states", "E100_NO_STATES", "states must not be empty"));
        return findings;
    }

    let state_names: HashSet<&str> = doc.states.iter().map(StateDef::name).collect();
    check_duplicate_states(doc, &mut findings);
    check_workflow_references(doc, &state_names, &mut findings);
    check_transition_references(doc, &state_names, &mut findings);
    check_reachability(doc, &state_names, &mut findings);
    check_cycles_bypass_workflows(doc, &mut findings);
    check_agent_loop_cross_references(doc, &mut findings);
    check_role_command_conflicts(doc, &mut findings);

    findings
}

fn check_duplicate_states(doc: &WorkflowDocument, findings: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    for (i, s) in doc.states.iter().enumerate() {
        if !seen.insert(s.name()) {
            findings.push(Finding::error(
                format!("/states/{i}"),
                "E101_DUPLICATE_STATE",
                format!("state `{}` is declared more than once", s.name()),
            ));
        }
    }
}

fn check_workflow_references(
    doc: &WorkflowDocument,
    state_names: &HashSet<&str>,
    findings: &mut Vec<Finding>,
) {
    for (name, wf) in &doc.workflows {
        for (i, s) in wf.input_states.iter().enumerate() {
            if !state_names.contains(s.as_str()) {
                findings.push(Finding::error(
                    format!("/workflows/{name}/input_states/{i}"),
                    "E102_UNKNOWN_STATE_REFERENCE",
                    format!("workflow `{name}` references undefined state `{s}`"),
                ));
            }
        }
        if !state_names.contains(wf.output_state.as_str()) {
            findings.push(Finding::error(
                format!("/workflows/{name}/output_state"),
                "E102_UNKNOWN_STATE_REFERENCE",
                format!(
                    "workflow `{name}` references undefined output_state `{}`",
                    wf.output_state
                ),
            ));
        }
    }
}

fn check_transition_references(
    doc: &WorkflowDocument,
    state_names: &HashSet<&str>,
    findings: &mut Vec<Finding>,
) {
    for (i, t) in doc.transitions.iter().enumerate() {
        if !state_names.contains(t.from.as_str()) {
            findings.push(Finding::error(
                format!("/transitions/{i}/from"),
                "E102_UNKNOWN_STATE_REFERENCE",
                format!("transition references undefined state `{}`", t.from),
            ));
        }
        if !state_names.contains(t.to.as_str()) {
            findings.push(Finding::error(
                format!("/transitions/{i}/to"),
                "E102_UNKNOWN_STATE_REFERENCE",
                format!("transition references undefined state `{}`", t.to),
            ));
        }
        if let Some(wf_name) = t.via.workflow_name() {
            if !doc.workflows.contains_key(wf_name) {
                findings.push(Finding::error(
                    format!("/transitions/{i}/via"),
                    "E103_UNKNOWN_WORKFLOW_REFERENCE",
                    format!("transition references undefined workflow `{wf_name}`"),
                ));
            }
        }
    }
}

fn check_reachability(doc: &WorkflowDocument, state_names: &HashSet<&str>, findings: &mut Vec<Finding>) {
    let Some(initial) = doc.initial_state() else {
        return;
    };

    let mut adjacency: std::collections::HashMap<&str, Vec<&str>> = std::collections::HashMap::new();
    for t in &doc.transitions {
        if state_names.contains(t.from.as_str()) && state_names.contains(t.to.as_str()) {
            adjacency.entry(t.from.as_str()).or_default().push(t.to.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(initial);
    queue.push_back(initial);
    while let Some(s) = queue.pop_front() {
        for &next in adjacency.get(s).into_iter().flatten() {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    for (i, s) in doc.states.iter().enumerate() {
        if !visited.contains(s.name()) {
            findings.push(Finding::error(
                format!("/states/{i}"),
                "E101_UNREACHABLE_STATE",
                format!("state `{}` is unreachable from the initial state `{initial}`", s.name()),
            ));
        }
    }
}

/// Flags any closed transition chain that never passes through a
/// workflow-typed `via`: a cycle composed entirely of
/// `reset`/`init`/`complete` special transitions would let a task cycle
/// states without ever going through a reviewed phase.
fn check_cycles_bypass_workflows(doc: &WorkflowDocument, findings: &mut Vec<Finding>) {
    let mut adjacency: std::collections::HashMap<&str, Vec<(&str, bool)>> = std::collections::HashMap::new();
    for t in &doc.transitions {
        let via_workflow = t.via.workflow_name().is_some();
        adjacency
            .entry(t.from.as_str())
            .or_default()
            .push((t.to.as_str(), via_workflow));
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let mut mark: std::collections::HashMap<&str, Mark> = doc
        .states
        .iter()
        .map(|s| (s.name(), Mark::Unvisited))
        .collect();

    fn dfs<'a>(
        node: &'a str,
        adjacency: &std::collections::HashMap<&'a str, Vec<(&'a str, bool)>>,
        mark: &mut std::collections::HashMap<&'a str, Mark>,
        stack: &mut Vec<(&'a str, bool)>,
        findings: &mut Vec<Finding>,
    ) {
        mark.insert(node, Mark::InStack);
        for &(next, via_workflow) in adjacency.get(node).into_iter().flatten() {
            stack.push((next, via_workflow));
            match mark.get(next).copied().unwrap_or(Mark::Unvisited) {
                Mark::Unvisited => dfs(next, adjacency, mark, stack, findings),
                Mark::InStack => {
                    if let Some(pos) = stack.iter().position(|&(s, _)| s == next) {
                        let cycle_has_workflow = stack[pos..].iter().any(|&(_, w)| w);
                        if !cycle_has_workflow {
                            let path: Vec<&str> = stack[pos..].iter().map(|&(s, _)| s).collect();
                            findings.push(Finding::error(
                                "/transitions",
                                "E104_WORKFLOWLESS_CYCLE",
                                format!(
                                    "transition cycle `{}` never passes through a workflow",
                                    path.join(" -> ")
                                ),
                            ));
                        }
                    }
                }
                Mark::Done => {}
            }
            stack.pop();
        }
        mark.insert(node, Mark::Done);
    }

    let nodes: Vec<&str> = doc.states.iter().map(StateDef::name).collect();
    for node in nodes {
        if mark.get(node).copied() == Some(Mark::Unvisited) {
            dfs(node, &adjacency, &mut mark, &mut Vec::new(), findings);
        }
    }
}

fn check_agent_loop_cross_references(doc: &WorkflowDocument, findings: &mut Vec<Finding>) {
    let Some(loops) = &doc.agent_loops else {
        return;
    };
    let loop_agents: HashSet<&str> = loops
        .inner
        .agents
        .iter()
        .chain(loops.outer.agents.iter())
        .map(String::as_str)
        .collect();

    let mut used_agents: HashSet<&str> = HashSet::new();
    for (name, wf) in &doc.workflows {
        for agent in &wf.agents {
            used_agents.insert(agent.name());
            if !loop_agents.is_empty() && !loop_agents.contains(agent.name()) {
                findings.push(Finding::error(
                    format!("/workflows/{name}/agents"),
                    "E105_AGENT_NOT_IN_LOOP",
                    format!("agent `{}` is used by workflow `{name}` but not declared in agent_loops", agent.name()),
                ));
            }
        }
    }

    for agent in &loop_agents {
        if !used_agents.contains(agent) {
            findings.push(Finding::warning(
                "/agent_loops",
                "W001_UNUSED_AGENT",
                format!("agent `{agent}` is declared in agent_loops but used by no workflow"),
            ));
        }
    }
}

fn check_role_command_conflicts(doc: &WorkflowDocument, findings: &mut Vec<Finding>) {
    let mut command_role: std::collections::HashMap<&str, (&crate::workflow::document::RoleKey, &Vec<String>)> =
        std::collections::HashMap::new();

    for (role_key, role) in &doc.roles {
        for command in &role.commands {
            if let Some((other_role, other_agents)) = command_role.get(command.as_str()) {
                if *other_agents != &role.agents {
                    findings.push(Finding::error(
                        "/roles",
                        "E106_ROLE_COMMAND_CONFLICT",
                        format!(
                            "command `{command}` appears under role `{role_key}` and `{other_role}` with conflicting agent lists"
                        ),
                    ));
                }
            } else {
                command_role.insert(command, (role_key, &role.agents));
            }
        }
    }
}

/// Load result: a validated [`Model`] plus any warnings, or the findings
/// that blocked construction.
pub enum LoadResult {
    Ok { model: Model, warnings: Vec<Finding> },
    Err(Vec<Finding>),
}

/// Convenience combining file I/O, YAML parsing, schema validation, and
/// semantic validation.
pub fn load(path: &Path, schema: &serde_json::Value) -> LoadResult {
    let raw = match std::fs::read_to_string(path) {
        Ok(r) => r,
        Err(e) => {
            return LoadResult::Err(vec![Finding::error(
                "/",
                "E001_FILE_NOT_FOUND",
                format!("could not read `{}`: {e}", path.display()),
            )]);
        }
    };

    let normalized = normalize_source(&raw);

    let doc_value: serde_json::Value = match serde_yaml::from_str::<serde_yaml::Value>(&normalized)
        .and_then(|v| serde_yaml::from_value(v))
    {
        Ok(v) => v,
        Err(e) => {
            return LoadResult::Err(vec![Finding::error(
                "/",
                "E002_YAML_PARSE",
                format!("failed to parse YAML: {e}"),
            )]);
        }
    };

    let mut findings = validate_schema(&doc_value, schema);
    if crate::error::has_errors(&findings) {
        return LoadResult::Err(findings);
    }

    let doc: WorkflowDocument = match serde_json::from_value(doc_value) {
        Ok(d) => d,
        Err(e) => {
            findings.push(Finding::error("/", "E002_YAML_PARSE", format!("failed to build workflow document: {e}")));
            return LoadResult::Err(findings);
        }
    };

    let semantic_findings = validate_semantics(&doc);
    findings.extend(semantic_findings);

    if crate::error::has_errors(&findings) {
        return LoadResult::Err(findings);
    }

    let warnings = findings;
    let model = Model::build(doc);
    LoadResult::Ok { model, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_doc_yaml() -> &'static str {
        r#"
version: "1.0"
states:
  - To Do
  - Specified
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
"#
    }

    fn parse(yaml: &str) -> WorkflowDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn semantics_pass_for_minimal_valid_document() {
        let doc = parse(minimal_doc_yaml());
        let findings = validate_semantics(&doc);
        assert!(!crate::error::has_errors(&findings), "{findings:?}");
    }

    #[test]
    fn s6_unreachable_state_is_flagged() {
        let yaml = r#"
version: "1.0"
states: [A, B, C, D]
workflows:
  w1:
    command: /flow:w1
    agents: ["@a"]
    input_states: [A]
    output_state: B
  w2:
    command: /flow:w2
    agents: ["@a"]
    input_states: [B]
    output_state: C
transitions:
  - from: A
    to: B
    via: w1
  - from: B
    to: C
    via: w2
"#;
        let doc = parse(yaml);
        let findings = validate_semantics(&doc);
        let unreachable = findings
            .iter()
            .find(|f| f.rule_id == "E101_UNREACHABLE_STATE")
            .expect("expected unreachable-state finding");
        assert_eq!(unreachable.path, "/states/3");
        assert!(unreachable.message.contains('D'));
    }

    #[test]
    fn empty_states_is_e100() {
        let doc = WorkflowDocument {
            version: "1.0".parse().unwrap(),
            states: vec![],
            workflows: Default::default(),
            transitions: vec![],
            agent_loops: None,
            roles: Default::default(),
            telemetry: Default::default(),
            metadata: Default::default(),
        };
        let findings = validate_semantics(&doc);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "E100_NO_STATES");
    }

    #[test]
    fn unknown_state_reference_in_workflow() {
        let yaml = r#"
version: "1.0"
states: [A, B]
workflows:
  w1:
    command: /flow:w1
    agents: ["@a"]
    input_states: [A]
    output_state: Nope
transitions:
  - from: A
    to: B
    via: w1
"#;
        let doc = parse(yaml);
        let findings = validate_semantics(&doc);
        assert!(findings.iter().any(|f| f.rule_id == "E102_UNKNOWN_STATE_REFERENCE"));
    }

    #[test]
    fn cycle_without_workflow_is_flagged() {
        let yaml = r#"
version: "1.0"
states: [A, B]
workflows: {}
transitions:
  - from: A
    to: B
    via: reset
  - from: B
    to: A
    via: reset
"#;
        let doc = parse(yaml);
        let findings = validate_semantics(&doc);
        assert!(findings.iter().any(|f| f.rule_id == "E104_WORKFLOWLESS_CYCLE"));
    }

    #[test]
    fn normalize_strips_bom_and_crlf() {
        let raw = "\u{feff}version: \"1.0\"\r\nstates:\r\n  - A\r\n";
        let normalized = normalize_source(raw);
        assert!(!normalized.starts_with('\u{feff}'));
        assert!(!normalized.contains('\r'));
    }
}
