//! Workflow model and query API.
//!
//! An immutable, indexed view over a validated [`WorkflowDocument`]. Built
//! once per process run and cached by content hash by the caller (the
//! command dispatcher) - the model itself carries no knowledge of caching.

use indexmap::{IndexMap, IndexSet};

use super::document::{RoleKey, Transition, Workflow, WorkflowDocument};

#[derive(Debug, Clone)]
pub struct Model {
    document: WorkflowDocument,
    states: IndexSet<String>,
    by_from_state: IndexMap<String, Vec<usize>>,
    by_command: IndexMap<String, String>,
    by_role: IndexMap<RoleKey, (Vec<String>, Vec<String>)>,
}

impl Model {
    /// Builds the derived indices from a document already known to be
    /// semantically valid (callers go through
    /// [`super::schema::load`]/[`super::schema::validate_semantics`] first).
    pub fn build(document: WorkflowDocument) -> Self {
        let states: IndexSet<String> = document.states.iter().map(|s| s.name().to_string()).collect();

        let mut by_from_state: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (i, t) in document.transitions.iter().enumerate() {
            by_from_state.entry(t.from.clone()).or_default().push(i);
        }

        let mut by_command: IndexMap<String, String> = IndexMap::new();
        for (name, wf) in &document.workflows {
            by_command.insert(wf.command.clone(), name.clone());
        }

        let by_role: IndexMap<RoleKey, (Vec<String>, Vec<String>)> = document
            .roles
            .iter()
            .map(|(k, r)| (k.clone(), (r.commands.clone(), r.agents.clone())))
            .collect();

        Model {
            document,
            states,
            by_from_state,
            by_command,
            by_role,
        }
    }

    pub fn document(&self) -> &WorkflowDocument {
        &self.document
    }

    pub fn initial_state(&self) -> Option<&str> {
        self.states.first().map(String::as_str)
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    /// Resolve a slash command token to its [`Workflow`].
    pub fn get_workflow(&self, command_token: &str) -> Option<&Workflow> {
        let name = self.by_command.get(command_token)?;
        self.document.workflows.get(name)
    }

    /// The workflow's name (the key it's declared under), given its command
    /// token.
    pub fn get_workflow_name(&self, command_token: &str) -> Option<&str> {
        self.by_command.get(command_token).map(String::as_str)
    }

    pub fn get_workflow_by_name(&self, name: &str) -> Option<&Workflow> {
        self.document.workflows.get(name)
    }

    pub fn get_agents<'a>(&'a self, workflow_name: &str) -> Vec<&'a super::document::AgentRef> {
        self.document
            .workflows
            .get(workflow_name)
            .map(|wf| wf.agents.iter().collect())
            .unwrap_or_default()
    }

    /// `Workflow.output_state` iff a transition `from -> ? via workflow`
    /// actually exists and lands on it.
    pub fn get_next_state(&self, from_state: &str, via_workflow: &str) -> Option<&str> {
        let wf = self.document.workflows.get(via_workflow)?;
        let exists = self.transitions_from(from_state).iter().any(|t| {
            t.via.workflow_name() == Some(via_workflow) && t.to == wf.output_state
        });
        exists.then_some(wf.output_state.as_str())
    }

    pub fn is_valid_transition(&self, from_state: &str, to_state: &str, via_workflow: &str) -> bool {
        self.transitions_from(from_state)
            .iter()
            .any(|t| t.via.workflow_name() == Some(via_workflow) && t.to == to_state)
    }

    /// All command tokens legal for a task currently in `current_state`:
    /// every workflow whose `input_states` contains it.
    pub fn legal_commands(&self, current_state: &str) -> Vec<&str> {
        self.document
            .workflows
            .values()
            .filter(|wf| wf.input_states.iter().any(|s| s == current_state))
            .map(|wf| wf.command.as_str())
            .collect()
    }

    pub fn legal_commands_for_role(&self, current_state: &str, role: &RoleKey) -> Vec<&str> {
        let legal = self.legal_commands(current_state);
        if *role == RoleKey::All {
            return legal;
        }
        let Some((role_commands, _)) = self.by_role.get(role) else {
            return Vec::new();
        };
        legal
            .into_iter()
            .filter(|c| role_commands.iter().any(|rc| rc == c))
            .collect()
    }

    pub fn transitions_from(&self, state: &str) -> Vec<&Transition> {
        self.by_from_state
            .get(state)
            .into_iter()
            .flatten()
            .map(|&i| &self.document.transitions[i])
            .collect()
    }
}

/// Role namespace of a command token like `/pm:assess` (the segment before
/// the first `:`), `None` for unnamespaced commands like `/flow:specify`
/// whose namespace is the tool, not a role. Used by
/// [`crate::dispatch::Dispatcher`] to check `invoker_role` against the
/// command's namespace.
pub fn command_namespace(command_token: &str) -> Option<&str> {
    let rest = command_token.strip_prefix('/')?;
    let (ns, _) = rest.split_once(':')?;
    Some(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> WorkflowDocument {
        let yaml = r#"
version: "1.0"
states: [To Do, Specified, Researched]
workflows:
  specify:
    command: /flow:specify
    agents: ["@pm"]
    input_states: [To Do]
    output_state: Specified
  research:
    command: /flow:research
    agents: ["@arch"]
    input_states: [Specified]
    output_state: Researched
roles:
  pm:
    commands: ["/flow:specify"]
    agents: ["@pm"]
transitions:
  - from: To Do
    to: Specified
    via: specify
  - from: Specified
    to: Researched
    via: research
"#;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn get_workflow_resolves_by_command_token() {
        let model = Model::build(sample_document());
        let wf = model.get_workflow("/flow:specify").unwrap();
        assert_eq!(wf.output_state, "Specified");
        assert!(model.get_workflow("/flow:unknown").is_none());
    }

    #[test]
    fn legal_commands_filters_by_input_state() {
        let model = Model::build(sample_document());
        assert_eq!(model.legal_commands("To Do"), vec!["/flow:specify"]);
        assert_eq!(model.legal_commands("Specified"), vec!["/flow:research"]);
        assert!(model.legal_commands("Researched").is_empty());
    }

    #[test]
    fn is_valid_transition_checks_from_to_via() {
        let model = Model::build(sample_document());
        assert!(model.is_valid_transition("To Do", "Specified", "specify"));
        assert!(!model.is_valid_transition("To Do", "Researched", "specify"));
        assert!(!model.is_valid_transition("Specified", "Specified", "specify"));
    }

    #[test]
    fn legal_commands_for_role_intersects() {
        let model = Model::build(sample_document());
        let pm = super::super::document::RoleKey::Pm;
        assert_eq!(model.legal_commands_for_role("To Do", &pm), vec!["/flow:specify"]);
        assert!(model.legal_commands_for_role("Specified", &pm).is_empty());

        let all = super::super::document::RoleKey::All;
        assert_eq!(model.legal_commands_for_role("To Do", &all), vec!["/flow:specify"]);
    }

    #[test]
    fn command_namespace_extracts_role_prefix() {
        assert_eq!(command_namespace("/pm:assess"), Some("pm"));
        assert_eq!(command_namespace("/flow:specify"), Some("flow"));
        assert_eq!(command_namespace("/noop"), None);
    }

    #[test]
    fn boundary_single_state_zero_transitions() {
        let yaml = "version: \"1.0\"\nstates: [Only]\nworkflows: {}\ntransitions: []\n";
        let doc: WorkflowDocument = serde_yaml::from_str(yaml).unwrap();
        let model = Model::build(doc);
        assert!(model.legal_commands("Only").is_empty());
    }
}
