//! Typed representation of the workflow document.
//!
//! Every variant the YAML grammar allows (bare-string vs. object state
//! definitions, the nested-vs-flat `agent_loops` shapes) is parsed once,
//! here, at the validator boundary - nothing downstream touches an untyped
//! YAML mapping.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `version` string, constrained to `^\d+\.\d+$`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct WorkflowVersion(pub String);

impl std::str::FromStr for WorkflowVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let major = parts.next();
        let minor = parts.next();
        let rest = parts.next();
        let valid = rest.is_none()
            && major.is_some_and(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()))
            && minor.is_some_and(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()));
        if valid {
            Ok(WorkflowVersion(s.to_string()))
        } else {
            Err(format!("version `{s}` does not match ^\\d+\\.\\d+$"))
        }
    }
}

impl<'de> Deserialize<'de> for WorkflowVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A state declaration: either a bare name or `{name, description}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StateDef {
    Name(String),
    Detailed { name: String, description: Option<String> },
}

impl StateDef {
    pub fn name(&self) -> &str {
        match self {
            StateDef::Name(n) => n,
            StateDef::Detailed { name, .. } => name,
        }
    }
}

/// An agent reference inside a workflow's `agents` list: either a bare
/// name or a detailed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AgentRef {
    Name(String),
    Detailed {
        name: String,
        identity: Option<String>,
        description: Option<String>,
        #[serde(default)]
        responsibilities: Vec<String>,
    },
}

impl AgentRef {
    pub fn name(&self) -> &str {
        match self {
            AgentRef::Name(n) => n,
            AgentRef::Detailed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// A single phase of the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Workflow {
    pub command: String,
    pub agents: Vec<AgentRef>,
    pub input_states: Vec<String>,
    pub output_state: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(default)]
    pub requires_human_approval: bool,
    #[serde(default)]
    pub creates_backlog_tasks: bool,
    #[serde(default)]
    pub requires_backlog_tasks: bool,
    #[serde(default)]
    pub builds_constitution: bool,
}

/// `via` of a [`Transition`]: a workflow name or one of the three special
/// lifecycle actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TransitionVia {
    Special(SpecialTransition),
    Workflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpecialTransition {
    Init,
    Reset,
    Complete,
}

impl TransitionVia {
    /// The workflow name this transition is `via`, or `None` for a special
    /// lifecycle action.
    pub fn workflow_name(&self) -> Option<&str> {
        match self {
            TransitionVia::Workflow(w) => Some(w),
            TransitionVia::Special(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationMode {
    None,
    Keyword,
    PullRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub path: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
}

/// A directed edge permitted between two states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub via: TransitionVia,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input_artifacts: Vec<Artifact>,
    #[serde(default)]
    pub output_artifacts: Vec<Artifact>,
    #[serde(default)]
    pub validation: Option<ValidationMode>,
}

/// `agent_loops`, accepting both the canonical nested shape and the legacy
/// flat `inner_loop`/`outer_loop` keys. Nested is canonical; flat is
/// migrated transparently on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct AgentLoops {
    #[serde(default)]
    pub inner: AgentLoopGroup,
    #[serde(default)]
    pub outer: AgentLoopGroup,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentLoopGroup {
    #[serde(default)]
    pub agents: Vec<String>,
}

impl<'de> Deserialize<'de> for AgentLoops {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Nested {
                #[serde(default)]
                inner: AgentLoopGroup,
                #[serde(default)]
                outer: AgentLoopGroup,
            },
            Flat {
                #[serde(default)]
                inner_loop: Vec<String>,
                #[serde(default)]
                outer_loop: Vec<String>,
            },
        }

        match Shape::deserialize(deserializer)? {
            Shape::Nested { inner, outer } => Ok(AgentLoops { inner, outer }),
            Shape::Flat {
                inner_loop,
                outer_loop,
            } => Ok(AgentLoops {
                inner: AgentLoopGroup { agents: inner_loop },
                outer: AgentLoopGroup { agents: outer_loop },
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoleKey {
    Pm,
    Arch,
    Dev,
    Sec,
    Qa,
    Ops,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Role {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Telemetry {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub consent_date: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Telemetry {
            enabled: false,
            consent_date: None,
            version: None,
        }
    }
}

/// The parsed workflow document: the typed result of deserializing
/// `flowspec_workflow.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowDocument {
    pub version: WorkflowVersion,
    pub states: Vec<StateDef>,
    pub workflows: IndexMap<String, Workflow>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub agent_loops: Option<AgentLoops>,
    #[serde(default)]
    pub roles: IndexMap<RoleKey, Role>,
    #[serde(default)]
    pub telemetry: Telemetry,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl WorkflowDocument {
    /// The initial state: the first declared state, when one isn't
    /// explicitly configured elsewhere.
    pub fn initial_state(&self) -> Option<&str> {
        self.states.first().map(StateDef::name)
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(StateDef::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_accepts_major_minor() {
        let v: WorkflowVersion = "1.0".parse().unwrap();
        assert_eq!(v.0, "1.0");
    }

    #[test]
    fn version_rejects_bad_pattern() {
        assert!("1".parse::<WorkflowVersion>().is_err());
        assert!("1.0.0".parse::<WorkflowVersion>().is_err());
        assert!("a.b".parse::<WorkflowVersion>().is_err());
    }

    #[test]
    fn agent_loops_accepts_nested_shape() {
        let yaml = "inner:\n  agents: [a, b]\nouter:\n  agents: [c]\n";
        let loops: AgentLoops = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(loops.inner.agents, vec!["a", "b"]);
        assert_eq!(loops.outer.agents, vec!["c"]);
    }

    #[test]
    fn agent_loops_migrates_legacy_flat_shape() {
        let yaml = "inner_loop: [a, b]\nouter_loop: [c]\n";
        let loops: AgentLoops = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(loops.inner.agents, vec!["a", "b"]);
        assert_eq!(loops.outer.agents, vec!["c"]);
    }

    #[test]
    fn state_def_accepts_bare_and_detailed() {
        let yaml = "- To Do\n- name: Specified\n  description: has a spec\n";
        let states: Vec<StateDef> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(states[0].name(), "To Do");
        assert_eq!(states[1].name(), "Specified");
    }
}
