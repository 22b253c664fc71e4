//! §8.4 S6 — a workflow document with a state no transition chain reaches
//! from the initial state fails `workflow::load` with `E101_UNREACHABLE_STATE`,
//! pointing at the offending state's position in `/states`.

use std::fs;

use flowspec::workflow::{self, LoadResult};

const YAML: &str = r#"
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

#[test]
fn s6_workflow_validation_rejects_unreachable_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flowspec_workflow.yml");
    fs::write(&path, YAML).unwrap();

    let schema = workflow::generate_schema();
    let findings = match workflow::load(&path, &schema) {
        LoadResult::Ok { .. } => panic!("a document with an unreachable state must not load cleanly"),
        LoadResult::Err(findings) => findings,
    };

    let unreachable = findings
        .iter()
        .find(|f| f.rule_id == "E101_UNREACHABLE_STATE")
        .expect("expected an E101_UNREACHABLE_STATE finding");
    assert_eq!(unreachable.path, "/states/3");
    assert!(unreachable.message.contains('D'));
}
