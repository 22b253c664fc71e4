//! §8.4 S4 — agent TOML materialization: a Markdown template with
//! `$ARGUMENTS` renders as a TOML command artifact for an agent profile
//! whose argument syntax is `{{args}}`.

use std::fs;

use flowspec::materialize::profiles::{profile_for, AgentKey};
use flowspec::materialize::materialize;

#[test]
fn s4_agent_toml_materialization() {
    let source = tempfile::tempdir().expect("tempdir");
    let namespace_dir = source.path().join("flow");
    fs::create_dir_all(&namespace_dir).expect("mkdir");
    fs::write(
        namespace_dir.join("plan.md"),
        "---\ndescription: \"Plan it\"\n---\nDo the plan using $ARGUMENTS.\n",
    )
    .expect("write template");

    let target = tempfile::tempdir().expect("tempdir");
    let gemini = *profile_for(AgentKey::Gemini);
    let report = materialize(source.path(), target.path(), &[gemini]).expect("materialize");

    assert_eq!(report.written.len(), 1);
    let content = fs::read_to_string(&report.written[0]).expect("read rendered artifact");
    assert!(content.contains("description = \"Plan it\""));
    assert!(content.contains("text = \"\"\"\nDo the plan using {{args}}.\n\"\"\""));
}
