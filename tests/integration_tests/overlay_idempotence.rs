//! §8.4 S3 / P5 — two-stage overlay precedence: base then extension merge
//! into the same target, extension wins on conflicting paths, and the merge
//! step is idempotent when run twice with the same inputs.

use std::fs;

use flowspec::overlay::OverlayEngine;

fn write(dir: &std::path::Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn s3_extension_wins_on_conflicting_path() {
    let base = tempfile::tempdir().unwrap();
    let extension = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    write(base.path(), ".claude/commands/flow/plan.md", "BASE");
    write(extension.path(), ".claude/commands/flow/plan.md", "EXT");

    OverlayEngine::merge_into(base.path(), target.path()).expect("merge base");
    OverlayEngine::merge_into(extension.path(), target.path()).expect("merge extension");

    let content = fs::read_to_string(target.path().join(".claude/commands/flow/plan.md")).unwrap();
    assert_eq!(content, "EXT");
}

#[test]
fn p5_merge_is_idempotent_on_repeat() {
    let base = tempfile::tempdir().unwrap();
    let extension = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    write(base.path(), ".claude/commands/flow/plan.md", "BASE");
    write(base.path(), ".claude/commands/flow/implement.md", "BASE-ONLY");
    write(extension.path(), ".claude/commands/flow/plan.md", "EXT");

    OverlayEngine::merge_into(base.path(), target.path()).expect("merge base once");
    OverlayEngine::merge_into(extension.path(), target.path()).expect("merge extension once");

    // Running the same two-stage merge again must produce byte-identical
    // content, not a second round of duplication or corruption.
    OverlayEngine::merge_into(base.path(), target.path()).expect("merge base twice");
    OverlayEngine::merge_into(extension.path(), target.path()).expect("merge extension twice");

    assert_eq!(fs::read_to_string(target.path().join(".claude/commands/flow/plan.md")).unwrap(), "EXT");
    assert_eq!(
        fs::read_to_string(target.path().join(".claude/commands/flow/implement.md")).unwrap(),
        "BASE-ONLY"
    );
}
