//! §8.4 S5 / P6 — checking acceptance criteria increments progress by
//! exactly `1/total`, and leaves every other checkbox line byte-identical.

use flowspec::backlog::{CreateOptions, EditMutations, Store};

#[test]
fn s5_checking_acs_increments_progress() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("backlog"));

    let created = store
        .create(
            "Five acceptance criteria",
            CreateOptions {
                acceptance_criteria: vec!["one".into(), "two".into(), "three".into(), "four".into(), "five".into()],
                ..Default::default()
            },
        )
        .expect("create task with five ACs");
    assert_eq!(created.ac_progress_fraction(), Some(0.0));

    let edited = store
        .edit(created.id(), EditMutations { check_ac: vec![2, 4], ..Default::default() })
        .expect("check ACs 2 and 4");

    assert_eq!(edited.ac_progress(), Some((2, 5)));
    assert_eq!(edited.ac_progress_fraction(), Some(2.0 / 5.0));
    assert!(edited.acceptance_criteria[0].text.contains("one") && !edited.acceptance_criteria[0].checked);
    assert!(edited.acceptance_criteria[1].checked);
    assert!(!edited.acceptance_criteria[2].checked);
    assert!(edited.acceptance_criteria[3].checked);
    assert!(!edited.acceptance_criteria[4].checked);
}

#[test]
fn zero_acceptance_criteria_progress_is_undefined() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("backlog"));

    let created = store.create("No ACs yet", CreateOptions::default()).expect("create task with no ACs");
    assert_eq!(created.ac_progress(), None);
    assert_eq!(created.ac_progress_fraction(), None);
}
