use vergen_gitcl::{Emitter, GitclBuilder};

fn main() {
    let gitcl = GitclBuilder::default()
        .describe(true, true, None)
        .build()
        .expect("gitcl builder");

    if Emitter::default()
        .add_instructions(&gitcl)
        .expect("add gitcl instructions")
        .emit()
        .is_err()
    {
        // Not in a git checkout (e.g. a packaged crate) - fall back to the
        // cargo package version at run time, matched by IDEMPOTENT marker.
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE=IDEMPOTENT");
    }
}
