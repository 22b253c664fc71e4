//! `flow upgrade [--dry-run]`: re-resolves the overlay sources recorded in
//! the project's install manifest and merges any updates.

use std::path::Path;

use flowspec::materialize::{detect_installed_agents, AGENT_PROFILES};
use flowspec::overlay::{engine::install_sigint_handler, OverlayEngine};

use super::{print_findings_human, print_hint, print_success, report_domain_error};

pub fn run(project_root: &Path, dry_run: bool, base_version: Option<String>, extension_version: Option<String>) -> i32 {
    install_sigint_handler();
    let engine = OverlayEngine::new(crate::cli::version_str());

    match engine.upgrade(project_root, base_version, extension_version, dry_run) {
        Ok(report) => {
            print_findings_human(&report.findings);
            if report.dry_run {
                if report.would_change {
                    print_hint(&format!(
                        "would upgrade to base {} and extension {}",
                        report.manifest.base.tag, report.manifest.extension.tag
                    ));
                } else {
                    print_success("already up to date");
                }
                return 0;
            }

            print_success(&format!(
                "upgraded to base {} and extension {}",
                report.manifest.base.tag, report.manifest.extension.tag
            ));

            let profiles = detect_installed_agents(AGENT_PROFILES);
            if !profiles.is_empty() {
                let source_dir = project_root.join("templates/commands");
                match flowspec::materialize::materialize(&source_dir, project_root, &profiles) {
                    Ok(r) => print_hint(&format!("re-materialized {} command file(s)", r.written.len())),
                    Err(err) => return report_domain_error(&err, false),
                }
            }
            0
        }
        Err(err) => report_domain_error(&err, false),
    }
}
