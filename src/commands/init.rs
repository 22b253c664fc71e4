//! `flow init`: scaffolds a project from scratch - writes the default
//! workflow document, installs the base+extension template overlay, and
//! materializes agent commands for either the requested or detected agents.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use flowspec::materialize::{detect_installed_agents, AgentKey, AgentProfile, AGENT_PROFILES};
use flowspec::overlay::{ArchiveSource, OverlayEngine};
use flowspec::workflow::DEFAULT_WORKFLOW_YAML;

use super::{print_findings_human, print_hint, print_success, report_domain_error};

fn split_owner_repo(spec: &str) -> Option<(&str, &str)> {
    spec.split_once('/')
}

fn resolve_agents(agents: &[String]) -> Result<Vec<AgentProfile>, String> {
    if agents.is_empty() {
        let detected = detect_installed_agents(AGENT_PROFILES);
        return Ok(if detected.is_empty() { AGENT_PROFILES.to_vec() } else { detected });
    }
    agents
        .iter()
        .map(|raw| {
            let key = AgentKey::from_str(raw).map_err(|_| format!("unknown agent `{raw}`"))?;
            AGENT_PROFILES
                .iter()
                .find(|p| p.key == key)
                .copied()
                .ok_or_else(|| format!("no profile registered for `{raw}`"))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    project_root: &Path,
    base_version: Option<String>,
    extension_version: Option<String>,
    base_repo: &str,
    extension_repo: &str,
    agents: Vec<String>,
    force: bool,
) -> i32 {
    let workflow_path = super::project::workflow_path(project_root);
    if workflow_path.exists() && !force {
        flowspec::styling::eprintln!(
            "{} a workflow document already exists at `{}` - pass --force to re-initialize",
            flowspec::styling::ERROR_EMOJI,
            workflow_path.display()
        );
        return 3;
    }

    let profiles = match resolve_agents(&agents) {
        Ok(p) => p,
        Err(message) => {
            flowspec::styling::eprintln!("{} {message}", flowspec::styling::ERROR_EMOJI);
            return 2;
        }
    };

    let Some((base_owner, base_name)) = split_owner_repo(base_repo) else {
        flowspec::styling::eprintln!("{} --base-repo must be `owner/repo`, got `{base_repo}`", flowspec::styling::ERROR_EMOJI);
        return 2;
    };
    let Some((ext_owner, ext_name)) = split_owner_repo(extension_repo) else {
        flowspec::styling::eprintln!(
            "{} --extension-repo must be `owner/repo`, got `{extension_repo}`",
            flowspec::styling::ERROR_EMOJI
        );
        return 2;
    };

    if let Err(err) = fs::write(&workflow_path, DEFAULT_WORKFLOW_YAML) {
        flowspec::styling::eprintln!("{} failed writing {}: {err}", flowspec::styling::ERROR_EMOJI, workflow_path.display());
        return 2;
    }
    print_success(&format!("wrote {}", workflow_path.display()));

    flowspec::overlay::engine::install_sigint_handler();
    let base = ArchiveSource::new(base_owner, base_name, base_version);
    let extension = ArchiveSource::new(ext_owner, ext_name, extension_version);
    let engine = OverlayEngine::new(crate::cli::version_str());

    let report = match engine.install(project_root, &base, &extension) {
        Ok(report) => report,
        Err(err) => return report_domain_error(&err, false),
    };
    print_success(&format!(
        "installed base {} and extension {}",
        report.manifest.base.tag, report.manifest.extension.tag
    ));
    print_findings_human(&report.findings);

    let source_dir = project_root.join("templates/commands");
    let materialize_report = match flowspec::materialize::materialize(&source_dir, project_root, &profiles) {
        Ok(r) => r,
        Err(err) => return report_domain_error(&err, false),
    };
    print_hint(&format!(
        "materialized {} command file(s) for: {}",
        materialize_report.written.len(),
        profiles.iter().map(|p| p.display_name).collect::<Vec<_>>().join(", ")
    ));

    0
}
