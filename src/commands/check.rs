//! `flow check dev-setup [--agent] [--fix]`: validates (and optionally
//! repairs) the source-repo symlink invariant enforced by
//! [`flowspec::materialize::dev_setup`].

use std::path::Path;
use std::str::FromStr;

use flowspec::materialize::{dev_setup, validate_dev_setup, AgentKey, AgentProfile, AGENT_PROFILES};

use super::{print_findings_human, print_hint, print_success};

fn resolve_profiles(agents: &[String]) -> Result<Vec<AgentProfile>, String> {
    if agents.is_empty() {
        return Ok(AGENT_PROFILES.to_vec());
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

pub fn dev_setup_check(project_root: &Path, agents: Vec<String>, fix: bool) -> i32 {
    let profiles = match resolve_profiles(&agents) {
        Ok(p) => p,
        Err(message) => {
            flowspec::styling::eprintln!("{} {message}", flowspec::styling::ERROR_EMOJI);
            return 2;
        }
    };

    if fix {
        return match dev_setup(project_root, &profiles, false) {
            Ok(report) => {
                print_success(&format!("created {} symlinks", report.created.len()));
                if !report.skipped_non_markdown.is_empty() {
                    print_hint(&format!("skipped (not markdown-based): {}", report.skipped_non_markdown.join(", ")));
                }
                0
            }
            Err(err) => {
                flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
                2
            }
        };
    }

    match validate_dev_setup(project_root, &profiles) {
        Ok(findings) => {
            let has_errors = findings.iter().any(|f| f.is_error());
            print_findings_human(&findings);
            if findings.is_empty() {
                print_success("dev-setup invariant holds");
            }
            if has_errors {
                1
            } else {
                0
            }
        }
        Err(err) => {
            flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
            2
        }
    }
}
