//! Materialization engine: path mapping, Markdown↔Markdown/TOML format
//! conversion, argument substitution, idempotence, and the `dev_setup`
//! symlink mode.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::{value, DocumentMut, Table};
use which::which;

use crate::error::{DomainError, Finding};

use super::profiles::{AgentProfile, FileExtension};
use super::template::{parse_template, TemplateParseError};

#[derive(Debug)]
pub enum MaterializeError {
    Io(std::io::Error),
    TemplateParse { path: PathBuf, source: TemplateParseError },
    UnknownAgentKey(String),
    NonSymlinkInConsumerDir(PathBuf),
    BrokenSymlink(PathBuf),
    SymlinkOutsideTemplates(PathBuf),
}

impl From<std::io::Error> for MaterializeError {
    fn from(e: std::io::Error) -> Self {
        MaterializeError::Io(e)
    }
}

impl std::fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterializeError::Io(e) => write!(f, "materializer I/O error: {e}"),
            MaterializeError::TemplateParse { path, source } => {
                write!(f, "template `{}` is malformed: {source}", path.display())
            }
            MaterializeError::UnknownAgentKey(k) => write!(f, "unknown agent key `{k}`"),
            MaterializeError::NonSymlinkInConsumerDir(p) => {
                write!(f, "`{}` is a regular file; only symlinks are allowed in consumer command dirs", p.display())
            }
            MaterializeError::BrokenSymlink(p) => write!(f, "`{}` is a broken symlink", p.display()),
            MaterializeError::SymlinkOutsideTemplates(p) => {
                write!(f, "`{}` resolves outside templates/commands/", p.display())
            }
        }
    }
}

impl std::error::Error for MaterializeError {}

impl DomainError for MaterializeError {
    fn rule_id(&self) -> &'static str {
        match self {
            MaterializeError::Io(_) => "E500_MATERIALIZE_IO",
            MaterializeError::TemplateParse { .. } => "E501_TEMPLATE_PARSE",
            MaterializeError::UnknownAgentKey(_) => "E502_UNKNOWN_AGENT",
            MaterializeError::NonSymlinkInConsumerDir(_) => "E503_NON_SYMLINK_IN_CONSUMER_DIR",
            MaterializeError::BrokenSymlink(_) => "E504_BROKEN_SYMLINK",
            MaterializeError::SymlinkOutsideTemplates(_) => "E505_SYMLINK_OUTSIDE_TEMPLATES",
        }
    }

    fn exit_code(&self) -> i32 {
        2
    }

    fn remediation(&self) -> Option<String> {
        match self {
            MaterializeError::NonSymlinkInConsumerDir(_) | MaterializeError::BrokenSymlink(_) => {
                Some("run `flow check dev-setup --fix`".to_string())
            }
            _ => None,
        }
    }
}

/// Records what `materialize` actually wrote, for idempotence assertions
/// (P4): a second identical call should report everything `unchanged`.
#[derive(Debug, Default)]
pub struct MaterializationReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

fn walk_templates(source_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !source_dir.exists() {
        return Ok(out);
    }
    for ns_entry in fs::read_dir(source_dir)? {
        let ns_entry = ns_entry?;
        if !ns_entry.path().is_dir() {
            continue;
        }
        for file_entry in fs::read_dir(ns_entry.path())? {
            let file_entry = file_entry?;
            let path = file_entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Substitutes the literal `$ARGUMENTS` token per the agent's
/// `argument_syntax`. Agents that don't support arguments have any line
/// containing `$ARGUMENTS` removed wholesale, including its trailing
/// newline.
fn substitute_arguments(body: &str, profile: &AgentProfile) -> String {
    if !profile.supports_args {
        return body
            .lines()
            .filter(|line| !line.contains("$ARGUMENTS"))
            .map(|line| format!("{line}\n"))
            .collect();
    }
    match profile.argument_syntax {
        Some(syntax) if syntax != "$ARGUMENTS" => body.replace("$ARGUMENTS", syntax),
        _ => body.to_string(),
    }
}

/// Renders a TOML command artifact: `[command] description = "..."` plus
/// `[command.prompt] text = """<body>"""`, built as a table (not string
/// concatenation) so escaping is always syntactically valid.
fn render_toml(description: &str, body: &str) -> String {
    let mut doc = DocumentMut::new();
    let mut command = Table::new();
    command["description"] = value(description);
    let mut prompt = Table::new();
    prompt["text"] = value(body);
    command["prompt"] = toml_edit::Item::Table(prompt);
    doc["command"] = toml_edit::Item::Table(command);
    doc.to_string()
}

fn dest_path(target_root: &Path, profile: &AgentProfile, namespace: &str, name: &str) -> PathBuf {
    target_root
        .join(profile.command_dir)
        .join(namespace)
        .join(format!("{name}.{}", profile.file_extension.as_str()))
}

fn render_for_profile(template_path: &Path, profile: &AgentProfile) -> Result<String, MaterializeError> {
    let raw = fs::read_to_string(template_path)?;
    let artifact = parse_template(&raw).map_err(|source| MaterializeError::TemplateParse {
        path: template_path.to_path_buf(),
        source,
    })?;
    let body = substitute_arguments(&artifact.body, profile);
    Ok(match profile.file_extension {
        FileExtension::Md => body,
        FileExtension::Toml => render_toml(&artifact.frontmatter.description, &body),
    })
}

/// Materializes every template under `source_dir` for every profile in
/// `profiles` into `target_root`. Idempotent (P4): running twice with the
/// same inputs writes nothing on the second run and produces
/// byte-identical files both times.
pub fn materialize(source_dir: &Path, target_root: &Path, profiles: &[AgentProfile]) -> Result<MaterializationReport, MaterializeError> {
    let mut report = MaterializationReport::default();
    for template_path in walk_templates(source_dir)? {
        let namespace = template_path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let name = template_path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        for profile in profiles {
            let rendered = render_for_profile(&template_path, profile)?;
            let dest = dest_path(target_root, profile, &namespace, &name);

            let already_matches = fs::read_to_string(&dest).map(|existing| existing == rendered).unwrap_or(false);
            if already_matches {
                report.unchanged.push(dest);
                continue;
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, &rendered)?;
            report.written.push(dest);
        }
    }
    Ok(report)
}

/// Probes `PATH` for each profile's `cli_command`, returning the subset of
/// [`AgentKey`](super::profiles::AgentKey)s found installed.
pub fn detect_installed_agents(profiles: &[AgentProfile]) -> Vec<AgentProfile> {
    profiles
        .iter()
        .copied()
        .filter(|p| p.cli_command.is_some_and(|cmd| which(cmd).is_ok()))
        .collect()
}

/// Report produced by [`dev_setup`]: one entry per symlink created, and any
/// agents skipped because their consumer format isn't Markdown (a symlink
/// can't convert format - only identity-copy agents participate in
/// `dev_setup`).
#[derive(Debug, Default)]
pub struct DevSetupReport {
    pub created: Vec<PathBuf>,
    pub skipped_non_markdown: Vec<&'static str>,
}

/// Source-repository-only mode: creates symlinks from
/// `<repo>/.<agent>/commands/...` to `<repo>/templates/commands/...`,
/// enforcing the single-source-of-truth invariant. Only agents whose
/// consumer format is Markdown participate, since a symlink cannot also
/// perform the Markdown→TOML conversion [`materialize`] does for releases.
pub fn dev_setup(repo_root: &Path, profiles: &[AgentProfile], force: bool) -> Result<DevSetupReport, MaterializeError> {
    let source_dir = repo_root.join("templates/commands");
    let mut report = DevSetupReport::default();

    for profile in profiles {
        if profile.file_extension != FileExtension::Md {
            report.skipped_non_markdown.push(profile.display_name);
            continue;
        }
        let consumer_root = repo_root.join(profile.command_dir);
        if force && consumer_root.exists() {
            fs::remove_dir_all(&consumer_root)?;
        }

        for template_path in walk_templates(&source_dir)? {
            let relative = template_path.strip_prefix(&source_dir).expect("walked under source_dir");
            let link_path = consumer_root.join(relative);
            if let Some(parent) = link_path.parent() {
                fs::create_dir_all(parent)?;
            }
            if link_path.symlink_metadata().is_ok() {
                fs::remove_file(&link_path)?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(&template_path, &link_path)?;
            #[cfg(windows)]
            std::os::windows::fs::symlink_file(&template_path, &link_path)?;
            report.created.push(link_path);
        }
    }
    Ok(report)
}

#[derive(Debug)]
pub enum DevSetupInvariantError {
    NonSymlink(PathBuf),
    Broken(PathBuf),
    OutsideTemplates(PathBuf),
}

/// Validates the `dev_setup` invariants (usable as a pre-commit hook): no
/// regular `.md` file in a consumer dir, every symlink resolves under
/// `templates/commands/`, no broken symlinks.
pub fn validate_dev_setup(repo_root: &Path, profiles: &[AgentProfile]) -> Result<Vec<Finding>, MaterializeError> {
    let templates_root = repo_root.join("templates/commands");
    let mut findings = Vec::new();

    for profile in profiles {
        let consumer_root = repo_root.join(profile.command_dir);
        if !consumer_root.exists() {
            continue;
        }
        check_dir(&consumer_root, &templates_root, &mut findings)?;
    }
    Ok(findings)
}

fn check_dir(dir: &Path, templates_root: &Path, findings: &mut Vec<Finding>) -> Result<(), MaterializeError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = fs::symlink_metadata(&path)?;
        if meta.is_dir() && !meta.file_type().is_symlink() {
            check_dir(&path, templates_root, findings)?;
            continue;
        }
        if !meta.file_type().is_symlink() {
            findings.push(Finding::error(
                path.display().to_string(),
                "E503_NON_SYMLINK_IN_CONSUMER_DIR",
                "only symlinks are permitted in consumer command directories".to_string(),
            ));
            continue;
        }
        match fs::canonicalize(&path) {
            Ok(target) => {
                let templates_canonical = fs::canonicalize(templates_root).unwrap_or_else(|_| templates_root.to_path_buf());
                if !target.starts_with(&templates_canonical) {
                    findings.push(Finding::error(
                        path.display().to_string(),
                        "E505_SYMLINK_OUTSIDE_TEMPLATES",
                        format!("symlink resolves to `{}`, outside templates/commands/", target.display()),
                    ));
                }
            }
            Err(_) => {
                findings.push(Finding::error(
                    path.display().to_string(),
                    "E504_BROKEN_SYMLINK",
                    "symlink target does not exist".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Summary counts grouped by [`super::profiles::AgentKey`], used by CLI
/// reporting. Kept separate from [`MaterializationReport`] since callers
/// usually want totals, not paths.
pub fn summarize_by_namespace(report: &MaterializationReport) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for path in &report.written {
        if let Some(ns) = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
            *counts.entry(ns.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::profiles::{profile_for, AgentKey};

    fn write_template(dir: &Path, ns: &str, name: &str, description: &str, body: &str) {
        let path = dir.join(ns).join(format!("{name}.md"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("---\ndescription: \"{description}\"\n---\n{body}")).unwrap();
    }

    #[test]
    fn s4_markdown_to_toml_conversion() {
        let src = tempfile::tempdir().unwrap();
        write_template(src.path(), "flow", "plan", "Plan it", "Do the plan using $ARGUMENTS.\n");

        let target = tempfile::tempdir().unwrap();
        let gemini = *profile_for(AgentKey::Gemini);
        let report = materialize(src.path(), target.path(), &[gemini]).unwrap();
        assert_eq!(report.written.len(), 1);

        let content = fs::read_to_string(&report.written[0]).unwrap();
        assert!(content.contains("description = \"Plan it\""));
        assert!(content.contains("text = \"\"\"\nDo the plan using {{args}}.\n\"\"\""));
    }

    #[test]
    fn markdown_identity_copy_substitutes_arguments() {
        let src = tempfile::tempdir().unwrap();
        write_template(src.path(), "flow", "specify", "Specify", "Write a spec for $ARGUMENTS.\n");

        let target = tempfile::tempdir().unwrap();
        let claude = *profile_for(AgentKey::Claude);
        let report = materialize(src.path(), target.path(), &[claude]).unwrap();
        let content = fs::read_to_string(&report.written[0]).unwrap();
        assert_eq!(content, "Write a spec for $ARGUMENTS.\n");
    }

    #[test]
    fn agent_without_arg_support_strips_whole_line() {
        let src = tempfile::tempdir().unwrap();
        write_template(src.path(), "flow", "specify", "Specify", "Line one.\nUses $ARGUMENTS here.\nLine three.\n");

        let target = tempfile::tempdir().unwrap();
        let amazonq = *profile_for(AgentKey::Amazonq);
        let report = materialize(src.path(), target.path(), &[amazonq]).unwrap();
        let content = fs::read_to_string(&report.written[0]).unwrap();
        assert_eq!(content, "Line one.\nLine three.\n");
    }

    #[test]
    fn p4_materialize_twice_is_idempotent_and_writes_nothing_second_time() {
        let src = tempfile::tempdir().unwrap();
        write_template(src.path(), "flow", "plan", "Plan it", "Plan using $ARGUMENTS.\n");

        let target = tempfile::tempdir().unwrap();
        let claude = *profile_for(AgentKey::Claude);
        let first = materialize(src.path(), target.path(), &[claude]).unwrap();
        assert_eq!(first.written.len(), 1);

        let second = materialize(src.path(), target.path(), &[claude]).unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged.len(), 1);
    }

    #[test]
    fn dev_setup_creates_symlinks_preserving_structure() {
        let repo = tempfile::tempdir().unwrap();
        write_template(&repo.path().join("templates/commands"), "flow", "plan", "Plan it", "Plan using $ARGUMENTS.\n");

        let claude = *profile_for(AgentKey::Claude);
        let report = dev_setup(repo.path(), &[claude], false).unwrap();
        assert_eq!(report.created.len(), 1);
        assert!(report.created[0].symlink_metadata().unwrap().file_type().is_symlink());
    }

    #[test]
    fn dev_setup_skips_non_markdown_agents() {
        let repo = tempfile::tempdir().unwrap();
        write_template(&repo.path().join("templates/commands"), "flow", "plan", "Plan it", "Plan using $ARGUMENTS.\n");

        let gemini = *profile_for(AgentKey::Gemini);
        let report = dev_setup(repo.path(), &[gemini], false).unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.skipped_non_markdown, vec!["Gemini CLI"]);
    }

    #[test]
    fn p9_validate_dev_setup_passes_for_clean_symlink_tree() {
        let repo = tempfile::tempdir().unwrap();
        write_template(&repo.path().join("templates/commands"), "flow", "plan", "Plan it", "Plan using $ARGUMENTS.\n");
        let claude = *profile_for(AgentKey::Claude);
        dev_setup(repo.path(), &[claude], false).unwrap();

        let findings = validate_dev_setup(repo.path(), &[claude]).unwrap();
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn validate_dev_setup_flags_regular_file() {
        let repo = tempfile::tempdir().unwrap();
        let consumer = repo.path().join(".claude/commands/flow");
        fs::create_dir_all(&consumer).unwrap();
        fs::write(consumer.join("plan.md"), "not a symlink").unwrap();

        let claude = *profile_for(AgentKey::Claude);
        let findings = validate_dev_setup(repo.path(), &[claude]).unwrap();
        assert!(findings.iter().any(|f| f.rule_id == "E503_NON_SYMLINK_IN_CONSUMER_DIR"));
    }
}
