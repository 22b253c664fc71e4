//! Task (backlog item) data model and markdown+frontmatter (de)serialization.

use chrono::{DateTime, Utc};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::workflow::RoleKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// The YAML frontmatter block of a task file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskFrontmatter {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub role: Option<RoleKey>,
}

/// A single acceptance-criterion checkbox line: checked state and the
/// trailing text verbatim, so mutation never loses content after the
/// checkbox token.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceCriterion {
    pub text: String,
    pub checked: bool,
}

/// A fully parsed task: frontmatter plus the three fixed body sections
/// (Description, Acceptance Criteria, Notes).
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub frontmatter: TaskFrontmatter,
    pub description: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub notes: String,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.frontmatter.id
    }

    /// `(checked, total)` - progress is undefined (not computed as 100%)
    /// when there are zero ACs.
    pub fn ac_progress(&self) -> Option<(usize, usize)> {
        let total = self.acceptance_criteria.len();
        if total == 0 {
            return None;
        }
        let checked = self.acceptance_criteria.iter().filter(|ac| ac.checked).count();
        Some((checked, total))
    }

    /// Progress as a fraction in `[0, 1]`, or `None` if undefined.
    pub fn ac_progress_fraction(&self) -> Option<f64> {
        self.ac_progress().map(|(c, t)| c as f64 / t as f64)
    }
}

fn checkbox_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^- \[( |x|X)\] (.*)$").unwrap())
}

/// Filename pattern for a task file.
pub fn filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^task-(\d+) - [A-Za-z0-9._-]{1,80}\.md$").unwrap())
}

/// Derives the filename slug from a task title: lowercase, runs of
/// non-alphanumerics collapsed to a single `-`, truncated to 50 characters,
/// with leading/trailing `-` trimmed.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    let truncated: String = trimmed.chars().take(50).collect();
    truncated.trim_matches('-').to_string()
}

pub fn filename_for(id: &str, title: &str) -> String {
    format!("{id} - {}.md", slugify(title))
}

#[derive(Debug)]
pub enum TaskParseError {
    MissingFrontmatterDelimiters,
    InvalidFrontmatter(String),
}

impl std::fmt::Display for TaskParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskParseError::MissingFrontmatterDelimiters => {
                write!(f, "task file is missing `---`-delimited frontmatter")
            }
            TaskParseError::InvalidFrontmatter(e) => write!(f, "invalid frontmatter: {e}"),
        }
    }
}

impl std::error::Error for TaskParseError {}

/// Parses a full task file (frontmatter + body) into a [`Task`].
pub fn parse_task(content: &str) -> Result<Task, TaskParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or(TaskParseError::MissingFrontmatterDelimiters)?;
    let end = rest
        .find("\n---")
        .ok_or(TaskParseError::MissingFrontmatterDelimiters)?;
    let frontmatter_raw = &rest[..end];
    let body = rest[end..]
        .trim_start_matches("\n---")
        .trim_start_matches('\n');

    let frontmatter: TaskFrontmatter =
        serde_yaml::from_str(frontmatter_raw).map_err(|e| TaskParseError::InvalidFrontmatter(e.to_string()))?;

    let (description, acceptance_criteria, notes) = parse_body(body);

    Ok(Task {
        frontmatter,
        description,
        acceptance_criteria,
        notes,
    })
}

fn parse_body(body: &str) -> (String, Vec<AcceptanceCriterion>, String) {
    const H_DESC: &str = "## Description";
    const H_AC: &str = "## Acceptance Criteria";
    const H_NOTES: &str = "## Notes";

    let mut description = String::new();
    let mut ac = Vec::new();
    let mut notes = String::new();

    #[derive(PartialEq)]
    enum Section {
        None,
        Description,
        Ac,
        Notes,
    }
    let mut section = Section::None;

    for line in body.lines() {
        let trimmed = line.trim_end();
        if trimmed == H_DESC {
            section = Section::Description;
            continue;
        } else if trimmed == H_AC {
            section = Section::Ac;
            continue;
        } else if trimmed == H_NOTES {
            section = Section::Notes;
            continue;
        }

        match section {
            Section::Description => {
                description.push_str(line);
                description.push('\n');
            }
            Section::Ac => {
                if let Some(caps) = checkbox_regex().captures(trimmed) {
                    let checked = matches!(&caps[1], "x" | "X");
                    ac.push(AcceptanceCriterion {
                        text: caps[2].to_string(),
                        checked,
                    });
                }
            }
            Section::Notes => {
                notes.push_str(line);
                notes.push('\n');
            }
            Section::None => {}
        }
    }

    (
        description.trim().to_string(),
        ac,
        notes.trim().to_string(),
    )
}

/// Renders a [`Task`] back to the full markdown+frontmatter file content.
/// Section order is always fixed; missing sections are recreated empty
/// rather than omitted, so a later edit always has somewhere to append.
pub fn render_task(task: &Task) -> String {
    let frontmatter = serde_yaml::to_string(&task.frontmatter).expect("TaskFrontmatter always serializes");
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&frontmatter);
    out.push_str("---\n\n");
    out.push_str("## Description\n\n");
    out.push_str(task.description.trim());
    out.push_str("\n\n## Acceptance Criteria\n\n");
    for ac in &task.acceptance_criteria {
        let mark = if ac.checked { "x" } else { " " };
        out.push_str(&format!("- [{mark}] {}\n", ac.text));
    }
    out.push_str("\n## Notes\n\n");
    out.push_str(task.notes.trim());
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task {
            frontmatter: TaskFrontmatter {
                id: "task-1".to_string(),
                title: "Do the thing".to_string(),
                status: "To Do".to_string(),
                priority: Priority::Medium,
                assignee: vec!["@alice".to_string()],
                labels: vec![],
                dependencies: vec![],
                created_at: "2026-01-01T00:00:00Z".parse().unwrap(),
                updated_at: "2026-01-01T00:00:00Z".parse().unwrap(),
                role: None,
            },
            description: "Do the thing well.".to_string(),
            acceptance_criteria: vec![
                AcceptanceCriterion { text: "first".to_string(), checked: false },
                AcceptanceCriterion { text: "second (with `code`)".to_string(), checked: true },
            ],
            notes: String::new(),
        }
    }

    #[test]
    fn slugify_lowercases_and_collapses_separators() {
        assert_eq!(slugify("Add Login Flow!!"), "add-login-flow");
        assert_eq!(slugify("  leading/trailing  "), "leading-trailing");
    }

    #[test]
    fn slugify_truncates_to_fifty_chars() {
        let long = "a".repeat(100);
        assert_eq!(slugify(&long).len(), 50);
    }

    #[test]
    fn filename_regex_matches_valid_filenames() {
        assert!(filename_regex().is_match("task-1 - add-login.md"));
        assert!(filename_regex().is_match("task-10042 - x.md"));
        assert!(!filename_regex().is_match("task-1-add-login.md"));
        assert!(!filename_regex().is_match("task-abc - x.md"));
    }

    #[test]
    fn id_overflow_above_10000_still_well_formed() {
        let name = filename_for("task-10042", "Some Title");
        assert!(filename_regex().is_match(&name));
    }

    #[test]
    fn roundtrip_render_and_parse() {
        let task = sample();
        let rendered = render_task(&task);
        let parsed = parse_task(&rendered).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn ac_progress_counts_checked() {
        let task = sample();
        assert_eq!(task.ac_progress(), Some((1, 2)));
        assert_eq!(task.ac_progress_fraction(), Some(0.5));
    }

    #[test]
    fn zero_acceptance_criteria_progress_is_undefined() {
        let mut task = sample();
        task.acceptance_criteria.clear();
        assert_eq!(task.ac_progress(), None);
        assert_eq!(task.ac_progress_fraction(), None);
    }

    #[test]
    fn checkbox_preserves_trailing_text() {
        let body = "## Acceptance Criteria\n\n- [ ] do X with **bold** and a [link](http://x)\n";
        let (_, ac, _) = parse_body(body);
        assert_eq!(ac[0].text, "do X with **bold** and a [link](http://x)");
    }

    #[test]
    fn missing_sections_render_empty_but_present() {
        let mut task = sample();
        task.description.clear();
        task.notes.clear();
        task.acceptance_criteria.clear();
        let rendered = render_task(&task);
        assert!(rendered.contains("## Description"));
        assert!(rendered.contains("## Acceptance Criteria"));
        assert!(rendered.contains("## Notes"));
    }
}
