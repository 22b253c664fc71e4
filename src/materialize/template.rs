//! Parsing of a single template artifact under `templates/commands/`
//! (§3.5): YAML frontmatter (`description`, optional `argument-hint`) plus a
//! Markdown body that may contain the literal `$ARGUMENTS` token.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFrontmatter {
    pub description: String,
    #[serde(rename = "argument-hint", default)]
    pub argument_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateArtifact {
    pub frontmatter: TemplateFrontmatter,
    pub body: String,
}

#[derive(Debug)]
pub enum TemplateParseError {
    MissingFrontmatterDelimiters,
    InvalidFrontmatter(String),
}

impl std::fmt::Display for TemplateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateParseError::MissingFrontmatterDelimiters => {
                write!(f, "template is missing `---`-delimited frontmatter")
            }
            TemplateParseError::InvalidFrontmatter(e) => write!(f, "invalid template frontmatter: {e}"),
        }
    }
}

impl std::error::Error for TemplateParseError {}

/// Parses a template file's raw contents into frontmatter + body.
pub fn parse_template(content: &str) -> Result<TemplateArtifact, TemplateParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or(TemplateParseError::MissingFrontmatterDelimiters)?;
    let end = rest.find("\n---").ok_or(TemplateParseError::MissingFrontmatterDelimiters)?;
    let frontmatter_raw = &rest[..end];
    let body = rest[end..].trim_start_matches("\n---").trim_start_matches('\n').to_string();

    let frontmatter: TemplateFrontmatter =
        serde_yaml::from_str(frontmatter_raw).map_err(|e| TemplateParseError::InvalidFrontmatter(e.to_string()))?;

    Ok(TemplateArtifact { frontmatter, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontmatter_and_body() {
        let raw = "---\ndescription: \"Plan it\"\n---\nDo the plan using $ARGUMENTS.\n";
        let artifact = parse_template(raw).unwrap();
        assert_eq!(artifact.frontmatter.description, "Plan it");
        assert_eq!(artifact.body, "Do the plan using $ARGUMENTS.\n");
    }

    #[test]
    fn missing_delimiters_is_an_error() {
        assert!(parse_template("no frontmatter here").is_err());
    }
}
