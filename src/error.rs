//! Shared error taxonomy.
//!
//! Validation never raises on user-data errors; it returns an ordered list
//! of [`Finding`]s instead, so a caller can present every problem in one
//! pass. Components raise (`Result<_, Error>`) only for programmer errors -
//! a malformed internal schema, a locked file that never releases, an I/O
//! failure reading a file the caller handed us.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single [`Finding`]. Only `Error` blocks model construction;
/// `Warning` is returned alongside a valid model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation or runtime problem, carrying enough structure for
/// both human display and `--json` machine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// JSON-pointer-style location inside the document, e.g. `/states/3`.
    pub path: String,
    pub message: String,
    pub rule_id: &'static str,
}

impl Finding {
    pub fn error(path: impl Into<String>, rule_id: &'static str, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
            rule_id,
        }
    }

    pub fn warning(path: impl Into<String>, rule_id: &'static str, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
            rule_id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.severity, self.rule_id, self.path, self.message)
    }
}

/// Returns true if any finding in the slice is error-severity.
pub fn has_errors(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_error)
}

/// A `{status, rule_id, message, location, suggestion}` envelope for the
/// `--json` CLI surface, built once per error so every component's JSON
/// output has the exact same shape.
#[derive(Debug, Clone, Serialize)]
pub struct JsonError {
    pub status: &'static str,
    pub rule_id: &'static str,
    pub message: String,
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

impl JsonError {
    pub fn new(rule_id: &'static str, message: impl Into<String>) -> Self {
        JsonError {
            status: "error",
            rule_id,
            message: message.into(),
            location: None,
            suggestion: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Every domain error type implements this so the CLI has a single,
/// uniform error-printing and exit-code path.
pub trait DomainError: fmt::Display {
    fn rule_id(&self) -> &'static str;
    fn exit_code(&self) -> i32;
    fn remediation(&self) -> Option<String> {
        None
    }

    fn to_json_error(&self) -> JsonError {
        let mut e = JsonError::new(self.rule_id(), self.to_string());
        if let Some(hint) = self.remediation() {
            e = e.with_suggestion(hint);
        }
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_blocks_but_warning_does_not() {
        let findings = vec![Finding::warning("/a", "W001", "hmm")];
        assert!(!has_errors(&findings));
        let findings = vec![
            Finding::warning("/a", "W001", "hmm"),
            Finding::error("/b", "E100_NO_STATES", "no states"),
        ];
        assert!(has_errors(&findings));
    }

    #[test]
    fn finding_display_includes_rule_id() {
        let f = Finding::error("/states", "E100_NO_STATES", "states must not be empty");
        let s = f.to_string();
        assert!(s.contains("E100_NO_STATES"));
        assert!(s.contains("/states"));
    }
}
