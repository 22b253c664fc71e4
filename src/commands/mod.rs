//! Thin per-subcommand handlers: argument validation and output formatting
//! over the `flowspec` library API. No handler owns business logic - every
//! decision lives in the library, so these stay a few lines of glue each.

pub mod backlog;
pub mod check;
pub mod debug;
pub mod dispatch;
pub mod init;
pub mod project;
pub mod upgrade;
pub mod workflow;

use flowspec::error::{DomainError, Finding, Severity};
use flowspec::styling::{self, ERROR, ERROR_EMOJI, HINT, SUCCESS, SUCCESS_EMOJI, WARNING, WARNING_EMOJI};

/// Prints a human-readable finding list to stdout, one line per finding.
pub fn print_findings_human(findings: &[Finding]) {
    for finding in findings {
        match finding.severity {
            Severity::Error => styling::println!("{ERROR_EMOJI} {ERROR}{finding}{ERROR:#}"),
            Severity::Warning => styling::println!("{WARNING_EMOJI} {WARNING}{finding}{WARNING:#}"),
        }
    }
}

/// Prints a finding list as a JSON array, for `--json` callers.
pub fn print_findings_json(findings: &[Finding]) {
    let json = serde_json::to_string_pretty(findings).expect("Finding serialization never fails");
    styling::println!("{json}");
}

pub fn print_success(message: &str) {
    styling::println!("{SUCCESS_EMOJI} {SUCCESS}{message}{SUCCESS:#}");
}

pub fn print_hint(message: &str) {
    styling::println!("{HINT}{message}{HINT:#}");
}

/// Uniform error-printing and exit-code path for any [`DomainError`]: used
/// by every handler's `Err` arm so `main` can just `process::exit(code)`.
pub fn report_domain_error(err: &dyn DomainError, json: bool) -> i32 {
    if json {
        let envelope = err.to_json_error();
        let json = serde_json::to_string_pretty(&envelope).expect("JsonError serialization never fails");
        styling::println!("{json}");
    } else {
        let block = styling::format_error_block(&err.to_string(), None, None, err.remediation().as_deref());
        styling::eprint!("{block}");
    }
    err.exit_code()
}
