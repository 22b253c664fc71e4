//! Consolidated styling module for terminal output.
//!
//! All flowspec output goes to stdout via [`println`]/[`print`]
//! (auto-detecting color support through `anstream`); stderr is reserved
//! for child-process output and interactive prompts.

use anstyle::{AnsiColor, Color, Style};

pub use anstream::{eprint, eprintln, print, println};

/// Error style (red) - use as `{ERROR}text{ERROR:#}`.
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
/// Bold error style, for headlines.
pub const ERROR_BOLD: Style = Style::new()
    .fg_color(Some(Color::Ansi(AnsiColor::Red)))
    .bold();
/// Warning style (yellow).
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
/// Success style (green).
pub const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
/// Hint style (dim).
pub const HINT: Style = Style::new().dimmed();
/// Progress style (cyan).
pub const PROGRESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

pub const ERROR_EMOJI: &str = "\u{274c}"; // ❌
pub const WARNING_EMOJI: &str = "\u{26a0}\u{fe0f}"; // ⚠️
pub const SUCCESS_EMOJI: &str = "\u{2705}"; // ✅
pub const HINT_EMOJI: &str = "\u{1f4a1}"; // 💡
pub const PROGRESS_EMOJI: &str = "\u{1f504}"; // 🔄

/// Renders a uniform error block: headline, location, offending value,
/// remediation hint.
pub fn format_error_block(
    headline: &str,
    location: Option<&str>,
    offending_value: Option<&str>,
    remediation: Option<&str>,
) -> String {
    let mut out = format!("{ERROR_EMOJI} {ERROR_BOLD}{headline}{ERROR_BOLD:#}\n");
    if let Some(loc) = location {
        out.push_str(&format!("  {HINT}at {loc}{HINT:#}\n"));
    }
    if let Some(value) = offending_value {
        out.push_str(&format!("  {HINT}value: {value}{HINT:#}\n"));
    }
    if let Some(hint) = remediation {
        out.push_str(&format!("  {HINT_EMOJI} {HINT}{hint}{HINT:#}\n"));
    }
    out
}
