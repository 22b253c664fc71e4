//! In-memory verbose log ring buffer.
//!
//! When `-v`/`-vv` is passed, log lines are mirrored here in addition to
//! going through `env_logger` to stderr, so `flow debug diagnostic` can
//! embed recent log output without re-running the command.

use std::sync::{Mutex, OnceLock};
use std::collections::VecDeque;

/// Maximum number of lines retained; oldest lines are dropped first.
const CAPACITY: usize = 500;

static BUFFER: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn buffer() -> &'static Mutex<VecDeque<String>> {
    BUFFER.get_or_init(|| Mutex::new(VecDeque::with_capacity(CAPACITY)))
}

/// Appends a plain-text (no ANSI) log line to the ring buffer.
pub fn write_line(line: &str) {
    if let Ok(mut buf) = buffer().lock() {
        if buf.len() == CAPACITY {
            buf.pop_front();
        }
        buf.push_back(line.to_string());
    }
}

/// Returns the buffered lines joined by newlines, oldest first.
pub fn contents() -> String {
    buffer()
        .lock()
        .map(|buf| buf.iter().cloned().collect::<Vec<_>>().join("\n"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_line_is_retrievable() {
        write_line("a unique marker line for this test");
        assert!(contents().contains("a unique marker line for this test"));
    }
}
