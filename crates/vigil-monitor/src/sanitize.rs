use std::sync::OnceLock;

use regex::Regex;

// CSI (7-bit and 8-bit introducer), OSC terminated by BEL or ST, charset
// selectors, other two-byte escapes, then any stray ESC.
const ESCAPE_PATTERN: &str = concat!(
    r"\x1b\[[0-?]*[ -/]*[@-~]",
    r"|\x{9b}[0-?]*[ -/]*[@-~]",
    r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
    r"|\x1b[()#][0-9A-Za-z]",
    r"|\x1b[@-Z\\-_=>]",
    r"|\x1b",
);

fn escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ESCAPE_PATTERN).expect("escape pattern compiles"))
}

/// Cleans one raw log line for display.
///
/// Returns `None` for lines that carry nothing for a viewer: blank lines and
/// a bare `>` console prompt.
pub fn sanitize_line(raw: &str) -> Option<String> {
    // Only `\n` and `\r\n` end a line; a lone trailing `\r` is an overwrite.
    let line = match raw.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => raw,
    };

    let stripped = escape_regex().replace_all(line, "");

    // Progress-bar style overwrites: only the text after the last CR is visible.
    let visible = match stripped.rfind('\r') {
        Some(i) => &stripped[i + 1..],
        None => &stripped[..],
    };

    let trimmed = visible.trim();
    if trimmed.is_empty() || trimmed == ">" {
        return None;
    }
    Some(visible.to_string())
}

pub fn sanitize_lines<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|l| sanitize_line(l.as_ref()))
        .collect()
}
