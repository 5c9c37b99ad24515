//! Output normalization and rejection detection, per spec §4.3 steps
//! 2f-2g.

/// The global reject-substring list (case-insensitive), checked against
/// every adapter's normalized output regardless of its own
/// `rejectOutputSubstrings`.
pub const GLOBAL_REJECT_SUBSTRINGS: &[&str] = &[
    "authorization failed",
    "check your login status",
    "authentication required",
    "not authenticated",
    "not logged in",
    "please log in",
    "please login",
    "unauthorized",
];

/// Strip ANSI CSI escape sequences (`ESC [ ... <final byte>`), convert
/// CRLF to LF, and trim. Idempotent: `normalize(normalize(x)) ==
/// normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let stripped = strip_ansi_csi(raw);
    let unified = stripped.replace("\r\n", "\n");
    unified.trim().to_string()
}

fn strip_ansi_csi(input: &str) -> String {
    const ESC: char = '\u{1b}';
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESC && chars.peek() == Some(&'[') {
            chars.next();
            // Consume parameter/intermediate bytes up to and including
            // the final byte (0x40-0x7E, i.e. '@'..='~').
            for next in chars.by_ref() {
                if ('@'..='~').contains(&next) {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Does the normalized output match any reject substring (global plus
/// adapter-specific), case-insensitively? Returns the first matched
/// snippet, if any.
pub fn matched_reject_substring<'a>(
    normalized: &str,
    adapter_specific: &'a [String],
) -> Option<String> {
    let lower = normalized.to_lowercase();
    for needle in GLOBAL_REJECT_SUBSTRINGS {
        if lower.contains(needle) {
            return Some((*needle).to_string());
        }
    }
    for needle in adapter_specific {
        if lower.contains(&needle.to_lowercase()) {
            return Some(needle.clone());
        }
    }
    None
}

/// The chosen convention (Open Question 1, see DESIGN.md): a reviewer
/// output is rejected if the adapter's structured `rejected` field says
/// so when present, else by a case-insensitive `"reject"` substring
/// match on the normalized output.
pub fn is_reviewer_rejection(normalized_output: &str, structured_rejected: Option<bool>) -> bool {
    match structured_rejected {
        Some(flag) => flag,
        None => normalized_output.to_lowercase().contains("reject"),
    }
}
