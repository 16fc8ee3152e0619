//! JSON string escaping for journal text.
//!
//! Only five characters are escaped: backslash, newline, carriage return,
//! tab and double quote. Any other control character is passed through
//! untouched, so journal output containing e.g. a bell (`\u{7}`) yields a
//! string that a strict JSON parser will reject. This mirrors the behavior
//! the central service already receives from deployed devices.

/// Escape `raw` so it can be embedded between quotes as a JSON string value.
///
/// Backslash is replaced first so later substitutions are never re-escaped.
pub fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}
