// src/util.rs — Small text helpers for logs and progress output

/// Longest prefix of `s` that fits in `max_len` bytes without splitting a character.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line preview of model or tool output: whitespace runs collapsed,
/// cut at `max_len` bytes with a trailing `...` when shortened.
pub fn preview(s: &str, max_len: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max_len {
        flat
    } else {
        format!("{}...", truncate_str(&flat, max_len))
    }
}
