//! Text shaping for typed and generated content

/// Drop characters outside the Basic Multilingual Plane.
///
/// The automation driver cannot type them (emoji, rare CJK extensions).
pub fn strip_non_bmp(text: &str) -> String {
    text.chars().filter(|c| (*c as u32) <= 0xFFFF).collect()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Collapse runs of whitespace into single spaces
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
