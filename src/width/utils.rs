/// Compute the display width of a string after stripping ANSI escapes.
pub fn display_width(text: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(printable(text).as_str())
}

/// Strip ANSI escapes and control characters so block text cannot move the
/// terminal cursor or recolor neighbouring blocks.
pub fn printable(text: &str) -> String {
    let clean = strip_ansi_escapes::strip(text);
    String::from_utf8_lossy(&clean)
        .chars()
        .filter(|ch| !ch.is_control())
        .collect()
}
