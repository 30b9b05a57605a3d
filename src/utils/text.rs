/// Usable characters in a lobby name or password field
pub const FIXED_FIELD_CHARS: usize = 35;

/// Characters compared when matching client display names
pub const NAME_COMPARE_CHARS: usize = 16;

/// Truncate to at most `max_chars` characters
pub fn truncate_fixed(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Compare two display names on their first `NAME_COMPARE_CHARS` characters
pub fn names_match(a: &str, b: &str) -> bool {
    a.chars()
        .take(NAME_COMPARE_CHARS)
        .eq(b.chars().take(NAME_COMPARE_CHARS))
}

/// Interpret text as a serial number.
/// Accepts decimal, `0x`-prefixed hex, and leading-zero octal. Zero means "no serial".
pub fn parse_serial_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    };
    parsed.filter(|&serial| serial != 0)
}
