//! Small text helpers shared by the derivation code.

/// Truncate to at most `max` characters, appending an ellipsis when
/// anything was cut. Char-based so multi-byte text is never split.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

/// Collapse runs of whitespace into single spaces and trim the ends.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim and cap free-text input before it reaches the store.
#[must_use]
pub fn clamp(raw: &str, max_chars: usize) -> String {
    raw.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate_chars("hello", 140), "hello");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate_chars("abcdef", 3), "abc…");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("가나다라", 2), "가나…");
    }

    #[test]
    fn collapse_squeezes_runs() {
        assert_eq!(collapse_whitespace("  a \n b\t\tc "), "a b c");
    }

    #[test]
    fn clamp_trims_then_caps() {
        assert_eq!(clamp("  hello  ", 3), "hel");
    }
}
