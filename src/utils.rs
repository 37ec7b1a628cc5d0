//! Small string helpers shared by the parser, the webhook payload and logging.

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep at most `max` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        None => s,
        Some((cut, _)) => &s[..cut],
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render a popularity score for display: thousands separators for whole
/// numbers, one decimal place otherwise.
///
/// ```ignore
/// assert_eq!(format_score(48213.0), "48,213");
/// assert_eq!(format_score(12.5), "12.5");
/// ```
pub fn format_score(score: f64) -> String {
    if !score.is_finite() || score < 0.0 {
        return "0".to_string();
    }
    if score.fract() != 0.0 {
        return format!("{score:.1}");
    }

    let digits = format!("{score:.0}");
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "🔥🔥🔥";
        assert_eq!(truncate_for_log(s, 1), "🔥…(+8 bytes)");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a\n\t b  c "), "a b c");
        assert_eq!(squash_whitespace(""), "");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.0), "0");
        assert_eq!(format_score(999.0), "999");
        assert_eq!(format_score(1000.0), "1,000");
        assert_eq!(format_score(48213.0), "48,213");
        assert_eq!(format_score(1234567.0), "1,234,567");
        assert_eq!(format_score(12.5), "12.5");
        assert_eq!(format_score(-3.0), "0");
        assert_eq!(format_score(f64::NAN), "0");
    }
}
