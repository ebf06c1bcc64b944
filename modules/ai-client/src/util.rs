/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code fences from a model response.
///
/// Models sometimes wrap JSON payloads in ```json ... ``` fences even when
/// told not to. This peels a leading/trailing fence and surrounding
/// whitespace, leaving the payload (or the response unchanged if no fence).
pub fn strip_code_blocks(response: &str) -> &str {
    let mut s = response.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_char_boundary() {
        let text = "hype 🚀🚀";
        let truncated = truncate_to_char_boundary(text, 7);
        assert!(truncated.len() <= 7);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_to_char_boundary("abc", 100), "abc");
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_blocks("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
