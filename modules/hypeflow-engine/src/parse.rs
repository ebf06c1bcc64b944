use ai_client::util::strip_code_blocks;

/// Pull a JSON object out of a model response that may be wrapped in
/// markdown fences or surrounded by commentary.
///
/// Returns the validated JSON text, or `None` when nothing in the response
/// parses. Validation here is syntactic only; field-level checks belong to
/// the caller's serde target.
pub fn clean_json_payload(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let stripped = strip_code_blocks(raw);

    // Prefer the outermost { .. } window: models like to preface payloads
    // with prose ("Here is the JSON you asked for: {...}").
    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
        if end > start {
            let window = &stripped[start..=end];
            if serde_json::from_str::<serde_json::Value>(window).is_ok() {
                return Some(window.to_string());
            }
        }
    }

    // Otherwise the whole stripped response has to be the payload.
    if serde_json::from_str::<serde_json::Value>(stripped).is_ok() {
        return Some(stripped.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_passes_through() {
        assert_eq!(
            clean_json_payload(r#"{"tickers": []}"#).as_deref(),
            Some(r#"{"tickers": []}"#)
        );
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"contextual_hype\": 0.85}\n```";
        assert_eq!(
            clean_json_payload(raw).as_deref(),
            Some(r#"{"contextual_hype": 0.85}"#)
        );
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let raw = "Sure! Here is the result: {\"hype_score\": 0.4} Hope that helps.";
        assert_eq!(
            clean_json_payload(raw).as_deref(),
            Some(r#"{"hype_score": 0.4}"#)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(clean_json_payload("no json here at all"), None);
        assert_eq!(clean_json_payload("{broken: json"), None);
        assert_eq!(clean_json_payload(""), None);
        assert_eq!(clean_json_payload("   "), None);
    }

    #[test]
    fn unbalanced_braces_in_prose() {
        // rfind('}') lands before find('{'); must not panic or slice badly.
        assert_eq!(clean_json_payload("} weird {"), None);
    }
}
