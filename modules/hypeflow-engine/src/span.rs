use hypeflow_common::Span;
use regex::RegexBuilder;

/// Locate a ticker's position in text, preferring the least ambiguous form.
///
/// Strategies in priority order:
/// 1. `$TICKER` — cashtag form, word-bounded, case-insensitive.
/// 2. Standalone `TICKER` as a bounded word, case-insensitive.
/// 3. First case-insensitive substring occurrence.
///
/// An explicit cashtag is unambiguous signal; an incidental substring hit
/// is barely signal at all, so the ordering matters.
pub fn find_ticker_span(text: &str, ticker: &str) -> Option<Span> {
    if text.is_empty() || ticker.is_empty() {
        return None;
    }

    let escaped = regex::escape(ticker);

    // The plain-substring fallback goes through the regex machinery too:
    // searching an uppercased copy would yield byte offsets that drift on
    // non-ASCII text whose uppercase changes length.
    for pattern in [
        format!(r"\${escaped}\b"),
        format!(r"\b{escaped}\b"),
        escaped,
    ] {
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .ok()?;
        if let Some(m) = re.find(text) {
            return Some(Span {
                start: m.start(),
                end: m.end(),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_cashtag_over_plain_word() {
        let text = "TSLA is mooning, I bought $TSLA calls";
        let span = find_ticker_span(text, "TSLA").unwrap();
        assert_eq!(&text[span.start..span.end], "$TSLA");
    }

    #[test]
    fn word_bounded_match() {
        let text = "thoughts on GME today?";
        let span = find_ticker_span(text, "gme").unwrap();
        assert_eq!(&text[span.start..span.end], "GME");
    }

    #[test]
    fn word_boundary_rejects_embedded_hit_until_fallback() {
        // No standalone occurrence; substring fallback still locates it.
        let text = "GMERICA to the moon";
        let span = find_ticker_span(text, "GME").unwrap();
        assert_eq!(span, Span { start: 0, end: 3 });
    }

    #[test]
    fn case_insensitive_substring_fallback() {
        let text = "loving my aaplcalls";
        let span = find_ticker_span(text, "AAPL").unwrap();
        assert_eq!(&text[span.start..span.end], "aapl");
    }

    #[test]
    fn fallback_offsets_survive_case_folding_length_changes() {
        // 'ı' uppercases to a shorter byte sequence, so offsets computed
        // against an uppercased copy would point at the wrong bytes here.
        let text = "mısır aaplcalls";
        let span = find_ticker_span(text, "AAPL").unwrap();
        assert_eq!(&text[span.start..span.end], "aapl");
    }

    #[test]
    fn not_found() {
        assert_eq!(find_ticker_span("no tickers here", "TSLA"), None);
        assert_eq!(find_ticker_span("", "TSLA"), None);
        assert_eq!(find_ticker_span("text", ""), None);
    }
}
