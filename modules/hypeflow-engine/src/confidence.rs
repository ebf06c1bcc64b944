/// Score a backend-reported ticker extraction into [0.3, 1.0].
///
/// Base 0.8, then:
/// - +0.1 when a resolved company name came back (the backend recognized
///   the entity rather than pattern-matching).
/// - -0.1 for symbols of 1-2 chars (collide with ordinary words).
/// - +0.05 for symbols of 4+ chars (more specific).
/// - -0.2 when the ticker never appears in the original text.
///
/// The 0.3 floor keeps a backend-reported ticker from being fully
/// distrusted; 1.0 is the probability ceiling.
pub fn extraction_confidence(
    ticker: &str,
    company_name: Option<&str>,
    span_found: bool,
) -> f64 {
    let mut confidence: f64 = 0.8;

    if company_name.is_some_and(|name| !name.trim().is_empty()) {
        confidence += 0.1;
    }

    if ticker.len() <= 2 {
        confidence -= 0.1;
    } else if ticker.len() >= 4 {
        confidence += 0.05;
    }

    if !span_found {
        confidence -= 0.2;
    }

    confidence.clamp(0.3, 1.0)
}
