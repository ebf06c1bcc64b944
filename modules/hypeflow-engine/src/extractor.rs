use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ai_client::util::truncate_to_char_boundary;
use hypeflow_common::{
    ContentUnit, HypeflowError, MentionMethod, SymbolDirectory, TickerMention,
};

use crate::backend::CompletionBackend;
use crate::confidence::extraction_confidence;
use crate::parse::clean_json_payload;
use crate::span::find_ticker_span;

/// Byte budget for text sent to the backend. Keeps long post bodies under
/// token limits; truncation lands on a char boundary.
const CONTENT_BYTE_BUDGET: usize = 30_000;

/// What the backend returns for one analyzed text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub tickers: Vec<ReportedTicker>,
    /// Overall enthusiasm of the text, 0.0-1.0.
    #[serde(default)]
    pub hype_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportedTicker {
    /// Exchange symbol, e.g. "TSLA"
    pub symbol: String,
    /// Resolved company name, empty when unrecognized
    #[serde(default)]
    pub name: String,
}

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a stock-ticker extractor for social-media financial discussion.

CRITICAL: Respond with ONLY valid JSON. No explanations, no commentary, no markdown.

Your job: find every publicly traded security the text is talking about.

## Rules
- Report the exchange symbol in uppercase (e.g. TSLA, AAPL, BRK.B).
- Include cashtag mentions ($TSLA), bare symbols (TSLA), and company names
  the text clearly refers to ("Tesla" -> TSLA).
- Set "name" to the company's full name when you recognize the entity;
  leave it empty otherwise.
- Ignore option chains, price targets, and dates — only the securities.
- Do NOT invent tickers for generic words (ALL, CEO, YOLO, DD are not tickers).

## Hype score
Also rate the overall enthusiasm of the text from 0.0 to 1.0:
0.00-0.29 neutral or negative, 0.30-0.49 mildly positive,
0.50-0.69 excited, 0.70-0.89 highly enthusiastic, 0.90-1.00 extreme hype
(rockets, "diamond hands", "to the moon", ALL CAPS, !!!).

## Output format
{"tickers": [{"symbol": "TSLA", "name": "Tesla Inc."}], "hype_score": 0.85}

Return {"tickers": [], "hype_score": 0.0} when no securities are mentioned."#;

/// Direct ticker extraction for a single content unit.
///
/// All failure modes — backend unreachable, malformed payload after the one
/// permitted retry, empty ticker list — degrade to an empty vec. Callers
/// treat empty as "no direct tickers", never as a hard failure.
pub struct DirectExtractor {
    backend: Arc<dyn CompletionBackend>,
    directory: Option<SymbolDirectory>,
}

impl DirectExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            directory: None,
        }
    }

    /// Validate backend-reported symbols against a known-symbol directory,
    /// dropping anything it does not list.
    pub fn with_directory(mut self, directory: SymbolDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub async fn extract(&self, unit: &ContentUnit) -> Vec<TickerMention> {
        let text = unit.text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let Some(response) = self.fetch_response(text).await else {
            return Vec::new();
        };

        let mut mentions = Vec::new();
        for reported in response.tickers {
            let symbol = reported.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }

            if let Some(ref directory) = self.directory {
                if !directory.contains(&symbol) {
                    debug!(content_id = %unit.id, ticker = %symbol, "Dropped unknown symbol");
                    continue;
                }
            }

            let span = find_ticker_span(text, &symbol);
            let company_name = if reported.name.trim().is_empty() {
                None
            } else {
                Some(reported.name.trim().to_string())
            };
            let confidence =
                extraction_confidence(&symbol, company_name.as_deref(), span.is_some());
            let method = if span.is_some() {
                MentionMethod::SymbolMatch
            } else {
                MentionMethod::KeywordMatch
            };

            mentions.push(TickerMention {
                kind: unit.kind,
                content_id: unit.id.clone(),
                ticker: symbol,
                confidence,
                method,
                span,
                hype_score: Some(response.hype_score.clamp(0.0, 1.0)),
                company_name,
                inherited_from: None,
            });
        }

        collapse_to_best(mentions)
    }

    /// Call the backend, tolerating one retry on a malformed payload.
    async fn fetch_response(&self, text: &str) -> Option<ExtractionResponse> {
        let content = truncate_to_char_boundary(text, CONTENT_BYTE_BUDGET);

        for attempt in 0..2 {
            let raw = match self.backend.request(EXTRACTION_SYSTEM_PROMPT, content).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "Extraction backend call failed");
                    return None;
                }
            };

            match parse_extraction_payload(&raw) {
                Ok(response) => return Some(response),
                Err(e) if attempt == 0 => {
                    warn!(error = %e, "Extraction payload unparseable, retrying once");
                }
                Err(e) => {
                    warn!(error = %e, "Extraction payload unparseable after retry");
                    return None;
                }
            }
        }

        None
    }
}

/// Single-attempt parse of a raw backend reply into the extraction contract.
fn parse_extraction_payload(raw: &str) -> Result<ExtractionResponse, HypeflowError> {
    let payload = clean_json_payload(raw).ok_or_else(|| {
        HypeflowError::MalformedResponse(format!(
            "no JSON object in reply: {}",
            truncate_to_char_boundary(raw, 200)
        ))
    })?;
    serde_json::from_str(&payload)
        .map_err(|e| HypeflowError::MalformedResponse(format!("wrong shape: {e}")))
}

/// Collapse duplicate tickers to the single highest-confidence occurrence.
/// Pure function over the in-memory list; storage never sees duplicates.
pub fn collapse_to_best(mentions: Vec<TickerMention>) -> Vec<TickerMention> {
    let mut best: HashMap<String, TickerMention> = HashMap::new();
    for mention in mentions {
        match best.get(&mention.ticker) {
            Some(existing) if existing.confidence >= mention.confidence => {}
            _ => {
                best.insert(mention.ticker.clone(), mention);
            }
        }
    }
    let mut collapsed: Vec<TickerMention> = best.into_values().collect();
    collapsed.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hypeflow_common::{ContentKind, Span};

    use crate::testing::MockBackend;

    fn unit(text: &str) -> ContentUnit {
        ContentUnit {
            id: "p1".into(),
            text: text.into(),
            parent_id: None,
            post_id: None,
            kind: ContentKind::Post,
            created_at: Utc::now(),
        }
    }

    fn mention(ticker: &str, confidence: f64) -> TickerMention {
        TickerMention {
            kind: ContentKind::Post,
            content_id: "p1".into(),
            ticker: ticker.into(),
            confidence,
            method: MentionMethod::SymbolMatch,
            span: Some(Span { start: 0, end: 4 }),
            hype_score: None,
            company_name: None,
            inherited_from: None,
        }
    }

    #[test]
    fn collapse_keeps_highest_confidence() {
        let collapsed = collapse_to_best(vec![
            mention("TSLA", 0.7),
            mention("TSLA", 0.9),
            mention("TSLA", 0.8),
            mention("AAPL", 0.5),
        ]);

        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].ticker, "TSLA");
        assert!((collapsed[0].confidence - 0.9).abs() < 1e-9);
        assert_eq!(collapsed[1].ticker, "AAPL");
    }

    #[tokio::test]
    async fn extracts_and_scores_reported_tickers() {
        let backend = Arc::new(MockBackend::with_responses(vec![
            r#"{"tickers": [{"symbol": "tsla", "name": "Tesla Inc."}], "hype_score": 0.9}"#.into(),
        ]));
        let extractor = DirectExtractor::new(backend);

        let mentions = extractor.extract(&unit("YOLO $TSLA 300C diamond hands")).await;

        assert_eq!(mentions.len(), 1);
        let m = &mentions[0];
        assert_eq!(m.ticker, "TSLA");
        assert_eq!(m.method, MentionMethod::SymbolMatch);
        assert_eq!(m.company_name.as_deref(), Some("Tesla Inc."));
        assert_eq!(m.hype_score, Some(0.9));
        // span found, name present, 4 chars: 0.8 + 0.1 + 0.05 = 0.95
        assert!((m.confidence - 0.95).abs() < 1e-9);
        let span = m.span.unwrap();
        assert_eq!(span, Span { start: 5, end: 10 });
    }

    #[tokio::test]
    async fn hallucinated_ticker_gets_keyword_method_and_penalty() {
        let backend = Arc::new(MockBackend::with_responses(vec![
            r#"{"tickers": [{"symbol": "GME", "name": ""}], "hype_score": 0.2}"#.into(),
        ]));
        let extractor = DirectExtractor::new(backend);

        let mentions = extractor.extract(&unit("market looks flat today")).await;

        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].method, MentionMethod::KeywordMatch);
        assert_eq!(mentions[0].span, None);
        // no span, no name, 3 chars: 0.8 - 0.2 = 0.6
        assert!((mentions[0].confidence - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn recovers_on_second_attempt() {
        let backend = Arc::new(MockBackend::with_responses(vec![
            "I think the tickers are TSLA and maybe others".into(),
            "```json\n{\"tickers\": [{\"symbol\": \"TSLA\", \"name\": \"\"}], \"hype_score\": 0.5}\n```".into(),
        ]));
        let extractor = DirectExtractor::new(backend.clone());

        let mentions = extractor.extract(&unit("$TSLA to the moon")).await;

        assert_eq!(mentions.len(), 1);
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn unparseable_payload_is_a_malformed_response_error() {
        let err = parse_extraction_payload("no json here").unwrap_err();
        assert!(matches!(err, HypeflowError::MalformedResponse(_)));

        let err = parse_extraction_payload(r#"{"tickers": "not-a-list"}"#).unwrap_err();
        assert!(matches!(err, HypeflowError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn gives_up_after_retry() {
        let backend = Arc::new(MockBackend::with_responses(vec![
            "not json".into(),
            "still not json".into(),
        ]));
        let extractor = DirectExtractor::new(backend.clone());

        assert!(extractor.extract(&unit("$TSLA calls")).await.is_empty());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn backend_failure_resolves_to_empty() {
        let backend = Arc::new(MockBackend::failing());
        let extractor = DirectExtractor::new(backend);

        assert!(extractor.extract(&unit("$TSLA calls")).await.is_empty());
    }

    #[tokio::test]
    async fn empty_text_skips_backend() {
        let backend = Arc::new(MockBackend::failing());
        let extractor = DirectExtractor::new(backend.clone());

        assert!(extractor.extract(&unit("   ")).await.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn directory_filters_unknown_symbols() {
        let backend = Arc::new(MockBackend::with_responses(vec![
            r#"{"tickers": [{"symbol": "TSLA", "name": ""}, {"symbol": "ZZZZ", "name": ""}], "hype_score": 0.4}"#.into(),
        ]));
        let mut directory = SymbolDirectory::new();
        directory.insert_many(["TSLA"]);
        let extractor = DirectExtractor::new(backend).with_directory(directory);

        let mentions = extractor.extract(&unit("$TSLA vs ZZZZ")).await;

        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].ticker, "TSLA");
    }
}
