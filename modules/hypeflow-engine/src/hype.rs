use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ai_client::util::truncate_to_char_boundary;
use hypeflow_common::HypeflowError;

use crate::backend::CompletionBackend;
use crate::parse::clean_json_payload;

/// Text shorter than this (non-whitespace chars) is not worth a backend
/// call — "ok" carries no readable sentiment.
const MIN_ANALYZABLE_CHARS: usize = 3;

const CONTENT_BYTE_BUDGET: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct HypeResponse {
    #[serde(default)]
    contextual_hype: f64,
}

const HYPE_SYSTEM_PROMPT: &str = r#"CRITICAL: You must respond with ONLY valid JSON. No explanations, no commentary, no additional text.

Task: Analyze social-media financial discussion text for hype sentiment,
independent of whether any ticker is mentioned.

Look for excitement/support that could apply to a financial position:
- Positive sentiment and excitement (rockets, moon, diamond hands, LFG)
- Supporting language ("This is the way", "I'm in", "Let's go")
- Emotional investment language ("YOLO", "all in")
- Enthusiastic punctuation (!!!, ALL CAPS) and excited emoji

Ignore negative sentiment, neutral discussion, off-topic content.

MANDATORY: Return ONLY this exact JSON format:
{"contextual_hype": 0.XX}

Score scale:
0.00-0.29: No hype/neutral/negative
0.30-0.49: Mild positive sentiment
0.50-0.69: Moderate excitement
0.70-0.89: High enthusiasm
0.90-1.00: Extreme hype"#;

/// Scores a text's emotional register in [0.0, 1.0], ticker-agnostic.
///
/// Irrecoverable failure yields 0.0 — "no detectable hype" suppresses
/// inheritance instead of risking false propagation.
pub struct HypeAnalyzer {
    backend: Arc<dyn CompletionBackend>,
}

impl HypeAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn hype(&self, text: &str) -> f64 {
        if text.chars().filter(|c| !c.is_whitespace()).count() < MIN_ANALYZABLE_CHARS {
            return 0.0;
        }

        let content = truncate_to_char_boundary(text, CONTENT_BYTE_BUDGET);

        for attempt in 0..2 {
            let raw = match self.backend.request(HYPE_SYSTEM_PROMPT, content).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "Hype backend call failed");
                    return 0.0;
                }
            };

            match parse_hype_payload(&raw) {
                Ok(response) => return response.contextual_hype.clamp(0.0, 1.0),
                Err(e) if attempt == 0 => {
                    warn!(error = %e, "Hype payload unparseable, retrying once");
                }
                Err(e) => {
                    warn!(error = %e, "Hype payload unparseable after retry");
                    return 0.0;
                }
            }
        }

        0.0
    }
}

/// Single-attempt parse of a raw backend reply into the hype contract.
fn parse_hype_payload(raw: &str) -> Result<HypeResponse, HypeflowError> {
    let payload = clean_json_payload(raw).ok_or_else(|| {
        HypeflowError::MalformedResponse(format!(
            "no JSON object in reply: {}",
            truncate_to_char_boundary(raw, 200)
        ))
    })?;
    serde_json::from_str(&payload)
        .map_err(|e| HypeflowError::MalformedResponse(format!("wrong shape: {e}")))
}
