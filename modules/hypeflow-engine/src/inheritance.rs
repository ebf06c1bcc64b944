use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use hypeflow_common::{ContentKind, ContentUnit, MentionMethod, TickerMention};

use crate::hype::HypeAnalyzer;
use crate::store::MentionStore;

/// Hype score below this suppresses contextual inheritance — only clearly
/// enthusiastic replies inherit the post's tickers.
pub const HYPE_INHERITANCE_THRESHOLD: f64 = 0.3;

/// Ceiling for contextually inherited confidence; a derived mention must
/// never match a genuine direct extraction.
pub const CONTEXTUAL_CONFIDENCE_CAP: f64 = 0.75;

/// Ceiling and per-hop decay for ancestor-confidence inheritance.
pub const ANCESTOR_CONFIDENCE_CAP: f64 = 0.5;
pub const ANCESTOR_DECAY: f64 = 0.8;

/// Propagates ticker assignments to a unit that mentioned none directly.
///
/// Two strategies, in precedence order:
/// 1. Contextual hype: the owning post has `post`-kind mentions and the
///    reply's own text scores at or above the hype threshold.
/// 2. Ancestor confidence: the direct parent has mentions; copy them with
///    strict decay. Ignores the child's content entirely, hence the lower
///    cap.
///
/// Derived mentions are upserted by the caller on the same
/// (kind, content_id, ticker) key, so re-running is idempotent.
pub struct InheritanceEngine {
    analyzer: HypeAnalyzer,
    store: Arc<dyn MentionStore>,
}

impl InheritanceEngine {
    pub fn new(analyzer: HypeAnalyzer, store: Arc<dyn MentionStore>) -> Self {
        Self { analyzer, store }
    }

    pub async fn inherit(&self, unit: &ContentUnit) -> Result<Vec<TickerMention>> {
        if let Some(ref post_id) = unit.post_id {
            let post_mentions = self
                .store
                .mentions_for(post_id, Some(ContentKind::Post))
                .await?;

            if !post_mentions.is_empty() {
                let hype = self.analyzer.hype(&unit.text).await;
                if hype >= HYPE_INHERITANCE_THRESHOLD {
                    let inherited = contextual_mentions(unit, post_id, &post_mentions, hype);
                    info!(
                        content_id = %unit.id,
                        post_id = %post_id,
                        hype,
                        count = inherited.len(),
                        "Contextual hype inheritance"
                    );
                    return Ok(inherited);
                }
                debug!(content_id = %unit.id, hype, "Hype below inheritance threshold");
            }
        }

        // Fallback: soften whatever the direct parent carries.
        if let Some(ref parent_id) = unit.parent_id {
            let parent_mentions = self.store.mentions_for(parent_id, None).await?;
            if !parent_mentions.is_empty() {
                let inherited = ancestor_mentions(unit, parent_id, &parent_mentions);
                info!(
                    content_id = %unit.id,
                    parent_id = %parent_id,
                    count = inherited.len(),
                    "Ancestor confidence inheritance"
                );
                return Ok(inherited);
            }
        }

        // Nothing to inherit from — a normal outcome, not an error.
        Ok(Vec::new())
    }
}

fn contextual_mentions(
    unit: &ContentUnit,
    post_id: &str,
    post_mentions: &[TickerMention],
    hype: f64,
) -> Vec<TickerMention> {
    post_mentions
        .iter()
        .map(|source| TickerMention {
            kind: unit.kind,
            content_id: unit.id.clone(),
            ticker: source.ticker.clone(),
            confidence: (hype + 0.2).min(CONTEXTUAL_CONFIDENCE_CAP),
            method: MentionMethod::ContextualInherited,
            span: None,
            hype_score: Some(hype),
            company_name: source.company_name.clone(),
            inherited_from: Some(post_id.to_string()),
        })
        .collect()
}

fn ancestor_mentions(
    unit: &ContentUnit,
    parent_id: &str,
    parent_mentions: &[TickerMention],
) -> Vec<TickerMention> {
    parent_mentions
        .iter()
        .map(|source| TickerMention {
            kind: unit.kind,
            content_id: unit.id.clone(),
            ticker: source.ticker.clone(),
            confidence: (source.confidence * ANCESTOR_DECAY).min(ANCESTOR_CONFIDENCE_CAP),
            method: MentionMethod::Inherited,
            span: None,
            hype_score: None,
            company_name: source.company_name.clone(),
            inherited_from: Some(parent_id.to_string()),
        })
        .collect()
}
