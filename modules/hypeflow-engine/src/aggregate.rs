use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use hypeflow_common::{AggregateTickerStats, TickerMention};

use crate::store::MentionStore;

/// Folds mentions into the per-ticker summary projection.
///
/// Updates are read-modify-write, so callers must funnel them through a
/// single writer (the batch runner applies them sequentially). A store
/// failure here is logged and swallowed: extraction results are already
/// persisted and must not be discarded because the stats projection lagged.
pub struct Aggregator {
    store: Arc<dyn MentionStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn MentionStore>) -> Self {
        Self { store }
    }

    pub async fn update(&self, mentions: &[TickerMention], now: DateTime<Utc>) {
        for mention in mentions {
            if let Err(e) = self.absorb_one(mention, now).await {
                warn!(
                    ticker = %mention.ticker,
                    error = %e,
                    "Ticker stats update failed; extraction results unaffected"
                );
            }
        }
    }

    async fn absorb_one(&self, mention: &TickerMention, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut stats = self
            .store
            .stats_for(&mention.ticker)
            .await?
            .unwrap_or_else(|| AggregateTickerStats::new(&mention.ticker, now));
        stats.absorb(mention, now);
        self.store.upsert_stats(&stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypeflow_common::{ContentKind, MentionMethod};

    use crate::testing::MemoryStore;

    fn mention(ticker: &str, kind: ContentKind, hype: Option<f64>) -> TickerMention {
        TickerMention {
            kind,
            content_id: "x1".into(),
            ticker: ticker.into(),
            confidence: 0.9,
            method: MentionMethod::SymbolMatch,
            span: None,
            hype_score: hype,
            company_name: None,
            inherited_from: None,
        }
    }

    #[tokio::test]
    async fn running_average_over_two_updates() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Aggregator::new(store.clone());
        let now = Utc::now();

        aggregator
            .update(&[mention("TSLA", ContentKind::Post, Some(0.8))], now)
            .await;
        aggregator
            .update(&[mention("TSLA", ContentKind::Comment, Some(0.6))], now)
            .await;

        let stats = store.stats_for("TSLA").await.unwrap().unwrap();
        assert_eq!(stats.total_mentions, 2);
        assert_eq!(stats.post_mentions, 1);
        assert_eq!(stats.comment_mentions, 1);
        assert!((stats.avg_hype_score - 0.70).abs() < 1e-9);
        assert!((stats.max_hype_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn separate_tickers_stay_separate() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Aggregator::new(store.clone());
        let now = Utc::now();

        aggregator
            .update(
                &[
                    mention("TSLA", ContentKind::Post, Some(0.5)),
                    mention("AAPL", ContentKind::Post, Some(0.2)),
                ],
                now,
            )
            .await;

        assert_eq!(store.stats_for("TSLA").await.unwrap().unwrap().total_mentions, 1);
        assert_eq!(store.stats_for("AAPL").await.unwrap().unwrap().total_mentions, 1);
    }

    #[tokio::test]
    async fn replay_reconstructs_projection() {
        let now = Utc::now();
        let mentions = vec![
            mention("GME", ContentKind::Post, Some(0.9)),
            mention("GME", ContentKind::Comment, Some(0.3)),
            mention("GME", ContentKind::Comment, None),
        ];

        let store_a = Arc::new(MemoryStore::new());
        let aggregator = Aggregator::new(store_a.clone());
        for m in &mentions {
            aggregator.update(std::slice::from_ref(m), now).await;
        }

        // Reset and replay the same mention stream.
        store_a.reset_stats().await.unwrap();
        for m in &mentions {
            aggregator.update(std::slice::from_ref(m), now).await;
        }

        let replayed = store_a.stats_for("GME").await.unwrap().unwrap();
        assert_eq!(replayed.total_mentions, 3);
        assert!((replayed.avg_hype_score - 0.4).abs() < 1e-9);
        assert!((replayed.max_hype_score - 0.9).abs() < 1e-9);
    }
}
