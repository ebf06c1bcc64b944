mod postgres;

pub use postgres::PgMentionStore;

use anyhow::Result;
use async_trait::async_trait;

use hypeflow_common::{AggregateTickerStats, ContentKind, TickerMention};

/// Persistence seam for mentions and the per-ticker projection.
///
/// Upserts are keyed (kind, content_id, ticker), so re-running extraction
/// or inheritance for a unit supersedes instead of duplicating. Reads
/// return mentions ordered by descending confidence — inheritance relies
/// on that ordering.
#[async_trait]
pub trait MentionStore: Send + Sync {
    async fn upsert_mentions(&self, mentions: &[TickerMention]) -> Result<()>;

    /// Mentions for one content unit, optionally filtered by kind,
    /// highest confidence first.
    async fn mentions_for(
        &self,
        content_id: &str,
        kind: Option<ContentKind>,
    ) -> Result<Vec<TickerMention>>;

    async fn upsert_stats(&self, stats: &AggregateTickerStats) -> Result<()>;

    async fn stats_for(&self, ticker: &str) -> Result<Option<AggregateTickerStats>>;

    /// Checkpoint a unit so an interrupted batch resumes without
    /// reprocessing it.
    async fn mark_processed(&self, content_id: &str, kind: ContentKind) -> Result<()>;

    /// Explicit projection reset; stats are otherwise never deleted.
    async fn reset_stats(&self) -> Result<()>;
}
