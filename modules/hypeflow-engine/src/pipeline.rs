use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::{stream, StreamExt};
use tracing::{info, warn};

use hypeflow_common::{ContentKind, ContentUnit, TickerMention};

use crate::aggregate::Aggregator;
use crate::extractor::DirectExtractor;
use crate::inheritance::InheritanceEngine;
use crate::store::MentionStore;

/// How one content unit resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Direct extraction found tickers; count attached.
    Direct(usize),
    /// No direct tickers, but inheritance produced derived mentions.
    Inherited(usize),
    /// Neither path produced anything.
    NoTickers,
}

/// Counters for one batch run.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub units_processed: u32,
    pub posts_processed: u32,
    pub comments_processed: u32,
    pub direct_mentions: u32,
    pub inherited_mentions: u32,
    pub no_ticker_units: u32,
    pub failed_units: u32,
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Batch Run Complete ===")?;
        writeln!(f, "Units processed:    {}", self.units_processed)?;
        writeln!(f, "  Posts:            {}", self.posts_processed)?;
        writeln!(f, "  Comments:         {}", self.comments_processed)?;
        writeln!(f, "Direct mentions:    {}", self.direct_mentions)?;
        writeln!(f, "Inherited mentions: {}", self.inherited_mentions)?;
        writeln!(f, "No-ticker units:    {}", self.no_ticker_units)?;
        writeln!(f, "Failed units:       {}", self.failed_units)
    }
}

/// The per-unit extraction-then-inheritance flow, plus the batch runner.
///
/// Per unit: direct extraction wins outright; a reply with no direct
/// tickers gets one shot at inheritance; everything else records as
/// ticker-less. Failures are unit-scoped — one bad unit never aborts its
/// siblings.
pub struct Pipeline {
    extractor: DirectExtractor,
    inheritance: InheritanceEngine,
    aggregator: Aggregator,
    store: Arc<dyn MentionStore>,
    max_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        extractor: DirectExtractor,
        inheritance: InheritanceEngine,
        aggregator: Aggregator,
        store: Arc<dyn MentionStore>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            inheritance,
            aggregator,
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn process_unit(&self, unit: &ContentUnit) -> Result<UnitOutcome> {
        let outcome = self.analyze(unit).await;

        // Checkpoint even on failure so a restart resumes past the unit
        // instead of looping on it.
        if let Err(e) = self.store.mark_processed(&unit.id, unit.kind).await {
            warn!(content_id = %unit.id, error = %e, "Checkpoint write failed");
        }

        outcome
    }

    async fn analyze(&self, unit: &ContentUnit) -> Result<UnitOutcome> {
        let direct = self.extractor.extract(unit).await;
        if !direct.is_empty() {
            self.commit(&direct).await?;
            return Ok(UnitOutcome::Direct(direct.len()));
        }

        if unit.kind == ContentKind::Comment {
            let inherited = self.inheritance.inherit(unit).await?;
            if !inherited.is_empty() {
                self.commit(&inherited).await?;
                return Ok(UnitOutcome::Inherited(inherited.len()));
            }
        }

        Ok(UnitOutcome::NoTickers)
    }

    async fn commit(&self, mentions: &[TickerMention]) -> Result<()> {
        self.store.upsert_mentions(mentions).await?;
        self.aggregator.update(mentions, Utc::now()).await;
        Ok(())
    }

    /// Process a batch: posts first, then comments in creation order, so a
    /// reply always observes its ancestors' mentions. Post extraction
    /// fans out with bounded concurrency (backend rate limits); all store
    /// writes and stats updates apply sequentially, which is the
    /// single-writer discipline the aggregator needs.
    pub async fn process_batch(&self, units: Vec<ContentUnit>) -> BatchStats {
        let mut stats = BatchStats::default();

        let (mut posts, mut comments): (Vec<_>, Vec<_>) = units
            .into_iter()
            .partition(|u| u.kind == ContentKind::Post);
        posts.sort_by_key(|u| u.created_at);
        comments.sort_by_key(|u| u.created_at);

        // Posts never inherit, so their backend calls are independent.
        let mut extracted: Vec<(ContentUnit, Vec<TickerMention>)> =
            stream::iter(posts.into_iter().map(|unit| {
                let extractor = &self.extractor;
                async move {
                    let mentions = extractor.extract(&unit).await;
                    (unit, mentions)
                }
            }))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        extracted.sort_by_key(|(unit, _)| unit.created_at);

        for (unit, mentions) in extracted {
            stats.posts_processed += 1;
            stats.units_processed += 1;
            if mentions.is_empty() {
                stats.no_ticker_units += 1;
            } else if let Err(e) = self.commit(&mentions).await {
                warn!(content_id = %unit.id, error = %e, "Post mention write failed");
                stats.failed_units += 1;
            } else {
                stats.direct_mentions += mentions.len() as u32;
            }
            if let Err(e) = self.store.mark_processed(&unit.id, unit.kind).await {
                warn!(content_id = %unit.id, error = %e, "Checkpoint write failed");
            }
        }

        // Comments run sequentially: inheritance reads what earlier units
        // (the post, parent comments) wrote.
        for unit in comments {
            stats.comments_processed += 1;
            stats.units_processed += 1;
            match self.process_unit(&unit).await {
                Ok(UnitOutcome::Direct(n)) => stats.direct_mentions += n as u32,
                Ok(UnitOutcome::Inherited(n)) => stats.inherited_mentions += n as u32,
                Ok(UnitOutcome::NoTickers) => stats.no_ticker_units += 1,
                Err(e) => {
                    warn!(content_id = %unit.id, error = %e, "Unit processing failed");
                    stats.failed_units += 1;
                }
            }
        }

        info!(
            units = stats.units_processed,
            direct = stats.direct_mentions,
            inherited = stats.inherited_mentions,
            failed = stats.failed_units,
            "Batch complete"
        );
        stats
    }
}
