use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use hypeflow_common::{
    AggregateTickerStats, ContentKind, HypeflowError, MentionMethod, Span, TickerMention,
};

use super::MentionStore;

/// Postgres-backed mention store.
///
/// All queries are runtime-bound (`sqlx::query` + `.bind()`); writes are
/// `ON CONFLICT` upserts on the natural keys. A write rejected for a
/// missing column (older deployments without the hype columns) is retried
/// once with the reduced field set before the error surfaces.
pub struct PgMentionStore {
    pool: PgPool,
}

impl PgMentionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables this store needs. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS content_tickers (
                kind TEXT NOT NULL,
                content_id TEXT NOT NULL,
                ticker TEXT NOT NULL,
                confidence DOUBLE PRECISION NOT NULL,
                method TEXT NOT NULL,
                span_start BIGINT,
                span_end BIGINT,
                hype_score DOUBLE PRECISION,
                company_name TEXT,
                inherited_from TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (kind, content_id, ticker)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ticker_stats (
                ticker TEXT PRIMARY KEY,
                company_name TEXT,
                total_mentions BIGINT NOT NULL DEFAULT 0,
                post_mentions BIGINT NOT NULL DEFAULT 0,
                comment_mentions BIGINT NOT NULL DEFAULT 0,
                avg_hype_score DOUBLE PRECISION NOT NULL DEFAULT 0.0,
                max_hype_score DOUBLE PRECISION NOT NULL DEFAULT 0.0,
                last_mention_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS processed_content (
                kind TEXT NOT NULL,
                content_id TEXT NOT NULL,
                processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (kind, content_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_tickers_content
             ON content_tickers (content_id, confidence DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_full(&self, m: &TickerMention) -> Result<()> {
        sqlx::query(
            "INSERT INTO content_tickers
                (kind, content_id, ticker, confidence, method, span_start, span_end,
                 hype_score, company_name, inherited_from, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
             ON CONFLICT (kind, content_id, ticker)
             DO UPDATE SET confidence = EXCLUDED.confidence,
                           method = EXCLUDED.method,
                           span_start = EXCLUDED.span_start,
                           span_end = EXCLUDED.span_end,
                           hype_score = EXCLUDED.hype_score,
                           company_name = EXCLUDED.company_name,
                           inherited_from = EXCLUDED.inherited_from,
                           created_at = now()",
        )
        .bind(m.kind.as_str())
        .bind(&m.content_id)
        .bind(&m.ticker)
        .bind(m.confidence)
        .bind(m.method.as_str())
        .bind(m.span.map(|s| s.start as i64))
        .bind(m.span.map(|s| s.end as i64))
        .bind(m.hype_score)
        .bind(&m.company_name)
        .bind(&m.inherited_from)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reduced field set for schemas predating the hype columns.
    async fn upsert_reduced(&self, m: &TickerMention) -> Result<()> {
        sqlx::query(
            "INSERT INTO content_tickers
                (kind, content_id, ticker, confidence, method, span_start, span_end)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (kind, content_id, ticker)
             DO UPDATE SET confidence = EXCLUDED.confidence,
                           method = EXCLUDED.method,
                           span_start = EXCLUDED.span_start,
                           span_end = EXCLUDED.span_end",
        )
        .bind(m.kind.as_str())
        .bind(&m.content_id)
        .bind(&m.ticker)
        .bind(m.confidence)
        .bind(m.method.as_str())
        .bind(m.span.map(|s| s.start as i64))
        .bind(m.span.map(|s| s.end as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn is_missing_column(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("column") && (msg.contains("hype_score") || msg.contains("company_name") || msg.contains("inherited_from"))
}

/// Run the full-field write; on a missing-column rejection fall back to the
/// reduced field set once, mapping a second failure to `SchemaMismatch`.
/// Any other failure passes through untouched.
async fn with_schema_fallback<F, R, FFut, RFut>(ticker: &str, full: F, reduced: R) -> Result<()>
where
    F: FnOnce() -> FFut,
    FFut: Future<Output = Result<()>>,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<()>>,
{
    match full().await {
        Ok(()) => Ok(()),
        Err(e) if is_missing_column(&e) => {
            warn!(
                ticker = %ticker,
                "Store missing hype columns, retrying with reduced field set"
            );
            reduced().await.map_err(|e2| {
                HypeflowError::SchemaMismatch(format!(
                    "reduced-field upsert also failed: {e2} (original: {e})"
                ))
                .into()
            })
        }
        Err(e) => Err(e),
    }
}

#[derive(sqlx::FromRow)]
struct MentionRow {
    kind: String,
    content_id: String,
    ticker: String,
    confidence: f64,
    method: String,
    span_start: Option<i64>,
    span_end: Option<i64>,
    hype_score: Option<f64>,
    company_name: Option<String>,
    inherited_from: Option<String>,
}

impl MentionRow {
    fn into_mention(self) -> Result<TickerMention> {
        let kind: ContentKind = self
            .kind
            .parse()
            .map_err(HypeflowError::Database)?;
        let method: MentionMethod = self
            .method
            .parse()
            .map_err(HypeflowError::Database)?;
        let span = match (self.span_start, self.span_end) {
            (Some(start), Some(end)) if start >= 0 && end >= start => Some(Span {
                start: start as usize,
                end: end as usize,
            }),
            _ => None,
        };
        Ok(TickerMention {
            kind,
            content_id: self.content_id,
            ticker: self.ticker,
            confidence: self.confidence,
            method,
            span,
            hype_score: self.hype_score,
            company_name: self.company_name,
            inherited_from: self.inherited_from,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    ticker: String,
    company_name: Option<String>,
    total_mentions: i64,
    post_mentions: i64,
    comment_mentions: i64,
    avg_hype_score: f64,
    max_hype_score: f64,
    last_mention_at: DateTime<Utc>,
}

#[async_trait]
impl MentionStore for PgMentionStore {
    async fn upsert_mentions(&self, mentions: &[TickerMention]) -> Result<()> {
        for mention in mentions {
            with_schema_fallback(
                &mention.ticker,
                || self.upsert_full(mention),
                || self.upsert_reduced(mention),
            )
            .await?;
        }
        Ok(())
    }

    async fn mentions_for(
        &self,
        content_id: &str,
        kind: Option<ContentKind>,
    ) -> Result<Vec<TickerMention>> {
        let rows: Vec<MentionRow> = match kind {
            Some(kind) => {
                sqlx::query_as(
                    "SELECT kind, content_id, ticker, confidence, method, span_start, span_end,
                            hype_score, company_name, inherited_from
                     FROM content_tickers
                     WHERE content_id = $1 AND kind = $2
                     ORDER BY confidence DESC",
                )
                .bind(content_id)
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT kind, content_id, ticker, confidence, method, span_start, span_end,
                            hype_score, company_name, inherited_from
                     FROM content_tickers
                     WHERE content_id = $1
                     ORDER BY confidence DESC",
                )
                .bind(content_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(MentionRow::into_mention).collect()
    }

    async fn upsert_stats(&self, stats: &AggregateTickerStats) -> Result<()> {
        sqlx::query(
            "INSERT INTO ticker_stats
                (ticker, company_name, total_mentions, post_mentions, comment_mentions,
                 avg_hype_score, max_hype_score, last_mention_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (ticker)
             DO UPDATE SET company_name = COALESCE(ticker_stats.company_name, EXCLUDED.company_name),
                           total_mentions = EXCLUDED.total_mentions,
                           post_mentions = EXCLUDED.post_mentions,
                           comment_mentions = EXCLUDED.comment_mentions,
                           avg_hype_score = EXCLUDED.avg_hype_score,
                           max_hype_score = EXCLUDED.max_hype_score,
                           last_mention_at = EXCLUDED.last_mention_at",
        )
        .bind(&stats.ticker)
        .bind(&stats.company_name)
        .bind(stats.total_mentions)
        .bind(stats.post_mentions)
        .bind(stats.comment_mentions)
        .bind(stats.avg_hype_score)
        .bind(stats.max_hype_score)
        .bind(stats.last_mention_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats_for(&self, ticker: &str) -> Result<Option<AggregateTickerStats>> {
        let row: Option<StatsRow> = sqlx::query_as(
            "SELECT ticker, company_name, total_mentions, post_mentions, comment_mentions,
                    avg_hype_score, max_hype_score, last_mention_at
             FROM ticker_stats
             WHERE ticker = $1",
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AggregateTickerStats {
            ticker: r.ticker,
            company_name: r.company_name,
            total_mentions: r.total_mentions,
            post_mentions: r.post_mentions,
            comment_mentions: r.comment_mentions,
            avg_hype_score: r.avg_hype_score,
            max_hype_score: r.max_hype_score,
            last_mention_at: r.last_mention_at,
        }))
    }

    async fn mark_processed(&self, content_id: &str, kind: ContentKind) -> Result<()> {
        sqlx::query(
            "INSERT INTO processed_content (kind, content_id)
             VALUES ($1, $2)
             ON CONFLICT (kind, content_id)
             DO UPDATE SET processed_at = now()",
        )
        .bind(kind.as_str())
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_stats(&self) -> Result<()> {
        sqlx::query("TRUNCATE ticker_stats").execute(&self.pool).await?;
        Ok(())
    }
}
