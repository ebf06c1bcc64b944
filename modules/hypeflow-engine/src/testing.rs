// Test mocks for the extraction pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockBackend (CompletionBackend) — scripted responses, call counting
// - MemoryStore (MentionStore) — stateful in-memory mention/stats store
//
// No network, no database. `cargo test` in seconds.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use hypeflow_common::{AggregateTickerStats, ContentKind, TickerMention};

use crate::backend::CompletionBackend;
use crate::store::MentionStore;

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

/// Scripted completion backend: returns canned responses in order, or
/// errors on every call when built with `failing()`. Exhausting the script
/// is an error so tests catch unexpected extra calls.
pub struct MockBackend {
    responses: Mutex<VecDeque<String>>,
    call_count: AtomicUsize,
    fail: bool,
}

impl MockBackend {
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            call_count: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn request(&self, _system: &str, _content: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("mock backend unavailable");
        }
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => Ok(response),
            None => bail!("mock backend script exhausted"),
        }
    }
}

/// Canned hype-analysis payload.
pub fn hype_response(score: f64) -> String {
    format!(r#"{{"contextual_hype": {score}}}"#)
}

/// Canned extraction payload. Pass `&[]` for a no-tickers response.
pub fn extraction_response(tickers: &[(&str, &str)], hype_score: f64) -> String {
    let tickers: Vec<serde_json::Value> = tickers
        .iter()
        .map(|(symbol, name)| serde_json::json!({"symbol": symbol, "name": name}))
        .collect();
    serde_json::json!({"tickers": tickers, "hype_score": hype_score}).to_string()
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

type MentionKey = (ContentKind, String, String);

/// In-memory `MentionStore` with the same upsert-by-key semantics as the
/// Postgres implementation.
#[derive(Default)]
pub struct MemoryStore {
    mentions: Mutex<HashMap<MentionKey, TickerMention>>,
    stats: Mutex<HashMap<String, AggregateTickerStats>>,
    processed: Mutex<HashSet<(ContentKind, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, content_id: &str, kind: ContentKind) -> bool {
        self.processed
            .lock()
            .unwrap()
            .contains(&(kind, content_id.to_string()))
    }

    pub fn mention_count(&self) -> usize {
        self.mentions.lock().unwrap().len()
    }
}

#[async_trait]
impl MentionStore for MemoryStore {
    async fn upsert_mentions(&self, mentions: &[TickerMention]) -> Result<()> {
        let mut map = self.mentions.lock().unwrap();
        for mention in mentions {
            let key = (
                mention.kind,
                mention.content_id.clone(),
                mention.ticker.clone(),
            );
            map.insert(key, mention.clone());
        }
        Ok(())
    }

    async fn mentions_for(
        &self,
        content_id: &str,
        kind: Option<ContentKind>,
    ) -> Result<Vec<TickerMention>> {
        let map = self.mentions.lock().unwrap();
        let mut found: Vec<TickerMention> = map
            .values()
            .filter(|m| m.content_id == content_id && kind.map_or(true, |k| m.kind == k))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(found)
    }

    async fn upsert_stats(&self, stats: &AggregateTickerStats) -> Result<()> {
        self.stats
            .lock()
            .unwrap()
            .insert(stats.ticker.clone(), stats.clone());
        Ok(())
    }

    async fn stats_for(&self, ticker: &str) -> Result<Option<AggregateTickerStats>> {
        Ok(self.stats.lock().unwrap().get(ticker).cloned())
    }

    async fn mark_processed(&self, content_id: &str, kind: ContentKind) -> Result<()> {
        self.processed
            .lock()
            .unwrap()
            .insert((kind, content_id.to_string()));
        Ok(())
    }

    async fn reset_stats(&self) -> Result<()> {
        self.stats.lock().unwrap().clear();
        Ok(())
    }
}
