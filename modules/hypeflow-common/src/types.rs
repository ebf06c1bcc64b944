use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Content ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Comment,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Comment => "comment",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(ContentKind::Post),
            "comment" => Ok(ContentKind::Comment),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

/// A text-bearing node in a discussion tree (post or comment).
///
/// Created by the ingestion layer; the extraction core only reads it.
/// Identifiers are the platform's native base36 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: String,
    pub text: String,
    /// Direct parent (post or comment), if this is a reply.
    pub parent_id: Option<String>,
    /// The post this unit belongs to. For posts, `None`.
    pub post_id: Option<String>,
    pub kind: ContentKind,
    pub created_at: DateTime<Utc>,
}

// --- Mentions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MentionMethod {
    /// Ticker literally present in the text (span located).
    SymbolMatch,
    /// Backend reported the ticker but the text never contains it verbatim.
    KeywordMatch,
    /// Softened copy of an ancestor's mention (confidence decay).
    Inherited,
    /// Inherited from the owning post on a strong hype signal.
    ContextualInherited,
}

impl MentionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionMethod::SymbolMatch => "symbol-match",
            MentionMethod::KeywordMatch => "keyword-match",
            MentionMethod::Inherited => "inherited",
            MentionMethod::ContextualInherited => "contextual-inherited",
        }
    }
}

impl std::fmt::Display for MentionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MentionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symbol-match" => Ok(MentionMethod::SymbolMatch),
            "keyword-match" => Ok(MentionMethod::KeywordMatch),
            "inherited" => Ok(MentionMethod::Inherited),
            "contextual-inherited" => Ok(MentionMethod::ContextualInherited),
            other => Err(format!("unknown mention method: {other}")),
        }
    }
}

/// Character offsets of a ticker occurrence in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One extracted (or inherited) ticker assignment for a content unit.
///
/// At most one mention exists per (kind, content_id, ticker); duplicate
/// occurrences collapse to the highest-confidence one before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerMention {
    pub kind: ContentKind,
    pub content_id: String,
    /// Normalized uppercase symbol.
    pub ticker: String,
    pub confidence: f64,
    pub method: MentionMethod,
    /// Absent for inherited mentions and backend-only matches.
    pub span: Option<Span>,
    pub hype_score: Option<f64>,
    pub company_name: Option<String>,
    /// Source content unit id, for inherited mentions.
    pub inherited_from: Option<String>,
}

// --- Aggregate stats ---

/// Running per-ticker summary, derived from mentions.
///
/// A pure projection: replaying every `TickerMention` through `absorb`
/// reconstructs it exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateTickerStats {
    pub ticker: String,
    pub company_name: Option<String>,
    pub total_mentions: i64,
    pub post_mentions: i64,
    pub comment_mentions: i64,
    pub avg_hype_score: f64,
    pub max_hype_score: f64,
    pub last_mention_at: DateTime<Utc>,
}

impl AggregateTickerStats {
    pub fn new(ticker: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            company_name: None,
            total_mentions: 0,
            post_mentions: 0,
            comment_mentions: 0,
            avg_hype_score: 0.0,
            max_hype_score: 0.0,
            last_mention_at: now,
        }
    }

    /// Fold one mention into the summary: bump counters, recompute the
    /// running hype average, take the pairwise max, stamp the timestamp.
    /// Company name is first-writer-wins — later mentions may lack it.
    pub fn absorb(&mut self, mention: &TickerMention, now: DateTime<Utc>) {
        let hype = mention.hype_score.unwrap_or(0.0);
        let old_count = self.total_mentions as f64;

        self.total_mentions += 1;
        match mention.kind {
            ContentKind::Post => self.post_mentions += 1,
            ContentKind::Comment => self.comment_mentions += 1,
        }
        self.avg_hype_score =
            (self.avg_hype_score * old_count + hype) / self.total_mentions as f64;
        self.max_hype_score = self.max_hype_score.max(hype);
        self.last_mention_at = now;

        if self.company_name.is_none() {
            if let Some(ref name) = mention.company_name {
                if !name.trim().is_empty() {
                    self.company_name = Some(name.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(ticker: &str, hype: Option<f64>, company: Option<&str>) -> TickerMention {
        TickerMention {
            kind: ContentKind::Post,
            content_id: "abc123".into(),
            ticker: ticker.into(),
            confidence: 0.9,
            method: MentionMethod::SymbolMatch,
            span: Some(Span { start: 0, end: 4 }),
            hype_score: hype,
            company_name: company.map(Into::into),
            inherited_from: None,
        }
    }

    #[test]
    fn running_average_and_max() {
        let now = Utc::now();
        let mut stats = AggregateTickerStats::new("TSLA", now);
        stats.absorb(&mention("TSLA", Some(0.8), None), now);
        stats.absorb(&mention("TSLA", Some(0.6), None), now);

        assert_eq!(stats.total_mentions, 2);
        assert!((stats.avg_hype_score - 0.70).abs() < 1e-9);
        assert!((stats.max_hype_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn company_name_first_writer_wins() {
        let now = Utc::now();
        let mut stats = AggregateTickerStats::new("TSLA", now);
        stats.absorb(&mention("TSLA", None, None), now);
        assert_eq!(stats.company_name, None);

        stats.absorb(&mention("TSLA", None, Some("Tesla Inc.")), now);
        stats.absorb(&mention("TSLA", None, Some("Tesla Motors")), now);
        assert_eq!(stats.company_name.as_deref(), Some("Tesla Inc."));
    }

    #[test]
    fn kind_counters_split() {
        let now = Utc::now();
        let mut stats = AggregateTickerStats::new("GME", now);
        let mut comment = mention("GME", None, None);
        comment.kind = ContentKind::Comment;

        stats.absorb(&mention("GME", None, None), now);
        stats.absorb(&comment, now);
        stats.absorb(&comment, now);

        assert_eq!(stats.post_mentions, 1);
        assert_eq!(stats.comment_mentions, 2);
        assert_eq!(stats.total_mentions, 3);
    }

    #[test]
    fn method_serializes_kebab_case() {
        let json = serde_json::to_string(&MentionMethod::ContextualInherited).unwrap();
        assert_eq!(json, "\"contextual-inherited\"");
        assert_eq!(MentionMethod::SymbolMatch.as_str(), "symbol-match");
    }
}
