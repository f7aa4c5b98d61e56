//! Core data model for revisit
//!
//! Feed items and fingerprints are ephemeral scan products. Neighbor stats and
//! visit records are durable and only ever mutated through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of engagement a counterparty left on the operator's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Like,
    Comment,
    Reply,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Like => "LIKE",
            EventType::Comment => "COMMENT",
            EventType::Reply => "REPLY",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification card as rendered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Counterparty display name
    pub actor: String,
    pub event_type: EventType,
    /// Short card text used to tell apart events from the same actor
    pub content_snippet: String,
    /// Relative or absolute time text exactly as shown
    pub displayed_time: String,
}

impl FeedItem {
    pub fn new(
        actor: impl Into<String>,
        event_type: EventType,
        content_snippet: impl Into<String>,
        displayed_time: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            event_type,
            content_snippet: content_snippet.into(),
            displayed_time: displayed_time.into(),
        }
    }
}

/// Content-derived dedup key for one feed event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted scan progress
///
/// Both markers are stored; `ScanConfig::strategy` decides which one a scan
/// consults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Most recent fingerprints, newest first
    pub fingerprints: Vec<Fingerprint>,
    /// Start time of the last committed scan
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.iter().any(|fp| fp == fingerprint)
    }

    /// Prepend freshly seen fingerprints and keep at most `capacity` entries.
    ///
    /// With no fresh fingerprints the set is returned unchanged.
    pub fn advance(&self, fresh: &[Fingerprint], capacity: usize) -> Vec<Fingerprint> {
        let mut merged: Vec<Fingerprint> = Vec::with_capacity(capacity);
        for fp in fresh.iter().chain(self.fingerprints.iter()) {
            if merged.len() >= capacity {
                break;
            }
            if !merged.contains(fp) {
                merged.push(fp.clone());
            }
        }
        merged
    }
}

/// Likes, comments and replies received from one counterparty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub comments: u64,
    pub replies: u64,
}

impl EngagementCounts {
    pub fn new(likes: u64, comments: u64, replies: u64) -> Self {
        Self {
            likes,
            comments,
            replies,
        }
    }

    pub fn record(&mut self, event: EventType) {
        match event {
            EventType::Like => self.likes += 1,
            EventType::Comment => self.comments += 1,
            EventType::Reply => self.replies += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.likes == 0 && self.comments == 0 && self.replies == 0
    }
}

/// Durable per-counterparty counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborStats {
    pub counterparty: String,
    pub likes: u64,
    pub comments: u64,
    pub replies: u64,
}

impl NeighborStats {
    pub fn new(counterparty: impl Into<String>, likes: u64, comments: u64, replies: u64) -> Self {
        Self {
            counterparty: counterparty.into(),
            likes,
            comments,
            replies,
        }
    }

    pub fn counts(&self) -> EngagementCounts {
        EngagementCounts::new(self.likes, self.comments, self.replies)
    }
}

/// Counters gathered by one scan, not yet committed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub entries: BTreeMap<String, EngagementCounts>,
}

impl StatsDelta {
    pub fn record(&mut self, counterparty: &str, event: EventType) {
        self.entries
            .entry(counterparty.to_string())
            .or_default()
            .record(event);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(EngagementCounts::is_empty)
    }

    pub fn counterparties(&self) -> usize {
        self.entries.len()
    }

    pub fn total_events(&self) -> u64 {
        self.entries
            .values()
            .map(|c| c.likes + c.comments + c.replies)
            .sum()
    }
}

/// One row of the reputation ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub counterparty: String,
    pub likes: u64,
    pub comments: u64,
    pub replies: u64,
    pub score: u64,
}

impl RankingEntry {
    pub fn counts(&self) -> EngagementCounts {
        EngagementCounts::new(self.likes, self.comments, self.replies)
    }
}

/// Last engagement this system made with a counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub counterparty: String,
    pub last_engaged_at: Option<DateTime<Utc>>,
    pub count: u64,
}

impl VisitRecord {
    /// `cooldown_days` whole calendar days must separate engagements.
    pub fn can_engage_at(&self, cooldown_days: u32, now: DateTime<Utc>) -> bool {
        match self.last_engaged_at {
            None => true,
            Some(last) => days_between(last, now) >= i64::from(cooldown_days),
        }
    }
}

/// Calendar days between two instants, by UTC date.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later.date_naive() - earlier.date_naive()).num_days()
}

/// One post on the operator's subscription feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    /// Position on the rendered feed page
    pub index: usize,
    /// Author display name, as seen in notifications
    pub author: String,
    /// Author blog id parsed from the author link, when exposed
    pub author_id: Option<String>,
    /// Direct post URL, when exposed
    pub url: Option<String>,
}

impl FeedPost {
    /// Placeholder for a card that could not be read; plans as a skip
    pub fn unreadable(index: usize) -> Self {
        Self {
            index,
            author: String::new(),
            author_id: None,
            url: None,
        }
    }

    /// Key used for the visit ledger
    pub fn ledger_key(&self) -> &str {
        self.author_id.as_deref().unwrap_or(&self.author)
    }
}

/// Graduated action for one post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    AiComment,
    TemplateComment,
    LikeOnly,
    Skip,
}

impl Decision {
    pub fn is_comment(&self) -> bool {
        matches!(self, Decision::AiComment | Decision::TemplateComment)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::AiComment => "AI_COMMENT",
            Decision::TemplateComment => "TEMPLATE_COMMENT",
            Decision::LikeOnly => "LIKE_ONLY",
            Decision::Skip => "SKIP",
        };
        f.write_str(s)
    }
}

/// Planned action for one feed post; a snapshot, never re-evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlanEntry {
    pub feed_item_index: usize,
    pub counterparty: String,
    pub ledger_key: String,
    pub url: Option<String>,
    pub decision: Decision,
    /// Counters behind the decision, absent for unranked authors
    pub stats: Option<EngagementCounts>,
    pub cooldown_clear: bool,
}

/// Result of executing one plan entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Success,
    Fail,
    AlreadyDone,
    LimitReached,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionOutcome::Success => "SUCCESS",
            ExecutionOutcome::Fail => "FAIL",
            ExecutionOutcome::AlreadyDone => "ALREADY",
            ExecutionOutcome::LimitReached => "LIMIT_REACHED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fp(s: &str) -> Fingerprint {
        Fingerprint(s.to_string())
    }

    #[test]
    fn test_checkpoint_advance_prepends_and_truncates() {
        let checkpoint = Checkpoint {
            fingerprints: vec![fp("c"), fp("d"), fp("e")],
            last_sync_at: None,
        };

        let next = checkpoint.advance(&[fp("a"), fp("b")], 3);
        assert_eq!(next, vec![fp("a"), fp("b"), fp("c")]);
    }

    #[test]
    fn test_checkpoint_advance_without_fresh_is_unchanged() {
        let checkpoint = Checkpoint {
            fingerprints: vec![fp("a"), fp("b"), fp("c")],
            last_sync_at: None,
        };
        assert_eq!(checkpoint.advance(&[], 3), checkpoint.fingerprints);
    }

    #[test]
    fn test_checkpoint_advance_dedups() {
        let checkpoint = Checkpoint {
            fingerprints: vec![fp("a"), fp("b")],
            last_sync_at: None,
        };
        assert_eq!(checkpoint.advance(&[fp("b")], 3), vec![fp("b"), fp("a")]);
    }

    #[test]
    fn test_stats_delta_records_by_type() {
        let mut delta = StatsDelta::default();
        delta.record("alice", EventType::Comment);
        delta.record("alice", EventType::Like);
        delta.record("bob", EventType::Reply);

        assert_eq!(delta.counterparties(), 2);
        assert_eq!(delta.total_events(), 3);
        assert_eq!(delta.entries["alice"], EngagementCounts::new(1, 1, 0));
        assert!(!delta.is_empty());
        assert!(StatsDelta::default().is_empty());
    }

    #[test]
    fn test_cooldown_window() {
        let day0 = Utc.with_ymd_and_hms(2026, 3, 10, 21, 30, 0).unwrap();
        let record = VisitRecord {
            counterparty: "alice".into(),
            last_engaged_at: Some(day0),
            count: 1,
        };

        assert!(!record.can_engage_at(3, day0 + Duration::days(1)));
        assert!(!record.can_engage_at(3, day0 + Duration::days(2)));
        assert!(record.can_engage_at(3, day0 + Duration::days(3)));
        assert!(record.can_engage_at(3, day0 + Duration::days(30)));
    }

    #[test]
    fn test_never_engaged_is_clear() {
        let record = VisitRecord {
            counterparty: "bob".into(),
            last_engaged_at: None,
            count: 0,
        };
        assert!(record.can_engage_at(365, Utc::now()));
    }

    #[test]
    fn test_ledger_key_prefers_blog_id() {
        let mut post = FeedPost {
            index: 0,
            author: "Alice".into(),
            author_id: Some("alice_blog".into()),
            url: None,
        };
        assert_eq!(post.ledger_key(), "alice_blog");
        post.author_id = None;
        assert_eq!(post.ledger_key(), "Alice");
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::AiComment.to_string(), "AI_COMMENT");
        assert_eq!(Decision::LikeOnly.to_string(), "LIKE_ONLY");
        assert!(Decision::TemplateComment.is_comment());
        assert!(!Decision::Skip.is_comment());
    }
}
