//! Durable state seams
//!
//! Checkpoints, neighbor stats and visit records are owned by the store and
//! only change through these traits. [`MemoryStore`] backs tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::types::{Checkpoint, EngagementCounts, NeighborStats, StatsDelta, VisitRecord};
use crate::Result;

/// Scan progress marker
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last committed checkpoint, empty when nothing was ever committed
    async fn load_checkpoint(&self) -> Result<Checkpoint>;
}

/// Monotonically accumulating per-counterparty counters
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Every counterparty with counters, ordered by name
    async fn all_stats(&self) -> Result<Vec<NeighborStats>>;

    /// Add `delta` to the counters and replace the checkpoint in one
    /// atomic step. Either both land or neither does.
    async fn commit_scan(&self, delta: &StatsDelta, checkpoint: &Checkpoint) -> Result<()>;

    /// Explicit reset; the only operation that lowers counters.
    /// Returns the number of counterparties removed.
    async fn reset_stats(&self) -> Result<usize>;
}

/// Last successful engagement per counterparty
#[async_trait]
pub trait VisitLedger: Send + Sync {
    async fn visit(&self, counterparty: &str) -> Result<Option<VisitRecord>>;

    /// Record a completed engagement at `at`, bumping the count
    async fn record_engagement(&self, counterparty: &str, at: DateTime<Utc>) -> Result<()>;

    async fn all_visits(&self) -> Result<Vec<VisitRecord>>;

    /// Whether `cooldown_days` calendar days have passed since the last
    /// engagement; always true for a counterparty never engaged
    async fn can_engage(
        &self,
        counterparty: &str,
        cooldown_days: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(match self.visit(counterparty).await? {
            Some(record) => record.can_engage_at(cooldown_days, now),
            None => true,
        })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    checkpoint: Checkpoint,
    stats: BTreeMap<String, EngagementCounts>,
    visits: BTreeMap<String, VisitRecord>,
    commits: usize,
}

/// In-memory store implementing every durable seam
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(self, counterparty: &str, likes: u64, comments: u64, replies: u64) -> Self {
        self.lock().stats.insert(
            counterparty.to_string(),
            EngagementCounts::new(likes, comments, replies),
        );
        self
    }

    pub fn with_visit(self, counterparty: &str, at: DateTime<Utc>) -> Self {
        self.lock().visits.insert(
            counterparty.to_string(),
            VisitRecord {
                counterparty: counterparty.to_string(),
                last_engaged_at: Some(at),
                count: 1,
            },
        );
        self
    }

    /// Number of scan commits applied
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_checkpoint(&self) -> Result<Checkpoint> {
        Ok(self.lock().checkpoint.clone())
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn all_stats(&self) -> Result<Vec<NeighborStats>> {
        Ok(self
            .lock()
            .stats
            .iter()
            .map(|(name, c)| NeighborStats::new(name.clone(), c.likes, c.comments, c.replies))
            .collect())
    }

    async fn commit_scan(&self, delta: &StatsDelta, checkpoint: &Checkpoint) -> Result<()> {
        let mut state = self.lock();
        for (name, counts) in &delta.entries {
            let entry = state.stats.entry(name.clone()).or_default();
            entry.likes += counts.likes;
            entry.comments += counts.comments;
            entry.replies += counts.replies;
        }
        state.checkpoint = checkpoint.clone();
        state.commits += 1;
        Ok(())
    }

    async fn reset_stats(&self) -> Result<usize> {
        let mut state = self.lock();
        let removed = state.stats.len();
        state.stats.clear();
        Ok(removed)
    }
}

#[async_trait]
impl VisitLedger for MemoryStore {
    async fn visit(&self, counterparty: &str) -> Result<Option<VisitRecord>> {
        Ok(self.lock().visits.get(counterparty).cloned())
    }

    async fn record_engagement(&self, counterparty: &str, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .visits
            .entry(counterparty.to_string())
            .or_insert_with(|| VisitRecord {
                counterparty: counterparty.to_string(),
                last_engaged_at: None,
                count: 0,
            });
        record.last_engaged_at = Some(at);
        record.count += 1;
        Ok(())
    }

    async fn all_visits(&self) -> Result<Vec<VisitRecord>> {
        Ok(self.lock().visits.values().cloned().collect())
    }
}
