//! Incremental notification scan
//!
//! A scan walks the stream from the newest card down, accumulating a stats
//! delta until it meets the previous checkpoint, the bottom of the feed, or
//! too many scrolls in a row that render nothing. Nothing is written here;
//! the caller commits the outcome.

use chrono::{DateTime, Utc};
use revisit_core::{
    Checkpoint, CheckpointStrategy, Fingerprint, Result, ScanConfig, StatsDelta,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::fingerprint::fingerprint;
use crate::notifications::NotificationSource;
use crate::stop::StopSignal;
use crate::time_parse::TimeParser;

/// Why a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanTermination {
    /// Met a fingerprint from the previous checkpoint
    Checkpoint,
    /// Met an item at or before the last sync time
    CutoffReached,
    /// The bottom-of-feed sentinel showed
    FeedBottom,
    /// Consecutive empty scrolls used up
    EmptyScrollBudget,
    /// Stop was requested; the outcome must be discarded
    Stopped,
}

impl fmt::Display for ScanTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanTermination::Checkpoint => "checkpoint",
            ScanTermination::CutoffReached => "cutoff",
            ScanTermination::FeedBottom => "feed bottom",
            ScanTermination::EmptyScrollBudget => "empty scroll budget",
            ScanTermination::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Result of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub delta: StatsDelta,
    pub checkpoint: Checkpoint,
    /// True only when the sentinel confirmed the end of the feed
    pub reached_end: bool,
    pub termination: ScanTermination,
    /// Cards read, tracked or not
    pub cards_read: usize,
}

impl ScanOutcome {
    /// Whether the outcome may be committed
    pub fn is_committable(&self) -> bool {
        self.termination != ScanTermination::Stopped
    }
}

/// Walks a [`NotificationSource`] down to the previous checkpoint
pub struct FeedScanner<'a> {
    config: &'a ScanConfig,
    parser: TimeParser,
    stop: StopSignal,
}

impl<'a> FeedScanner<'a> {
    pub fn new(config: &'a ScanConfig, stop: StopSignal) -> Result<Self> {
        Ok(Self {
            config,
            parser: TimeParser::new()?,
            stop,
        })
    }

    /// Scan from the top of `source` down to `previous`.
    ///
    /// `now` is the scan start; it becomes the new sync time when anything
    /// new was seen.
    pub async fn scan<S: NotificationSource + ?Sized>(
        &self,
        source: &S,
        previous: &Checkpoint,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome> {
        let mut delta = StatsDelta::default();
        let mut fresh: Vec<Fingerprint> = Vec::new();
        let mut processed = 0usize;
        let mut empty_scrolls = 0usize;

        let termination = 'scan: loop {
            if self.stop.is_requested() {
                break 'scan ScanTermination::Stopped;
            }

            let rendered = source.rendered_count().await?;
            if rendered > processed {
                empty_scrolls = 0;
                debug!("Processing cards {}..{}", processed, rendered);

                for index in processed..rendered {
                    processed = index + 1;
                    let item = match source.read(index).await {
                        Ok(Some(item)) => item,
                        Ok(None) => continue,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            warn!("Skipping unreadable card {}: {}", index, e);
                            continue;
                        }
                    };
                    let fp = fingerprint(&item, self.config.snippet_chars);

                    if let Some(reason) = self.boundary(&item.displayed_time, &fp, previous, now)
                    {
                        debug!("Boundary at card {} ({}): {}", index, item.actor, reason);
                        break 'scan reason;
                    }

                    // A card re-rendered during this scan is the same event
                    if fresh.contains(&fp) {
                        continue;
                    }
                    delta.record(&item.actor, item.event_type);
                    fresh.push(fp);
                }
                continue;
            }

            if source.at_bottom().await? {
                break 'scan ScanTermination::FeedBottom;
            }
            if empty_scrolls >= self.config.max_empty_scrolls {
                break 'scan ScanTermination::EmptyScrollBudget;
            }
            empty_scrolls += 1;
            debug!(
                "No new cards, scrolling ({}/{})",
                empty_scrolls, self.config.max_empty_scrolls
            );
            source.load_more().await?;
        };

        let checkpoint = if fresh.is_empty() {
            previous.clone()
        } else {
            Checkpoint {
                fingerprints: previous.advance(&fresh, self.config.checkpoint_size),
                last_sync_at: Some(now),
            }
        };

        info!(
            "Scan finished ({}): {} cards read, {} new events from {} counterparties",
            termination,
            processed,
            delta.total_events(),
            delta.counterparties()
        );

        Ok(ScanOutcome {
            delta,
            checkpoint,
            reached_end: termination == ScanTermination::FeedBottom,
            termination,
            cards_read: processed,
        })
    }

    fn boundary(
        &self,
        displayed_time: &str,
        fp: &Fingerprint,
        previous: &Checkpoint,
        now: DateTime<Utc>,
    ) -> Option<ScanTermination> {
        match self.config.strategy {
            CheckpointStrategy::Fingerprints => previous
                .contains(fp)
                .then_some(ScanTermination::Checkpoint),
            CheckpointStrategy::Cutoff => {
                let cutoff = previous.last_sync_at?;
                self.parser
                    .parse(displayed_time, now)
                    .reaches_cutoff(cutoff)
                    .then_some(ScanTermination::CutoffReached)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use revisit_core::{EngagementCounts, EventType, FeedItem, RevisitError};
    use std::sync::Mutex;

    /// Stream of pre-built items revealed `batch` at a time
    struct VecSource {
        items: Vec<FeedItem>,
        revealed: Mutex<usize>,
        batch: usize,
        has_sentinel: bool,
        scrolls: Mutex<usize>,
    }

    impl VecSource {
        fn new(items: Vec<FeedItem>, batch: usize, has_sentinel: bool) -> Self {
            Self {
                revealed: Mutex::new(batch.min(items.len())),
                items,
                batch,
                has_sentinel,
                scrolls: Mutex::new(0),
            }
        }

        fn scrolls(&self) -> usize {
            *self.scrolls.lock().unwrap()
        }
    }

    #[async_trait]
    impl NotificationSource for VecSource {
        async fn open(&self) -> Result<()> {
            Ok(())
        }

        async fn rendered_count(&self) -> Result<usize> {
            Ok(*self.revealed.lock().unwrap())
        }

        async fn read(&self, index: usize) -> Result<Option<FeedItem>> {
            Ok(self.items.get(index).cloned())
        }

        async fn at_bottom(&self) -> Result<bool> {
            Ok(self.has_sentinel && *self.revealed.lock().unwrap() >= self.items.len())
        }

        async fn load_more(&self) -> Result<()> {
            *self.scrolls.lock().unwrap() += 1;
            let mut revealed = self.revealed.lock().unwrap();
            *revealed = (*revealed + self.batch).min(self.items.len());
            Ok(())
        }
    }

    /// Source whose card at `broken` fails to read
    struct BrokenCardSource {
        inner: VecSource,
        broken: usize,
        error: fn(String) -> RevisitError,
    }

    #[async_trait]
    impl NotificationSource for BrokenCardSource {
        async fn open(&self) -> Result<()> {
            self.inner.open().await
        }

        async fn rendered_count(&self) -> Result<usize> {
            self.inner.rendered_count().await
        }

        async fn read(&self, index: usize) -> Result<Option<FeedItem>> {
            if index == self.broken {
                return Err((self.error)(format!("li.item[{}]", index)));
            }
            self.inner.read(index).await
        }

        async fn at_bottom(&self) -> Result<bool> {
            self.inner.at_bottom().await
        }

        async fn load_more(&self) -> Result<()> {
            self.inner.load_more().await
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    fn item(actor: &str, event: EventType, snippet: &str, time: &str) -> FeedItem {
        FeedItem::new(actor, event, snippet, time)
    }

    fn feed() -> Vec<FeedItem> {
        vec![
            item("alice", EventType::Comment, "on post 9", "1분 전"),
            item("bob", EventType::Like, "on post 9", "5분 전"),
            item("alice", EventType::Like, "on post 8", "1시간 전"),
            item("carol", EventType::Reply, "on post 7", "3시간 전"),
            item("bob", EventType::Comment, "on post 6", "2026. 8. 30."),
        ]
    }

    #[tokio::test]
    async fn test_first_scan_reads_to_bottom() {
        let config = ScanConfig::default();
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let source = VecSource::new(feed(), 2, true);

        let outcome = scanner
            .scan(&source, &Checkpoint::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome.termination, ScanTermination::FeedBottom);
        assert!(outcome.reached_end);
        assert_eq!(outcome.delta.total_events(), 5);
        assert_eq!(outcome.delta.entries["alice"], EngagementCounts::new(1, 1, 0));
        assert_eq!(outcome.delta.entries["bob"], EngagementCounts::new(1, 1, 0));
        assert_eq!(outcome.checkpoint.fingerprints.len(), 3);
        assert_eq!(outcome.checkpoint.last_sync_at, Some(now()));
    }

    #[tokio::test]
    async fn test_second_scan_is_idempotent() {
        let config = ScanConfig::default();
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();

        let first = scanner
            .scan(&VecSource::new(feed(), 2, true), &Checkpoint::default(), now())
            .await
            .unwrap();

        for _ in 0..2 {
            let again = scanner
                .scan(
                    &VecSource::new(feed(), 2, true),
                    &first.checkpoint,
                    now() + Duration::hours(1),
                )
                .await
                .unwrap();
            assert_eq!(again.termination, ScanTermination::Checkpoint);
            assert!(!again.reached_end);
            assert!(again.delta.is_empty());
            assert_eq!(again.checkpoint, first.checkpoint);
        }
    }

    #[tokio::test]
    async fn test_new_items_stop_at_checkpoint() {
        let config = ScanConfig::default();
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let first = scanner
            .scan(&VecSource::new(feed(), 5, true), &Checkpoint::default(), now())
            .await
            .unwrap();

        let mut newer = vec![
            item("dave", EventType::Comment, "on post 10", "방금 전"),
            item("erin", EventType::Like, "on post 10", "2분 전"),
        ];
        newer.extend(feed());

        let later = now() + Duration::minutes(30);
        let outcome = scanner
            .scan(&VecSource::new(newer, 3, true), &first.checkpoint, later)
            .await
            .unwrap();

        assert_eq!(outcome.termination, ScanTermination::Checkpoint);
        assert_eq!(outcome.delta.total_events(), 2);
        assert!(outcome.delta.entries.contains_key("dave"));
        assert!(!outcome.delta.entries.contains_key("alice"));

        // New fingerprints first, then the previous ones, bounded
        let fps = &outcome.checkpoint.fingerprints;
        assert_eq!(fps.len(), 3);
        assert_eq!(fps[2], first.checkpoint.fingerprints[0]);
        assert_eq!(outcome.checkpoint.last_sync_at, Some(later));
    }

    #[tokio::test]
    async fn test_empty_scroll_budget_without_sentinel() {
        let config = ScanConfig::default();
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let source = VecSource::new(feed(), 5, false);

        let outcome = scanner
            .scan(&source, &Checkpoint::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome.termination, ScanTermination::EmptyScrollBudget);
        assert!(!outcome.reached_end);
        assert_eq!(outcome.delta.total_events(), 5);
        assert_eq!(source.scrolls(), config.max_empty_scrolls);
    }

    #[tokio::test]
    async fn test_cutoff_strategy() {
        let config = ScanConfig {
            strategy: CheckpointStrategy::Cutoff,
            ..Default::default()
        };
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let previous = Checkpoint {
            fingerprints: Vec::new(),
            last_sync_at: Some(now() - Duration::minutes(30)),
        };

        let outcome = scanner
            .scan(&VecSource::new(feed(), 5, true), &previous, now())
            .await
            .unwrap();

        // "1시간 전" is older than the cutoff
        assert_eq!(outcome.termination, ScanTermination::CutoffReached);
        assert_eq!(outcome.delta.total_events(), 2);
    }

    #[tokio::test]
    async fn test_cutoff_stops_at_calendar_date_and_garbage() {
        let config = ScanConfig {
            strategy: CheckpointStrategy::Cutoff,
            ..Default::default()
        };
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let previous = Checkpoint {
            fingerprints: Vec::new(),
            last_sync_at: Some(now() - Duration::days(30)),
        };

        let dated = vec![
            item("alice", EventType::Like, "a", "3분 전"),
            item("bob", EventType::Like, "b", "2026. 8. 31."),
            item("carol", EventType::Like, "c", "1분 전"),
        ];
        let outcome = scanner
            .scan(&VecSource::new(dated, 5, true), &previous, now())
            .await
            .unwrap();
        assert_eq!(outcome.termination, ScanTermination::CutoffReached);
        assert_eq!(outcome.delta.total_events(), 1);

        let garbled = vec![
            item("alice", EventType::Like, "a", "???"),
            item("bob", EventType::Like, "b", "1분 전"),
        ];
        let outcome = scanner
            .scan(&VecSource::new(garbled, 5, true), &previous, now())
            .await
            .unwrap();
        assert_eq!(outcome.termination, ScanTermination::CutoffReached);
        assert!(outcome.delta.is_empty());
    }

    #[tokio::test]
    async fn test_stop_discards() {
        let config = ScanConfig::default();
        let stop = StopSignal::new();
        stop.request();
        let scanner = FeedScanner::new(&config, stop).unwrap();

        let outcome = scanner
            .scan(&VecSource::new(feed(), 2, true), &Checkpoint::default(), now())
            .await
            .unwrap();
        assert_eq!(outcome.termination, ScanTermination::Stopped);
        assert!(!outcome.is_committable());
    }

    #[tokio::test]
    async fn test_unreadable_card_is_skipped() {
        let config = ScanConfig::default();
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let source = BrokenCardSource {
            inner: VecSource::new(feed(), 2, true),
            broken: 1,
            error: RevisitError::ElementNotFound,
        };

        let outcome = scanner
            .scan(&source, &Checkpoint::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome.termination, ScanTermination::FeedBottom);
        assert!(outcome.is_committable());
        assert_eq!(outcome.cards_read, 5);
        assert_eq!(outcome.delta.total_events(), 4);
        assert_eq!(outcome.delta.entries["bob"], EngagementCounts::new(0, 1, 0));
    }

    #[tokio::test]
    async fn test_session_loss_while_reading_aborts() {
        let config = ScanConfig::default();
        let scanner = FeedScanner::new(&config, StopSignal::new()).unwrap();
        let source = BrokenCardSource {
            inner: VecSource::new(feed(), 2, true),
            broken: 1,
            error: RevisitError::SessionLost,
        };

        let err = scanner
            .scan(&source, &Checkpoint::default(), now())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
