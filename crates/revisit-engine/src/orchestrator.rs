//! Two-phase run orchestration
//!
//! Phase 1 scans the notification stream to convergence, commits the delta
//! and recomputes the ranking. Phase 2 walks feed pages, planning each page
//! in full before executing it, until a stop condition holds.

use chrono::Utc;
use revisit_core::{
    Assistant, CheckpointStore, Decision, ExecutionOutcome, InteractionPort, Result,
    RevisitConfig, StatsStore, VisitLedger,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

use crate::executor::ActionExecutor;
use crate::feed::load_feed_page;
use crate::notifications::{DomNotifications, NotificationSource};
use crate::observer::{Progress, RunObserver};
use crate::pacing::Pacer;
use crate::planner::ActionPlanner;
use crate::ranking::Ranking;
use crate::scanner::{FeedScanner, ScanTermination};
use crate::stop::StopSignal;

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Scan,
    Execute,
    Done,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Success count reached the target
    TargetReached,
    /// Too many consecutive item failures
    FailureBudgetExhausted,
    /// External stop signal
    StopRequested,
    /// The platform signalled its daily limit
    RateLimited,
    /// A feed page came back empty
    FeedExhausted,
    /// Walked the configured number of pages
    PageLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::TargetReached => "target reached",
            StopReason::FailureBudgetExhausted => "failure budget exhausted",
            StopReason::StopRequested => "stop requested",
            StopReason::RateLimited => "platform limit reached",
            StopReason::FeedExhausted => "feed exhausted",
            StopReason::PageLimit => "page limit reached",
        };
        f.write_str(s)
    }
}

/// What Phase 1 did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub termination: ScanTermination,
    pub reached_end: bool,
    pub cards_read: usize,
    pub new_events: u64,
    pub counterparties: usize,
    /// False when the scan was stopped and nothing was written
    pub committed: bool,
}

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub scan: ScanSummary,
    pub ranking_size: usize,
    pub pages: usize,
    pub attempts: usize,
    pub successes: usize,
    pub comments: usize,
    pub failures: usize,
    pub already_done: usize,
    pub stop_reason: StopReason,
}

impl RunReport {
    fn new(scan: ScanSummary, ranking_size: usize, stop_reason: StopReason) -> Self {
        Self {
            scan,
            ranking_size,
            pages: 0,
            attempts: 0,
            successes: 0,
            comments: 0,
            failures: 0,
            already_done: 0,
            stop_reason,
        }
    }

    /// Whether the run ended on a fatal platform signal
    pub fn halted(&self) -> bool {
        self.stop_reason == StopReason::RateLimited
    }
}

/// Drives one run over a single browsing session
pub struct Orchestrator<'a, P, S>
where
    P: InteractionPort,
    S: CheckpointStore + StatsStore + VisitLedger,
{
    port: &'a P,
    store: &'a S,
    assistant: Option<&'a dyn Assistant>,
    config: &'a RevisitConfig,
    observer: &'a dyn RunObserver,
    pacer: Pacer,
    stop: StopSignal,
}

impl<'a, P, S> Orchestrator<'a, P, S>
where
    P: InteractionPort,
    S: CheckpointStore + StatsStore + VisitLedger,
{
    pub fn new(
        port: &'a P,
        store: &'a S,
        config: &'a RevisitConfig,
        observer: &'a dyn RunObserver,
        stop: StopSignal,
    ) -> Self {
        Self {
            port,
            store,
            assistant: None,
            config,
            observer,
            pacer: Pacer::new(config.pacing.clone()),
            stop,
        }
    }

    /// Use `assistant` for AI comments
    pub fn with_assistant(mut self, assistant: &'a dyn Assistant) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Phase 1 only: scan, commit and rank
    pub async fn sync(&self) -> Result<(ScanSummary, Ranking)> {
        info!("Phase {:?}: scanning notifications", RunPhase::Scan);

        let source = DomNotifications::new(
            self.port,
            &self.config.selectors,
            &self.config.scan,
            &self.pacer,
        );
        source.open().await?;

        let previous = self.store.load_checkpoint().await?;
        let scanner = FeedScanner::new(&self.config.scan, self.stop.clone())?;
        let outcome = scanner.scan(&source, &previous, Utc::now()).await?;

        let committed = outcome.is_committable();
        if committed {
            self.store
                .commit_scan(&outcome.delta, &outcome.checkpoint)
                .await?;
        } else {
            warn!("Scan stopped early; discarding partial results");
        }

        let summary = ScanSummary {
            termination: outcome.termination,
            reached_end: outcome.reached_end,
            cards_read: outcome.cards_read,
            new_events: outcome.delta.total_events(),
            counterparties: outcome.delta.counterparties(),
            committed,
        };

        let stats = self.store.all_stats().await?;
        let ranking = Ranking::from_stats(&stats, &self.config.scoring);
        self.observer.on_ranking(ranking.entries());

        Ok((summary, ranking))
    }

    /// Full run: Phase 1 then Phase 2
    pub async fn run(&self) -> Result<RunReport> {
        let (scan, ranking) = self.sync().await?;
        let mut report = RunReport::new(scan, ranking.len(), StopReason::StopRequested);

        if !report.scan.committed || self.stop.is_requested() {
            info!("Run stopped before the engagement phase");
            return Ok(report);
        }

        info!("Phase {:?}: engaging with the feed", RunPhase::Execute);
        report.stop_reason = self.execute_pages(&ranking, &mut report).await?;

        match report.stop_reason {
            StopReason::RateLimited => error!(
                "Run halted by platform limit after {} successes",
                report.successes
            ),
            reason => info!("Run finished: {}", reason),
        }
        info!("Phase {:?}", RunPhase::Done);
        Ok(report)
    }

    async fn execute_pages(&self, ranking: &Ranking, report: &mut RunReport) -> Result<StopReason> {
        let engagement = &self.config.engagement;
        let planner = ActionPlanner::new(engagement);
        let executor = ActionExecutor::new(
            self.port,
            self.store,
            self.assistant,
            self.config,
            &self.pacer,
            self.stop.clone(),
        );
        let assistant_available = self.config.assistant.enabled
            && self.assistant.is_some_and(|a| a.is_available());

        let mut consecutive_failures = 0usize;
        let last_page = engagement.start_page + engagement.max_pages - 1;

        for page in engagement.start_page..=last_page {
            if self.stop.is_requested() {
                return Ok(StopReason::StopRequested);
            }

            let posts = load_feed_page(self.port, &self.config.selectors, &self.pacer, page).await?;
            report.pages += 1;
            if posts.is_empty() {
                info!("Feed page {} is empty", page);
                return Ok(StopReason::FeedExhausted);
            }

            let plan = planner
                .plan(&posts, ranking, self.store, assistant_available, Utc::now())
                .await?;
            self.observer.on_plan(page, &plan);

            for entry in plan.iter().filter(|e| e.decision != Decision::Skip) {
                if self.stop.is_requested() {
                    return Ok(StopReason::StopRequested);
                }

                let outcome = executor.execute(entry).await?;
                if outcome == ExecutionOutcome::Fail && self.stop.is_requested() {
                    // Abandoned mid-dialog, not a real failure
                    return Ok(StopReason::StopRequested);
                }

                report.attempts += 1;
                match outcome {
                    ExecutionOutcome::Success => {
                        report.successes += 1;
                        if entry.decision.is_comment() {
                            report.comments += 1;
                        }
                        consecutive_failures = 0;
                    }
                    ExecutionOutcome::Fail => {
                        report.failures += 1;
                        consecutive_failures += 1;
                    }
                    ExecutionOutcome::AlreadyDone => report.already_done += 1,
                    ExecutionOutcome::LimitReached => {}
                }

                self.observer.on_outcome(entry, outcome);
                self.observer.on_progress(&Progress {
                    page,
                    attempts: report.attempts,
                    successes: report.successes,
                    failures: report.failures,
                });

                if outcome == ExecutionOutcome::LimitReached {
                    return Ok(StopReason::RateLimited);
                }
                if report.successes >= engagement.target_successes {
                    return Ok(StopReason::TargetReached);
                }
                if consecutive_failures >= engagement.failure_budget {
                    warn!(
                        "{} consecutive failures, stopping",
                        consecutive_failures
                    );
                    return Ok(StopReason::FailureBudgetExhausted);
                }

                self.pacer.between_items().await;
            }
        }

        Ok(StopReason::PageLimit)
    }
}
