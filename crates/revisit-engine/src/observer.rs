//! Run observers
//!
//! The orchestrator reports rankings, plans and per-item progress through a
//! [`RunObserver`]. [`LoggingObserver`] renders them through `tracing`.

use revisit_core::{ActionPlanEntry, ExecutionOutcome, RankingEntry};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::planner::format_plan;
use crate::ranking::format_ranking;

/// Counters reported after every executed item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub page: usize,
    pub attempts: usize,
    pub successes: usize,
    pub failures: usize,
}

/// Callbacks for a run; every method defaults to doing nothing
pub trait RunObserver: Send + Sync {
    /// Ranking recomputed after the scan phase
    fn on_ranking(&self, _ranking: &[RankingEntry]) {}

    /// Plan computed for a feed page, before any of it runs
    fn on_plan(&self, _page: usize, _plan: &[ActionPlanEntry]) {}

    /// Outcome of one executed entry
    fn on_outcome(&self, _entry: &ActionPlanEntry, _outcome: ExecutionOutcome) {}

    /// Counters after every executed entry
    fn on_progress(&self, _progress: &Progress) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Observer that logs tables and progress lines
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    ranking_rows: usize,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self { ranking_rows: 20 }
    }
}

impl LoggingObserver {
    pub fn new(ranking_rows: usize) -> Self {
        Self { ranking_rows }
    }
}

impl RunObserver for LoggingObserver {
    fn on_ranking(&self, ranking: &[RankingEntry]) {
        if ranking.is_empty() {
            info!("Ranking is empty; every post will be liked only");
            return;
        }
        info!(
            "Ranking ({} counterparties)\n{}",
            ranking.len(),
            format_ranking(ranking, self.ranking_rows)
        );
    }

    fn on_plan(&self, page: usize, plan: &[ActionPlanEntry]) {
        info!("\n{}", format_plan(page, plan));
    }

    fn on_progress(&self, p: &Progress) {
        info!(
            "page {} | attempts {} | successes {} | failures {}",
            p.page, p.attempts, p.successes, p.failures
        );
    }
}
