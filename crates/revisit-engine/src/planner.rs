//! Per-post action planning
//!
//! The whole page is planned before anything is executed, so every entry is
//! a snapshot of the ranking and ledger as they stood when the page loaded.

use chrono::{DateTime, Utc};
use revisit_core::{
    ActionPlanEntry, Decision, EngagementConfig, FeedPost, RankingEntry, Result, VisitLedger,
};
use tracing::debug;

use crate::ranking::Ranking;

/// Decision for one post, in priority order:
/// commenters off cooldown get a comment (assistant-written when one is
/// available), repliers off cooldown get a template comment, everyone else
/// with a known author gets a like.
pub fn decide(
    entry: Option<&RankingEntry>,
    cooldown_clear: bool,
    assistant_available: bool,
) -> Decision {
    match entry {
        Some(e) if e.comments > 0 && cooldown_clear => {
            if assistant_available {
                Decision::AiComment
            } else {
                Decision::TemplateComment
            }
        }
        Some(e) if e.replies > 0 && cooldown_clear => Decision::TemplateComment,
        _ => Decision::LikeOnly,
    }
}

/// Builds the action plan for one feed page
pub struct ActionPlanner<'a> {
    config: &'a EngagementConfig,
}

impl<'a> ActionPlanner<'a> {
    pub fn new(config: &'a EngagementConfig) -> Self {
        Self { config }
    }

    pub async fn plan<L: VisitLedger + ?Sized>(
        &self,
        posts: &[FeedPost],
        ranking: &Ranking,
        ledger: &L,
        assistant_available: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActionPlanEntry>> {
        let mut plan = Vec::with_capacity(posts.len());

        for post in posts {
            let author = post.author.trim();
            if author.is_empty() {
                debug!("Post #{} has no resolvable author", post.index);
                plan.push(ActionPlanEntry {
                    feed_item_index: post.index,
                    counterparty: String::new(),
                    ledger_key: String::new(),
                    url: post.url.clone(),
                    decision: Decision::Skip,
                    stats: None,
                    cooldown_clear: false,
                });
                continue;
            }

            let entry = ranking.get(author);
            let ledger_key = post.ledger_key().trim().to_string();
            let cooldown_clear = ledger
                .can_engage(&ledger_key, self.config.cooldown_days, now)
                .await?;

            plan.push(ActionPlanEntry {
                feed_item_index: post.index,
                counterparty: author.to_string(),
                ledger_key,
                url: post.url.clone(),
                decision: decide(entry, cooldown_clear, assistant_available),
                stats: entry.map(RankingEntry::counts),
                cooldown_clear,
            });
        }

        Ok(plan)
    }
}

/// Fixed-width table of a plan, for operators to audit before execution
pub fn format_plan(page: usize, plan: &[ActionPlanEntry]) -> String {
    let mut out = format!("Action plan for feed page {}\n", page);
    out.push_str(&format!(
        "{:>3}  {:<20} {:<17} {:>5} {:>5} {:>5}  {}\n",
        "#", "author", "decision", "cmt", "rpl", "like", "cooldown"
    ));
    for entry in plan {
        let (c, r, l) = match &entry.stats {
            Some(s) => (
                s.comments.to_string(),
                s.replies.to_string(),
                s.likes.to_string(),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        let author = if entry.counterparty.is_empty() {
            "(unknown)"
        } else {
            entry.counterparty.as_str()
        };
        out.push_str(&format!(
            "{:>3}  {:<20} {:<17} {:>5} {:>5} {:>5}  {}\n",
            entry.feed_item_index + 1,
            author,
            entry.decision.to_string(),
            c,
            r,
            l,
            if entry.cooldown_clear { "clear" } else { "active" }
        ));
    }
    out
}
