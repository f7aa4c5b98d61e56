//! Reputation ranking
//!
//! A pure function of the stored stats: weighted score, descending, with
//! ties kept in input order.

use revisit_core::{EngagementCounts, NeighborStats, RankingEntry, ScoringWeights};
use std::collections::HashMap;

/// Weighted score of one counterparty's engagement
pub fn score(counts: &EngagementCounts, weights: &ScoringWeights) -> u64 {
    counts.comments * weights.comment_weight
        + counts.replies * weights.reply_weight
        + counts.likes * weights.like_weight
}

/// Rank `stats` by score, highest first.
///
/// The sort is stable, so equal scores keep the order of `stats`.
pub fn rank(stats: &[NeighborStats], weights: &ScoringWeights) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = stats
        .iter()
        .map(|s| RankingEntry {
            counterparty: s.counterparty.clone(),
            likes: s.likes,
            comments: s.comments,
            replies: s.replies,
            score: score(&s.counts(), weights),
        })
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// Ranking with lookup by counterparty
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    entries: Vec<RankingEntry>,
    positions: HashMap<String, usize>,
}

impl Ranking {
    pub fn new(entries: Vec<RankingEntry>) -> Self {
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.counterparty.clone(), i))
            .collect();
        Self { entries, positions }
    }

    pub fn from_stats(stats: &[NeighborStats], weights: &ScoringWeights) -> Self {
        Self::new(rank(stats, weights))
    }

    pub fn get(&self, counterparty: &str) -> Option<&RankingEntry> {
        self.positions.get(counterparty).map(|&i| &self.entries[i])
    }

    /// 1-based rank
    pub fn position(&self, counterparty: &str) -> Option<usize> {
        self.positions.get(counterparty).map(|i| i + 1)
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed-width table of the top `limit` entries
pub fn format_ranking(entries: &[RankingEntry], limit: usize) -> String {
    let mut out = format!(
        "{:>4}  {:<20} {:>6} {:>8} {:>7} {:>5}\n",
        "rank", "counterparty", "score", "comments", "replies", "likes"
    );
    for (i, e) in entries.iter().take(limit).enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<20} {:>6} {:>8} {:>7} {:>5}\n",
            i + 1,
            e.counterparty,
            e.score,
            e.comments,
            e.replies,
            e.likes
        ));
    }
    if entries.len() > limit {
        out.push_str(&format!("      ... {} more\n", entries.len() - limit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> ScoringWeights {
        ScoringWeights::default()
    }

    #[test]
    fn test_score() {
        let counts = EngagementCounts::new(2, 5, 1);
        assert_eq!(score(&counts, &weights()), 50 + 3 + 2);
    }

    #[test]
    fn test_rank_descending() {
        let stats = vec![
            NeighborStats::new("liker", 9, 0, 0),
            NeighborStats::new("commenter", 0, 2, 0),
            NeighborStats::new("replier", 0, 0, 2),
        ];
        let ranked = rank(&stats, &weights());
        let names: Vec<&str> = ranked.iter().map(|e| e.counterparty.as_str()).collect();
        assert_eq!(names, vec!["commenter", "liker", "replier"]);
        assert_eq!(ranked[0].score, 20);
    }

    #[test]
    fn test_ties_keep_input_order() {
        // Different mixes, same score of 53
        let stats = vec![
            NeighborStats::new("A", 0, 5, 1),
            NeighborStats::new("B", 3, 5, 0),
            NeighborStats::new("C", 1, 1, 0),
        ];
        let ranked = rank(&stats, &weights());
        assert_eq!(ranked[0].counterparty, "A");
        assert_eq!(ranked[0].score, 53);
        assert_eq!(ranked[1].counterparty, "B");
        assert_eq!(ranked[1].score, 53);

        let reversed: Vec<NeighborStats> = stats.iter().rev().cloned().collect();
        let ranked = rank(&reversed, &weights());
        assert_eq!(ranked[0].counterparty, "B");
        assert_eq!(ranked[1].counterparty, "A");
    }

    #[test]
    fn test_rank_is_deterministic() {
        let stats = vec![
            NeighborStats::new("x", 1, 2, 3),
            NeighborStats::new("y", 3, 2, 1),
            NeighborStats::new("z", 0, 0, 0),
        ];
        assert_eq!(rank(&stats, &weights()), rank(&stats, &weights()));
    }

    #[test]
    fn test_ranking_lookup() {
        let ranking = Ranking::from_stats(
            &[
                NeighborStats::new("low", 1, 0, 0),
                NeighborStats::new("high", 0, 1, 0),
            ],
            &weights(),
        );
        assert_eq!(ranking.position("high"), Some(1));
        assert_eq!(ranking.get("low").unwrap().score, 1);
        assert!(ranking.get("nobody").is_none());
    }

    #[test]
    fn test_format_ranking_truncates() {
        let entries = rank(
            &[
                NeighborStats::new("a", 0, 1, 0),
                NeighborStats::new("b", 1, 0, 0),
            ],
            &weights(),
        );
        let table = format_ranking(&entries, 1);
        assert!(table.contains("a"));
        assert!(table.contains("1 more"));
    }
}
