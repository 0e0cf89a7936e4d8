//! Diversity-constrained top-K selection.
//!
//! ## Algorithm
//!
//! 1. Drop updated candidates rated below `rating_threshold`. New candidates
//!    are never filtered, so unrated launches still get visibility.
//! 2. Score everything and sort by `(score desc, name asc, id asc)`.
//! 3. New bucket: truncate to `max_new`. Updated bucket (and the new bucket
//!    when `diversity.apply_to_new` is set): walk the sorted list greedily,
//!    skipping any candidate whose author or primary category is at its cap.
//!    The first accepted candidate of each primary category earns the
//!    one-time category diversity bonus.
//! 4. Re-sort the accepted set, since the bonus can reorder it.
//!
//! Greedy can starve a strong candidate behind a cap. That is accepted: the
//! goal is editorial variety, and caps are small.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::util::number::{finite_or_zero, round4};

use super::scoring::score_all;
use super::types::{Bucket, RankingRecord, ScoredCandidate, ScoringContext};

/// Counters describing what the selector did, for logs and audits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionTrace {
    pub considered: usize,
    pub below_rating_threshold: usize,
    pub skipped_author_cap: usize,
    pub skipped_category_cap: usize,
    pub categories_introduced: usize,
}

/// Result of selecting one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    /// Selected candidates in final rank order.
    pub candidates: Vec<ScoredCandidate>,
    pub trace: SelectionTrace,
}

impl SelectionResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Seam for bucket selection strategies.
pub trait CandidateSelector: Send + Sync {
    /// Rank and select `records` for the bucket named in `context`.
    fn select(&self, records: &[RankingRecord], context: &ScoringContext) -> SelectionResult;
}

/// Default greedy selector with author/category caps.
#[derive(Debug, Clone)]
pub struct DiversitySelector {
    config: ScoringConfig,
}

impl DiversitySelector {
    /// `config` should already be validated.
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl CandidateSelector for DiversitySelector {
    fn select(&self, records: &[RankingRecord], context: &ScoringContext) -> SelectionResult {
        select_with_trace(records, &self.config, context)
    }
}

/// Select and rank one bucket. Output length never exceeds the bucket limit.
#[must_use]
pub fn select(
    records: &[RankingRecord],
    config: &ScoringConfig,
    context: &ScoringContext,
) -> Vec<ScoredCandidate> {
    select_with_trace(records, config, context).candidates
}

/// [`select`] plus the counters describing the walk.
#[must_use]
pub fn select_with_trace(
    records: &[RankingRecord],
    config: &ScoringConfig,
    context: &ScoringContext,
) -> SelectionResult {
    let bucket = context.bucket;
    let limit = config.selection.limit_for(bucket);
    let mut trace = SelectionTrace {
        considered: records.len(),
        ..SelectionTrace::default()
    };

    let eligible: Vec<RankingRecord> = match bucket {
        Bucket::New => records.to_vec(),
        Bucket::Updated => records
            .iter()
            .filter(|record| {
                let passes = finite_or_zero(record.average_rating) >= config.rating_threshold;
                if !passes {
                    trace.below_rating_threshold += 1;
                }
                passes
            })
            .cloned()
            .collect(),
    };

    let mut ranked = score_all(&eligible, config, context);
    ranked.sort_by(rank_order);

    let candidates = if bucket.is_new() && !config.diversity.apply_to_new {
        ranked.truncate(limit);
        ranked
    } else {
        let mut selected = greedy_walk(ranked, config, limit, &mut trace);
        selected.sort_by(rank_order);
        selected
    };

    debug!(
        %bucket,
        considered = trace.considered,
        selected = candidates.len(),
        below_threshold = trace.below_rating_threshold,
        skipped_author_cap = trace.skipped_author_cap,
        skipped_category_cap = trace.skipped_category_cap,
        "bucket selection completed"
    );

    SelectionResult { candidates, trace }
}

fn greedy_walk(
    ranked: Vec<ScoredCandidate>,
    config: &ScoringConfig,
    limit: usize,
    trace: &mut SelectionTrace,
) -> Vec<ScoredCandidate> {
    let mut author_counts: FxHashMap<String, usize> = FxHashMap::default();
    let mut category_counts: FxHashMap<String, usize> = FxHashMap::default();
    let mut selected = Vec::with_capacity(limit.min(ranked.len()));

    for mut candidate in ranked {
        if selected.len() >= limit {
            break;
        }

        let author = candidate.record.author_key().to_string();
        let category = candidate.record.primary_category().to_string();
        let author_count = author_counts.get(&author).copied().unwrap_or(0);
        let category_count = category_counts.get(&category).copied().unwrap_or(0);

        if author_count >= config.diversity.max_per_author {
            trace.skipped_author_cap += 1;
            debug!(id = %candidate.record.id, %author, "author cap reached, skipping");
            continue;
        }
        if category_count >= config.diversity.max_per_category {
            trace.skipped_category_cap += 1;
            debug!(id = %candidate.record.id, %category, "category cap reached, skipping");
            continue;
        }

        if category_count == 0 {
            let bonus = round4(config.weights.category_diversity);
            candidate.score = round4(candidate.score + bonus);
            candidate.breakdown.category_diversity_component = bonus;
            trace.categories_introduced += 1;
        }

        author_counts.insert(author, author_count + 1);
        category_counts.insert(category, category_count + 1);
        selected.push(candidate);
    }

    selected
}

/// Total rank order: score descending, then name ascending, then id ascending.
#[must_use]
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.record.name.cmp(&b.record.name))
        .then_with(|| a.record.id.cmp(&b.record.id))
}
