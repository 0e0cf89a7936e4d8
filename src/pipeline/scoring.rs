//! Scoring function for ranking records.
//!
//! A score is the sum of independently weighted components:
//!
//! - **downloads**: `log10(total_downloads + 1) * downloads_log10`
//! - **rating**: `average_rating * average_rating_weight` (unrated items score 0)
//! - **recency**: per [`RecencyPolicy`]
//! - **new bonus**: `new_plugin_bonus` for the new bucket
//! - **first-release bonus**: `new_plugin_bonus * first_release_bonus_factor`
//!   for updated items whose first release is also in the digest month
//!
//! The category diversity component is always zero here; the selector adds
//! it when a candidate opens a new category.

use tracing::debug;

use crate::config::{RecencyPolicy, ScoringConfig};
use crate::util::number::{finite_or, finite_or_zero, round4};

use super::types::{RankingRecord, ScoreBreakdown, ScoredCandidate, ScoringContext};

/// Score one record. Pure: same inputs, same output, bit for bit.
#[must_use]
pub fn score(
    record: &RankingRecord,
    config: &ScoringConfig,
    context: &ScoringContext,
) -> ScoredCandidate {
    let weights = &config.weights;

    #[allow(clippy::cast_precision_loss)]
    let downloads = record.total_downloads as f64;
    let downloads_component = (downloads + 1.0).log10() * weights.downloads_log10;

    if !record.average_rating.is_finite() {
        debug!(id = %record.id, "non-finite rating coerced to 0");
    }
    let rating = finite_or_zero(record.average_rating).max(0.0);
    let rating_component = rating * weights.average_rating;

    let recency_component = recency_component(record, config, context);

    let new_bonus_component = if context.is_new() {
        weights.new_plugin_bonus
    } else {
        0.0
    };

    let first_release_bonus_component =
        if !context.is_new() && context.in_month(record.first_release_date.as_ref()) {
            weights.new_plugin_bonus * config.first_release_bonus_factor
        } else {
            0.0
        };

    let raw = [
        downloads_component,
        rating_component,
        recency_component,
        new_bonus_component,
        first_release_bonus_component,
    ]
    .map(finite_or_zero);

    let breakdown = ScoreBreakdown {
        downloads_component: round4(raw[0]),
        rating_component: round4(raw[1]),
        recency_component: round4(raw[2]),
        new_bonus_component: round4(raw[3]),
        first_release_bonus_component: round4(raw[4]),
        category_diversity_component: 0.0,
    };

    ScoredCandidate {
        record: record.clone(),
        score: round4(raw.iter().sum()),
        breakdown,
    }
}

/// Score every record of a bucket, preserving input order.
#[must_use]
pub fn score_all(
    records: &[RankingRecord],
    config: &ScoringConfig,
    context: &ScoringContext,
) -> Vec<ScoredCandidate> {
    records
        .iter()
        .map(|record| score(record, config, context))
        .collect()
}

fn recency_component(
    record: &RankingRecord,
    config: &ScoringConfig,
    context: &ScoringContext,
) -> f64 {
    let window = f64::from(config.recency_window_days);
    let boost = config.weights.recency_boost;

    match config.recency_policy {
        RecencyPolicy::EventInMonth if context.in_month(record.release_date.as_ref()) => {
            window * boost
        }
        RecencyPolicy::Window | RecencyPolicy::EventInMonth => {
            // Missing recency counts as maximally stale.
            let days = finite_or(record.recency_days.map(f64::from), window);
            (window - days).max(0.0) * boost
        }
    }
}
