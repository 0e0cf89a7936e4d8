use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, info_span};

use crate::catalog::CatalogItem;
use crate::config::{ConfigError, ScoringConfig};
use crate::period::MonthToken;

pub mod assemble;
pub mod diff;
pub mod render;
pub mod scoring;
pub mod select;
pub mod types;

pub use assemble::{
    DigestCounts, DigestRecord, GenerationMetadata, RankedEntry, ReviewStatus, assemble,
};
pub use diff::SnapshotDiffer;
pub use render::render_markdown;
pub use scoring::{score, score_all};
pub use select::{
    CandidateSelector, DiversitySelector, SelectionResult, SelectionTrace, rank_order, select,
    select_with_trace,
};
pub use types::{
    Bucket, RankingRecord, RankingSnapshot, ScoreBreakdown, ScoredCandidate, ScoringContext,
    SnapshotCounts,
};

/// Everything one digest run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub snapshot: RankingSnapshot,
    pub digest: DigestRecord,
    pub new_trace: SelectionTrace,
    pub updated_trace: SelectionTrace,
}

/// Diff, select and assemble in one call.
#[derive(Clone)]
pub struct DigestPipeline {
    differ: SnapshotDiffer,
    selector: Arc<dyn CandidateSelector>,
}

impl std::fmt::Debug for DigestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestPipeline")
            .field("differ", &self.differ)
            .finish_non_exhaustive()
    }
}

impl DigestPipeline {
    /// Build the default pipeline.
    ///
    /// # Errors
    /// `config` が検証に失敗した場合はエラーを返す。
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        Ok(Self {
            differ: SnapshotDiffer::new(),
            selector: Arc::new(DiversitySelector::new(config)),
        })
    }

    #[must_use]
    pub fn with_differ(mut self, differ: SnapshotDiffer) -> Self {
        self.differ = differ;
        self
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Run the whole pipeline for one period.
    #[must_use]
    pub fn run(
        &self,
        catalog: &[CatalogItem],
        period: MonthToken,
        as_of: DateTime<Utc>,
        metadata: GenerationMetadata,
    ) -> PipelineOutput {
        let span = info_span!("digest_run", %period);
        let _guard = span.enter();

        let snapshot = self.differ.diff(catalog, period, as_of);
        self.finish(snapshot, metadata)
    }

    /// Like [`DigestPipeline::run`] for an unvalidated period token. A
    /// malformed token produces an empty digest.
    #[must_use]
    pub fn run_token(
        &self,
        catalog: &[CatalogItem],
        period: &str,
        as_of: DateTime<Utc>,
        metadata: GenerationMetadata,
    ) -> PipelineOutput {
        let span = info_span!("digest_run", period);
        let _guard = span.enter();

        let snapshot = self.differ.diff_token(catalog, period, as_of);
        self.finish(snapshot, metadata)
    }

    /// Only the differ stage, for callers that persist the snapshot before
    /// selecting.
    #[must_use]
    pub fn diff(
        &self,
        catalog: &[CatalogItem],
        period: MonthToken,
        as_of: DateTime<Utc>,
    ) -> RankingSnapshot {
        self.differ.diff(catalog, period, as_of)
    }

    /// Select and assemble from an already computed snapshot.
    #[must_use]
    pub fn finish(&self, snapshot: RankingSnapshot, metadata: GenerationMetadata) -> PipelineOutput {
        let month = snapshot.month();
        let new = self.selector.select(
            &snapshot.new_items,
            &ScoringContext {
                month,
                bucket: Bucket::New,
            },
        );
        let updated = self.selector.select(
            &snapshot.updated_items,
            &ScoringContext {
                month,
                bucket: Bucket::Updated,
            },
        );

        let digest = assemble(&snapshot, new.candidates, updated.candidates, metadata);
        info!(
            period = %digest.period,
            selected_new = digest.counts.selected_new,
            selected_updated = digest.counts.selected_updated,
            "digest assembled"
        );

        PipelineOutput {
            snapshot,
            digest,
            new_trace: new.trace,
            updated_trace: updated.trace,
        }
    }
}

/// Rank several periods in parallel. Output order follows `periods`.
///
/// # Errors
/// Returns an error when `config` is invalid.
pub fn rank_periods(
    catalog: &[CatalogItem],
    periods: &[MonthToken],
    config: ScoringConfig,
    as_of: DateTime<Utc>,
) -> Result<Vec<PipelineOutput>, ConfigError> {
    let pipeline = DigestPipeline::new(config)?;
    Ok(periods
        .par_iter()
        .map(|period| pipeline.run(catalog, *period, as_of, GenerationMetadata::new(as_of)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::parse_timestamp;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).expect("timestamp")
    }

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("new-1", "Fresh")
                .with_author("Ann")
                .with_categories(["Data"])
                .with_downloads(120)
                .with_first_release(ts("2024-03-05T00:00:00Z"))
                .with_latest_release(ts("2024-03-05T00:00:00Z")),
            CatalogItem::new("upd-1", "Mature")
                .with_author("Bo")
                .with_categories(["Tools"])
                .with_downloads(50_000)
                .with_rating(4.6)
                .with_first_release(ts("2021-01-01T00:00:00Z"))
                .with_latest_release(ts("2024-03-20T00:00:00Z")),
            CatalogItem::new("upd-2", "Lowly")
                .with_author("Cy")
                .with_categories(["Tools"])
                .with_downloads(90_000)
                .with_rating(3.1)
                .with_first_release(ts("2020-01-01T00:00:00Z"))
                .with_latest_release(ts("2024-03-22T00:00:00Z")),
        ]
    }

    #[test]
    fn run_produces_ranked_digest() {
        let pipeline = DigestPipeline::new(ScoringConfig::default()).expect("valid config");
        let as_of = ts("2024-04-01T00:00:00Z");
        let month = MonthToken::parse("2024-03").expect("month");

        let output = pipeline.run(&catalog(), month, as_of, GenerationMetadata::new(as_of));

        assert_eq!(output.snapshot.counts.new_plugins, 1);
        assert_eq!(output.snapshot.counts.updated_plugins, 2);
        assert_eq!(output.digest.top_new.len(), 1);
        assert_eq!(output.digest.top_updated.len(), 1);
        assert_eq!(output.digest.top_updated[0].candidate.record.id, "upd-1");
        assert_eq!(output.updated_trace.below_rating_threshold, 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ScoringConfig::default();
        config.selection.max_new = 0;
        assert!(DigestPipeline::new(config).is_err());
    }

    #[test]
    fn malformed_token_yields_empty_digest() {
        let pipeline = DigestPipeline::new(ScoringConfig::default()).expect("valid config");
        let as_of = ts("2024-04-01T00:00:00Z");

        let output = pipeline.run_token(&catalog(), "March", as_of, GenerationMetadata::new(as_of));

        assert!(output.snapshot.is_empty());
        assert!(output.digest.is_empty());
        assert_eq!(output.digest.period, "March");
    }

    #[test]
    fn overlapping_differ_enables_first_release_bonus() {
        let pipeline = DigestPipeline::new(ScoringConfig::default())
            .expect("valid config")
            .with_differ(SnapshotDiffer::overlapping());
        let as_of = ts("2024-04-01T00:00:00Z");
        let month = MonthToken::parse("2024-03").expect("month");
        let catalog = vec![
            CatalogItem::new("fresh", "Fresh")
                .with_rating(4.5)
                .with_first_release(ts("2024-03-02T00:00:00Z"))
                .with_latest_release(ts("2024-03-20T00:00:00Z")),
        ];

        let output = pipeline.run(&catalog, month, as_of, GenerationMetadata::new(as_of));

        assert_eq!(output.digest.top_new.len(), 1);
        let updated = &output.digest.top_updated[0].candidate;
        assert!((updated.breakdown.first_release_bonus_component - 2.5).abs() < 1e-9);
    }

    #[test]
    fn custom_selector_replaces_default() {
        struct NothingSelector;

        impl CandidateSelector for NothingSelector {
            fn select(&self, records: &[RankingRecord], _: &ScoringContext) -> SelectionResult {
                SelectionResult {
                    candidates: Vec::new(),
                    trace: SelectionTrace {
                        considered: records.len(),
                        ..SelectionTrace::default()
                    },
                }
            }
        }

        let pipeline = DigestPipeline::new(ScoringConfig::default())
            .expect("valid config")
            .with_selector(Arc::new(NothingSelector));
        let as_of = ts("2024-04-01T00:00:00Z");
        let month = MonthToken::parse("2024-03").expect("month");

        let output = pipeline.run(&catalog(), month, as_of, GenerationMetadata::new(as_of));

        assert!(output.digest.is_empty());
        assert_eq!(output.snapshot.counts.updated_plugins, 2);
        assert_eq!(output.updated_trace.considered, 2);
    }

    #[test]
    fn rank_periods_keeps_period_order() {
        let as_of = ts("2024-04-01T00:00:00Z");
        let periods: Vec<MonthToken> = ["2024-03", "2021-01", "2020-01"]
            .into_iter()
            .map(|raw| MonthToken::parse(raw).expect("month"))
            .collect();

        let outputs =
            rank_periods(&catalog(), &periods, ScoringConfig::default(), as_of).expect("valid");

        let labels: Vec<&str> = outputs.iter().map(|o| o.digest.period.as_str()).collect();
        assert_eq!(labels, vec!["2024-03", "2021-01", "2020-01"]);
        assert_eq!(outputs[1].digest.top_new[0].candidate.record.id, "upd-1");
    }
}
