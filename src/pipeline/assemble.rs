//! Digest assembly: packages snapshot counts and ranked buckets.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::select::rank_order;
use super::types::{RankingSnapshot, ScoredCandidate, SnapshotCounts};

/// Editorial workflow state of a draft. Generated drafts always start as
/// [`ReviewStatus::Draft`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Draft,
    Reviewed,
    Approved,
    Published,
}

impl ReviewStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Reviewed => "reviewed",
            Self::Approved => "approved",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 自動生成ドラフトに付与する編集者向けの定型メモ。
pub const DEFAULT_EDITORIAL_NOTES: &[&str] = &[
    "Draft generated automatically from monthly snapshot rankings.",
    "Replace rationale text with editor-approved commentary before moving to review.",
];

/// Pass-through metadata supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub review_status: ReviewStatus,
    /// Where the snapshot lives, e.g. `monthly/2024-03.json`.
    pub source_snapshot: Option<String>,
    #[serde(default)]
    pub editorial_notes: Vec<String>,
}

impl GenerationMetadata {
    /// A fresh draft carrying [`DEFAULT_EDITORIAL_NOTES`].
    #[must_use]
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            review_status: ReviewStatus::Draft,
            source_snapshot: None,
            editorial_notes: DEFAULT_EDITORIAL_NOTES
                .iter()
                .copied()
                .map(String::from)
                .collect(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_snapshot = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_review_status(mut self, status: ReviewStatus) -> Self {
        self.review_status = status;
        self
    }

    /// Replace the editorial notes.
    #[must_use]
    pub fn with_editorial_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.editorial_notes = notes.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// 1-based.
    pub rank: usize,
    #[serde(flatten)]
    pub candidate: ScoredCandidate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestCounts {
    #[serde(flatten)]
    pub snapshot: SnapshotCounts,
    pub selected_new: usize,
    pub selected_updated: usize,
}

/// Final ranked structure handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRecord {
    pub period: String,
    pub metadata: GenerationMetadata,
    pub snapshot_generated_at: DateTime<Utc>,
    pub counts: DigestCounts,
    pub top_new: Vec<RankedEntry>,
    pub top_updated: Vec<RankedEntry>,
}

impl DigestRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top_new.is_empty() && self.top_updated.is_empty()
    }
}

/// Combine a snapshot with its selected buckets.
#[must_use]
pub fn assemble(
    snapshot: &RankingSnapshot,
    scored_new: Vec<ScoredCandidate>,
    scored_updated: Vec<ScoredCandidate>,
    metadata: GenerationMetadata,
) -> DigestRecord {
    let top_new = label(scored_new);
    let top_updated = label(scored_updated);

    DigestRecord {
        period: snapshot.period.clone(),
        metadata,
        snapshot_generated_at: snapshot.generated_at,
        counts: DigestCounts {
            snapshot: snapshot.counts,
            selected_new: top_new.len(),
            selected_updated: top_updated.len(),
        },
        top_new,
        top_updated,
    }
}

fn label(mut candidates: Vec<ScoredCandidate>) -> Vec<RankedEntry> {
    candidates.sort_by(rank_order);
    candidates
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| RankedEntry {
            rank: index + 1,
            candidate,
        })
        .collect()
}
