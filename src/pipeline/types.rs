//! Core type definitions shared by the ranking stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::UNKNOWN_AUTHOR;
use crate::period::MonthToken;
use crate::util::text::non_blank_or;

/// Category label used when an item has none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Which half of the digest a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// First released in the period.
    New,
    /// Released again in the period, first released earlier.
    Updated,
}

impl Bucket {
    #[must_use]
    pub fn is_new(self) -> bool {
        matches!(self, Bucket::New)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bucket::New => write!(f, "new"),
            Bucket::Updated => write!(f, "updated"),
        }
    }
}

/// Ranking-relevant projection of a catalog item for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRecord {
    pub id: String,
    pub name: String,
    pub author: String,
    pub categories: Vec<String>,
    pub total_downloads: u64,
    /// `0.0` means "no ratings yet".
    pub average_rating: f64,
    /// Whole days between the qualifying release and the snapshot instant.
    /// `None` when the release date was unusable; scored as maximally stale.
    pub recency_days: Option<u32>,
    /// The release that put the item in its bucket.
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_release_date: Option<DateTime<Utc>>,
}

impl RankingRecord {
    /// Primary category for diversity caps.
    #[must_use]
    pub fn primary_category(&self) -> &str {
        non_blank_or(self.categories.first().map(String::as_str), UNCATEGORIZED)
    }

    /// Author key for diversity caps.
    #[must_use]
    pub fn author_key(&self) -> &str {
        non_blank_or(Some(self.author.as_str()), UNKNOWN_AUTHOR)
    }

    #[must_use]
    pub fn is_rated(&self) -> bool {
        self.average_rating.is_finite() && self.average_rating > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCounts {
    pub new_plugins: usize,
    pub updated_plugins: usize,
}

/// New and updated items for one period. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSnapshot {
    /// The period token as supplied; may be malformed, in which case both
    /// buckets are empty.
    pub period: String,
    pub generated_at: DateTime<Utc>,
    pub counts: SnapshotCounts,
    /// Catalog order, not rank order.
    pub new_items: Vec<RankingRecord>,
    /// Catalog order, not rank order.
    pub updated_items: Vec<RankingRecord>,
}

impl RankingSnapshot {
    #[must_use]
    pub fn empty(period: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            period: period.into(),
            generated_at,
            counts: SnapshotCounts::default(),
            new_items: Vec::new(),
            updated_items: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty() && self.updated_items.is_empty()
    }

    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> &[RankingRecord] {
        match bucket {
            Bucket::New => &self.new_items,
            Bucket::Updated => &self.updated_items,
        }
    }

    /// The period as a validated token, if it is one.
    #[must_use]
    pub fn month(&self) -> Option<MonthToken> {
        MonthToken::parse(&self.period).ok()
    }
}

/// Period context handed to the scoring function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringContext {
    /// `None` for a malformed period: nothing counts as "in month".
    pub month: Option<MonthToken>,
    pub bucket: Bucket,
}

impl ScoringContext {
    #[must_use]
    pub fn new(month: MonthToken, bucket: Bucket) -> Self {
        Self {
            month: Some(month),
            bucket,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.bucket.is_new()
    }

    pub(crate) fn in_month(&self, instant: Option<&DateTime<Utc>>) -> bool {
        self.month.is_some_and(|m| m.contains_opt(instant))
    }
}

/// Named additive components of a score, each rounded to four decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub downloads_component: f64,
    pub rating_component: f64,
    pub recency_component: f64,
    pub new_bonus_component: f64,
    pub first_release_bonus_component: f64,
    pub category_diversity_component: f64,
}

impl ScoreBreakdown {
    /// `(name, value)` pairs in a fixed order.
    #[must_use]
    pub fn components(&self) -> [(&'static str, f64); 6] {
        [
            ("downloadsComponent", self.downloads_component),
            ("ratingComponent", self.rating_component),
            ("recencyComponent", self.recency_component),
            ("newBonusComponent", self.new_bonus_component),
            ("firstReleaseBonusComponent", self.first_release_bonus_component),
            ("categoryDiversityComponent", self.category_diversity_component),
        ]
    }

    /// Look a component up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.components()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// A record with its score and the breakdown that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub record: RankingRecord,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}
