//! Snapshot differ: splits the catalog into new and updated items for a period.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::catalog::CatalogItem;
use crate::period::MonthToken;

use super::types::{Bucket, RankingRecord, RankingSnapshot, SnapshotCounts};

/// Produces [`RankingSnapshot`]s from a fully materialised catalog.
#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    /// Keep items first released in the period out of the updated bucket.
    exclusive: bool,
}

impl SnapshotDiffer {
    #[must_use]
    pub fn new() -> Self {
        Self { exclusive: true }
    }

    /// A differ that also lists first-month releases as updates when their
    /// latest release is in the same period. Only useful for callers that
    /// want the first-release bonus to apply.
    #[must_use]
    pub fn overlapping() -> Self {
        Self { exclusive: false }
    }

    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Diff `catalog` for `period`, measuring recency against `as_of`.
    #[must_use]
    pub fn diff(
        &self,
        catalog: &[CatalogItem],
        period: MonthToken,
        as_of: DateTime<Utc>,
    ) -> RankingSnapshot {
        let mut new_items = Vec::new();
        let mut updated_items = Vec::new();
        let mut skipped = 0usize;

        for item in catalog {
            if !item.is_well_formed() {
                skipped += 1;
                continue;
            }

            let first_month = item.first_release.as_ref().map(MonthToken::of);
            let latest_month = item.latest_release.as_ref().map(MonthToken::of);
            let is_new = first_month == Some(period);

            if is_new {
                new_items.push(project(item, Bucket::New, as_of));
            }
            if latest_month == Some(period) && (!is_new || !self.exclusive) {
                updated_items.push(project(item, Bucket::Updated, as_of));
            }
        }

        if skipped > 0 {
            debug!(%period, skipped, "skipped catalog items without id or name");
        }

        let counts = SnapshotCounts {
            new_plugins: new_items.len(),
            updated_plugins: updated_items.len(),
        };
        info!(
            %period,
            catalog_size = catalog.len(),
            new_plugins = counts.new_plugins,
            updated_plugins = counts.updated_plugins,
            "snapshot diff completed"
        );

        RankingSnapshot {
            period: period.to_string(),
            generated_at: as_of,
            counts,
            new_items,
            updated_items,
        }
    }

    /// Like [`SnapshotDiffer::diff`] but takes an unvalidated token. A
    /// malformed token yields an empty snapshot instead of an error.
    #[must_use]
    pub fn diff_token(
        &self,
        catalog: &[CatalogItem],
        period: &str,
        as_of: DateTime<Utc>,
    ) -> RankingSnapshot {
        match MonthToken::parse(period) {
            Ok(month) => self.diff(catalog, month, as_of),
            Err(error) => {
                debug!(%error, "malformed period, emitting empty snapshot");
                RankingSnapshot::empty(period, as_of)
            }
        }
    }
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new()
    }
}

fn project(item: &CatalogItem, bucket: Bucket, as_of: DateTime<Utc>) -> RankingRecord {
    let release_date = match bucket {
        Bucket::New => item.first_release,
        Bucket::Updated => item.latest_release,
    };

    RankingRecord {
        id: item.id.trim().to_string(),
        name: item.name.trim().to_string(),
        author: item.author_or_unknown().to_string(),
        categories: item.categories.clone(),
        total_downloads: item.total_downloads,
        average_rating: crate::util::number::finite_or_zero(item.average_rating).max(0.0),
        recency_days: release_date.map(|released| days_since(released, as_of)),
        release_date,
        first_release_date: item.first_release,
    }
}

/// Whole days from `released` to `as_of`, floored, never negative.
#[must_use]
pub fn days_since(released: DateTime<Utc>, as_of: DateTime<Utc>) -> u32 {
    let days = (as_of - released).num_days().max(0);
    u32::try_from(days).unwrap_or(u32::MAX)
}
