//! Catalog schema and lenient feed parsing.
//!
//! The upstream plugin feed is loosely typed: numbers arrive as strings,
//! optional fields come and go, categories are a comma-separated string.
//! [`parse_catalog`] turns that into typed [`CatalogItem`]s, coercing bad
//! values to safe defaults and dropping only entries that cannot be
//! identified at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::period::parse_timestamp;
use crate::util::number::{lenient_count, lenient_f64};

/// Author label used when the feed has no author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// One plugin as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Ordered; the first entry is the primary category.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub total_downloads: u64,
    /// `0.0` means "no ratings yet".
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub first_release: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_release: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub nuget_id: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub is_open_source: Option<bool>,
    #[serde(default)]
    pub author_is_mvp: Option<bool>,
}

impl CatalogItem {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author: None,
            categories: Vec::new(),
            total_downloads: 0,
            average_rating: 0.0,
            first_release: None,
            latest_release: None,
            version: None,
            nuget_id: None,
            project_url: None,
            is_open_source: None,
            author_is_mvp: None,
        }
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_downloads(mut self, total_downloads: u64) -> Self {
        self.total_downloads = total_downloads;
        self
    }

    #[must_use]
    pub fn with_rating(mut self, average_rating: f64) -> Self {
        self.average_rating = average_rating;
        self
    }

    #[must_use]
    pub fn with_first_release(mut self, at: DateTime<Utc>) -> Self {
        self.first_release = Some(at);
        self
    }

    #[must_use]
    pub fn with_latest_release(mut self, at: DateTime<Utc>) -> Self {
        self.latest_release = Some(at);
        self
    }

    /// Author name, or [`UNKNOWN_AUTHOR`] when absent or blank.
    #[must_use]
    pub fn author_or_unknown(&self) -> &str {
        crate::util::text::non_blank_or(self.author.as_deref(), UNKNOWN_AUTHOR)
    }

    /// An item needs a non-blank id and name to be ranked.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

const ID_KEYS: &[&str] = &["mctools_pluginid", "id", "pluginId"];
const NAME_KEYS: &[&str] = &["mctools_name", "name"];
const AUTHOR_KEYS: &[&str] = &["mctools_authors", "author"];
const CATEGORY_KEYS: &[&str] = &["mctools_categorieslist", "categories"];
const DOWNLOAD_KEYS: &[&str] = &["mctools_totaldownloadcount", "totalDownloads"];
const RATING_KEYS: &[&str] = &[
    "mctools_averagefeedbackratingallversions",
    "averageRating",
];
const FIRST_RELEASE_KEYS: &[&str] = &["mctools_firstreleasedate", "firstReleaseDate"];
const LATEST_RELEASE_KEYS: &[&str] = &["mctools_latestreleasedate", "latestReleaseDate"];
const VERSION_KEYS: &[&str] = &["mctools_version", "version"];
const NUGET_KEYS: &[&str] = &["mctools_nugetid", "nugetId"];
const PROJECT_URL_KEYS: &[&str] = &["mctools_projecturl", "projectUrl"];
const OPEN_SOURCE_KEYS: &[&str] = &["mctools_isopensource", "isOpenSource"];
const MVP_KEYS: &[&str] = &["mctools_ismvp", "authorIsMvp"];

/// Parse a feed document into catalog items.
///
/// Accepts either a bare array of entries or an `OData` envelope
/// (`{ "value": [...] }`). Any other shape yields an empty catalog.
#[must_use]
pub fn parse_catalog(document: &Value) -> Vec<CatalogItem> {
    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(envelope) => {
            let Some(Value::Array(entries)) = envelope.get("value") else {
                warn!("catalog document has no value array, treating as empty");
                return Vec::new();
            };
            entries
        }
        _ => {
            warn!("catalog document is neither an array nor an envelope, treating as empty");
            return Vec::new();
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;
    for (index, entry) in entries.iter().enumerate() {
        if let Some(item) = entry.as_object().and_then(parse_entry) {
            items.push(item);
        } else {
            dropped += 1;
            debug!(index, "dropping catalog entry without id or name");
        }
    }

    if dropped > 0 {
        warn!(
            dropped,
            kept = items.len(),
            "catalog contained malformed entries"
        );
    }
    items
}

/// Parse a feed document from its JSON text.
///
/// # Errors
/// Returns the JSON syntax error when `raw` is not valid JSON. Shape problems
/// inside valid JSON never error; see [`parse_catalog`].
pub fn parse_catalog_str(raw: &str) -> Result<Vec<CatalogItem>, serde_json::Error> {
    let document: Value = serde_json::from_str(raw)?;
    Ok(parse_catalog(&document))
}

fn parse_entry(entry: &Map<String, Value>) -> Option<CatalogItem> {
    let id = text_field(entry, ID_KEYS)?;
    let name = text_field(entry, NAME_KEYS)?;

    let mut item = CatalogItem::new(id, name);
    item.author = text_field(entry, AUTHOR_KEYS);
    item.categories = field(entry, CATEGORY_KEYS).map(categories).unwrap_or_default();
    item.total_downloads = field(entry, DOWNLOAD_KEYS)
        .and_then(lenient_count)
        .unwrap_or(0);
    item.average_rating = field(entry, RATING_KEYS)
        .and_then(lenient_f64)
        .map_or(0.0, |r| r.max(0.0));
    item.first_release = field(entry, FIRST_RELEASE_KEYS)
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    item.latest_release = field(entry, LATEST_RELEASE_KEYS)
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    item.version = text_field(entry, VERSION_KEYS);
    item.nuget_id = text_field(entry, NUGET_KEYS);
    item.project_url = text_field(entry, PROJECT_URL_KEYS);
    item.is_open_source = field(entry, OPEN_SOURCE_KEYS).and_then(flag);
    item.author_is_mvp = field(entry, MVP_KEYS).and_then(flag);
    Some(item)
}

fn field<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let value = field(entry, keys)?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn categories(value: &Value) -> Vec<String> {
    match value {
        Value::String(list) => list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string)
            .collect(),
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}
