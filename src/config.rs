use std::{
    env, fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::period::MonthToken;
use crate::pipeline::types::Bucket;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to load heuristics from {path}: {source}")]
    Heuristics {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid scoring configuration: {field} {reason}")]
    Validation { field: &'static str, reason: String },
}

/// How the recency component is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyPolicy {
    /// Linear decay: `max(0, window - recency_days) * recency_boost`.
    #[default]
    Window,
    /// Full `window * recency_boost` when the qualifying release falls inside
    /// the digest month, window decay otherwise.
    EventInMonth,
}

impl fmt::Display for RecencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecencyPolicy::Window => write!(f, "window"),
            RecencyPolicy::EventInMonth => write!(f, "event_in_month"),
        }
    }
}

impl FromStr for RecencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "window" => Ok(RecencyPolicy::Window),
            "event_in_month" | "in_month" => Ok(RecencyPolicy::EventInMonth),
            _ => Err(format!("unknown recency policy: {s}")),
        }
    }
}

/// Per-component weights. Zero disables a component; negatives are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringWeights {
    pub downloads_log10: f64,
    pub average_rating: f64,
    pub recency_boost: f64,
    pub new_plugin_bonus: f64,
    /// One-time bonus for the first selected item of a primary category.
    pub category_diversity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let average_rating = 4.0;
        Self {
            downloads_log10: 10.0,
            average_rating,
            recency_boost: 0.5,
            new_plugin_bonus: 5.0,
            category_diversity: average_rating * 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionLimits {
    pub max_new: usize,
    pub max_updated: usize,
}

impl SelectionLimits {
    /// Output length limit for a bucket.
    #[must_use]
    pub fn limit_for(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::New => self.max_new,
            Bucket::Updated => self.max_updated,
        }
    }
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_new: 5,
            max_updated: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiversityLimits {
    pub max_per_author: usize,
    pub max_per_category: usize,
    /// Route the new bucket through the capped walk as well.
    pub apply_to_new: bool,
}

impl Default for DiversityLimits {
    fn default() -> Self {
        Self {
            max_per_author: 1,
            max_per_category: 2,
            apply_to_new: false,
        }
    }
}

/// Everything the scoring function and the selector need.
///
/// Deserializes from a (possibly partial) heuristics document; missing keys
/// take their defaults. Always run [`ScoringConfig::validated`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    pub recency_window_days: u32,
    pub recency_policy: RecencyPolicy,
    pub weights: ScoringWeights,
    pub selection: SelectionLimits,
    pub diversity: DiversityLimits,
    /// Minimum average rating for updated items. New items are exempt.
    pub rating_threshold: f64,
    /// Multiplier on `new_plugin_bonus` for updated items first released in
    /// the digest month.
    pub first_release_bonus_factor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recency_window_days: 30,
            recency_policy: RecencyPolicy::Window,
            weights: ScoringWeights::default(),
            selection: SelectionLimits::default(),
            diversity: DiversityLimits::default(),
            rating_threshold: 4.0,
            first_release_bonus_factor: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Check every invariant and hand the config back.
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] for negative or non-finite weights,
    /// a zero recency window, zero limits or caps, or a negative threshold.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    /// See [`ScoringConfig::validated`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recency_window_days == 0 {
            return Err(invalid("recencyWindowDays", "must be greater than zero"));
        }

        let weights = [
            ("weights.downloadsLog10", self.weights.downloads_log10),
            ("weights.averageRating", self.weights.average_rating),
            ("weights.recencyBoost", self.weights.recency_boost),
            ("weights.newPluginBonus", self.weights.new_plugin_bonus),
            ("weights.categoryDiversity", self.weights.category_diversity),
            ("firstReleaseBonusFactor", self.first_release_bonus_factor),
            ("ratingThreshold", self.rating_threshold),
        ];
        for (field, value) in weights {
            if !value.is_finite() {
                return Err(invalid(field, "must be a finite number"));
            }
            if value < 0.0 {
                return Err(invalid(field, "must not be negative"));
            }
        }

        let limits = [
            ("selection.maxNew", self.selection.max_new),
            ("selection.maxUpdated", self.selection.max_updated),
            ("diversity.maxPerAuthor", self.diversity.max_per_author),
            ("diversity.maxPerCategory", self.diversity.max_per_category),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }

        Ok(())
    }

    /// Load a heuristics document (JSON, or YAML for `.yaml`/`.yml`) and validate it.
    ///
    /// # Errors
    /// Returns [`ConfigError::Heuristics`] when the file cannot be read or
    /// parsed, and [`ConfigError::Validation`] when its values are out of range.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let heuristics_error = |source: anyhow::Error| ConfigError::Heuristics {
            path: path.to_path_buf(),
            source,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| heuristics_error(e.into()))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let config: Self = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| heuristics_error(e.into()))?
        } else {
            serde_json::from_str(&raw).map_err(|e| heuristics_error(e.into()))?
        };
        config.validated()
    }

    /// Apply `DIGEST_*` scoring overrides from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when a set variable does not parse.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        self.recency_window_days =
            parse_u32("DIGEST_RECENCY_WINDOW_DAYS", self.recency_window_days)?;
        self.recency_policy = parse_recency_policy("DIGEST_RECENCY_POLICY", self.recency_policy)?;
        self.rating_threshold = parse_f64("DIGEST_RATING_THRESHOLD", self.rating_threshold)?;
        self.selection.max_new = parse_usize("DIGEST_MAX_NEW", self.selection.max_new)?;
        self.selection.max_updated =
            parse_usize("DIGEST_MAX_UPDATED", self.selection.max_updated)?;
        self.diversity.max_per_author =
            parse_usize("DIGEST_MAX_PER_AUTHOR", self.diversity.max_per_author)?;
        self.diversity.max_per_category =
            parse_usize("DIGEST_MAX_PER_CATEGORY", self.diversity.max_per_category)?;
        Ok(self)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field,
        reason: reason.to_string(),
    }
}

/// Runtime settings for the `digest-ranker` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    catalog_path: PathBuf,
    output_dir: PathBuf,
    month: MonthToken,
    heuristics_path: Option<PathBuf>,
    ci: bool,
    scoring: ScoringConfig,
}

impl Config {
    /// 環境変数から設定値を読み込み、検証する。
    ///
    /// # Errors
    /// `DIGEST_CATALOG_PATH` が未設定、各種値のパースに失敗した場合、
    /// またはスコアリング設定の検証に失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let catalog_path = PathBuf::from(env_var("DIGEST_CATALOG_PATH")?);
        let output_dir =
            PathBuf::from(env::var("DIGEST_OUTPUT_DIR").unwrap_or_else(|_| "data".to_string()));
        let month = parse_month("DIGEST_MONTH")?;
        let heuristics_path = env::var("DIGEST_HEURISTICS_PATH").ok().map(PathBuf::from);
        let ci = parse_bool("DIGEST_CI", false)?;

        let base = match &heuristics_path {
            Some(path) => ScoringConfig::from_path(path)?,
            None => ScoringConfig::default(),
        };
        let scoring = base.with_env_overrides()?.validated()?;

        Ok(Self {
            catalog_path,
            output_dir,
            month,
            heuristics_path,
            ci,
            scoring,
        })
    }

    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn month(&self) -> MonthToken {
        self.month
    }

    #[must_use]
    pub fn heuristics_path(&self) -> Option<&Path> {
        self.heuristics_path.as_deref()
    }

    #[must_use]
    pub fn ci(&self) -> bool {
        self.ci
    }

    #[must_use]
    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_month(name: &'static str) -> Result<MonthToken, ConfigError> {
    match env::var(name) {
        Ok(raw) => MonthToken::parse(&raw).map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        }),
        Err(_) => Ok(MonthToken::of(&crate::util::time::now())),
    }
}

fn parse_recency_policy(
    name: &'static str,
    default: RecencyPolicy,
) -> Result<RecencyPolicy, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<RecencyPolicy>()
        .map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::anyhow!(error),
        })
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("expected boolean value, got {raw}"),
        }),
    }
}
