/// Environment-driven configuration of the `digest-ranker` binary.
use std::io::Write;

use digest_ranker::config::{Config, ConfigError, RecencyPolicy};
use digest_ranker::period::MonthToken;

const ALL_VARS: &[&str] = &[
    "DIGEST_CATALOG_PATH",
    "DIGEST_OUTPUT_DIR",
    "DIGEST_MONTH",
    "DIGEST_HEURISTICS_PATH",
    "DIGEST_CI",
    "DIGEST_RECENCY_WINDOW_DAYS",
    "DIGEST_RECENCY_POLICY",
    "DIGEST_RATING_THRESHOLD",
    "DIGEST_MAX_NEW",
    "DIGEST_MAX_UPDATED",
    "DIGEST_MAX_PER_AUTHOR",
    "DIGEST_MAX_PER_CATEGORY",
];

/// Every known variable unset, then `overrides` applied on top.
fn vars<'a>(overrides: &[(&'a str, &'a str)]) -> Vec<(&'a str, Option<&'a str>)> {
    ALL_VARS
        .iter()
        .map(|name| {
            let value = overrides
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| *value);
            (*name, value)
        })
        .collect()
}

#[test]
fn defaults_apply_when_only_catalog_is_set() {
    temp_env::with_vars(
        vars(&[("DIGEST_CATALOG_PATH", "catalog.json"), ("DIGEST_MONTH", "2024-03")]),
        || {
            let config = Config::from_env().expect("config loads");

            assert_eq!(config.catalog_path().to_str(), Some("catalog.json"));
            assert_eq!(config.output_dir().to_str(), Some("data"));
            assert_eq!(config.month(), MonthToken::parse("2024-03").expect("month"));
            assert!(!config.ci());
            assert!(config.heuristics_path().is_none());

            let scoring = config.scoring();
            assert_eq!(scoring.recency_window_days, 30);
            assert_eq!(scoring.recency_policy, RecencyPolicy::Window);
            assert_eq!(scoring.selection.max_new, 5);
            assert_eq!(scoring.selection.max_updated, 5);
            assert_eq!(scoring.diversity.max_per_author, 1);
            assert_eq!(scoring.diversity.max_per_category, 2);
            assert!((scoring.rating_threshold - 4.0).abs() < f64::EPSILON);
        },
    );
}

#[test]
fn missing_catalog_path_is_reported() {
    temp_env::with_vars(vars(&[]), || {
        let error = Config::from_env().expect_err("catalog path is required");
        assert!(matches!(error, ConfigError::Missing("DIGEST_CATALOG_PATH")));
    });
}

#[test]
fn malformed_month_is_rejected_up_front() {
    temp_env::with_vars(
        vars(&[("DIGEST_CATALOG_PATH", "c.json"), ("DIGEST_MONTH", "2024-13")]),
        || {
            let error = Config::from_env().expect_err("month must be YYYY-MM");
            assert!(matches!(error, ConfigError::Invalid { name: "DIGEST_MONTH", .. }));
        },
    );
}

#[test]
fn scoring_overrides_are_read_from_env() {
    temp_env::with_vars(
        vars(&[
            ("DIGEST_CATALOG_PATH", "c.json"),
            ("DIGEST_MONTH", "2023-11"),
            ("DIGEST_CI", "true"),
            ("DIGEST_RECENCY_WINDOW_DAYS", "45"),
            ("DIGEST_RECENCY_POLICY", "event-in-month"),
            ("DIGEST_RATING_THRESHOLD", "3.5"),
            ("DIGEST_MAX_NEW", "8"),
            ("DIGEST_MAX_PER_CATEGORY", "3"),
        ]),
        || {
            let config = Config::from_env().expect("config loads");
            let scoring = config.scoring();

            assert!(config.ci());
            assert_eq!(scoring.recency_window_days, 45);
            assert_eq!(scoring.recency_policy, RecencyPolicy::EventInMonth);
            assert!((scoring.rating_threshold - 3.5).abs() < f64::EPSILON);
            assert_eq!(scoring.selection.max_new, 8);
            assert_eq!(scoring.diversity.max_per_category, 3);
        },
    );
}

#[test]
fn zero_cap_fails_fast() {
    temp_env::with_vars(
        vars(&[
            ("DIGEST_CATALOG_PATH", "c.json"),
            ("DIGEST_MONTH", "2024-03"),
            ("DIGEST_MAX_PER_AUTHOR", "0"),
        ]),
        || {
            let error = Config::from_env().expect_err("zero cap is invalid");
            assert!(matches!(
                error,
                ConfigError::Validation {
                    field: "diversity.maxPerAuthor",
                    ..
                }
            ));
        },
    );
}

#[test]
fn heuristics_file_is_layered_under_env_overrides() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("tempfile");
    writeln!(
        file,
        "recencyWindowDays: 14\nweights:\n  downloadsLog10: 2.5\nselection:\n  maxUpdated: 9\n"
    )
    .expect("write heuristics");
    let path = file.path().to_str().expect("utf-8 path").to_string();

    temp_env::with_vars(
        vars(&[
            ("DIGEST_CATALOG_PATH", "c.json"),
            ("DIGEST_MONTH", "2024-03"),
            ("DIGEST_HEURISTICS_PATH", path.as_str()),
            ("DIGEST_MAX_UPDATED", "4"),
        ]),
        || {
            let config = Config::from_env().expect("config loads");
            let scoring = config.scoring();

            assert_eq!(scoring.recency_window_days, 14);
            assert!((scoring.weights.downloads_log10 - 2.5).abs() < f64::EPSILON);
            assert!((scoring.weights.average_rating - 4.0).abs() < f64::EPSILON);
            assert_eq!(scoring.selection.max_updated, 4);
        },
    );
}

#[test]
fn unreadable_heuristics_file_is_a_config_error() {
    temp_env::with_vars(
        vars(&[
            ("DIGEST_CATALOG_PATH", "c.json"),
            ("DIGEST_MONTH", "2024-03"),
            ("DIGEST_HEURISTICS_PATH", "/nonexistent/heuristics.json"),
        ]),
        || {
            let error = Config::from_env().expect_err("missing file");
            assert!(matches!(error, ConfigError::Heuristics { .. }));
        },
    );
}
