use chrono::{DateTime, Utc};
use serde_json::json;

use digest_ranker::catalog::parse_catalog;
use digest_ranker::config::ScoringConfig;
use digest_ranker::period::{MonthToken, parse_timestamp};
use digest_ranker::pipeline::{DigestPipeline, GenerationMetadata, render_markdown};
use digest_ranker::store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};

fn as_of() -> DateTime<Utc> {
    parse_timestamp("2024-04-02T09:00:00Z").expect("timestamp")
}

fn feed() -> serde_json::Value {
    json!({
        "value": [
            {
                "mctools_pluginid": "p-new",
                "mctools_name": "Fresh Connector",
                "mctools_authors": "Ann",
                "mctools_categorieslist": "Integration, Data",
                "mctools_totaldownloadcount": "250",
                "mctools_averagefeedbackratingallversions": null,
                "mctools_firstreleasedate": "2024-03-18T10:00:00Z",
                "mctools_latestreleasedate": "2024-03-18T10:00:00Z"
            },
            {
                "mctools_pluginid": "p-upd-a",
                "mctools_name": "Query Helper",
                "mctools_authors": "Bo",
                "mctools_categorieslist": "Data",
                "mctools_totaldownloadcount": 48000,
                "mctools_averagefeedbackratingallversions": "4.7",
                "mctools_firstreleasedate": "2020-02-01T00:00:00Z",
                "mctools_latestreleasedate": "2024-03-25T00:00:00Z"
            },
            {
                "mctools_pluginid": "p-upd-b",
                "mctools_name": "Query Helper Pro",
                "mctools_authors": "Bo",
                "mctools_categorieslist": "Tools",
                "mctools_totaldownloadcount": 39000,
                "mctools_averagefeedbackratingallversions": 4.2,
                "mctools_firstreleasedate": "2021-02-01T00:00:00Z",
                "mctools_latestreleasedate": "2024-03-26T00:00:00Z"
            },
            {
                "mctools_pluginid": "p-upd-c",
                "mctools_name": "Audit Trail",
                "mctools_authors": "Cy",
                "mctools_categorieslist": ["Security"],
                "mctools_totaldownloadcount": 1200,
                "mctools_averagefeedbackratingallversions": 4.1,
                "mctools_firstreleasedate": "2019-07-07T00:00:00Z",
                "mctools_latestreleasedate": "2024-03-03T00:00:00Z"
            },
            {
                "mctools_pluginid": "p-old",
                "mctools_name": "Untouched",
                "mctools_firstreleasedate": "2018-01-01T00:00:00Z",
                "mctools_latestreleasedate": "2023-12-01T00:00:00Z"
            },
            { "mctools_name": "No identifier" },
            "not an object"
        ]
    })
}

#[test]
fn raw_feed_flows_through_to_markdown() {
    let catalog = parse_catalog(&feed());
    assert_eq!(catalog.len(), 5);

    let pipeline = DigestPipeline::new(ScoringConfig::default()).expect("valid config");
    let month = MonthToken::parse("2024-03").expect("month");
    let output = pipeline.run(&catalog, month, as_of(), GenerationMetadata::new(as_of()));

    assert_eq!(output.snapshot.counts.new_plugins, 1);
    assert_eq!(output.snapshot.counts.updated_plugins, 3);

    let new_ids: Vec<&str> = output
        .digest
        .top_new
        .iter()
        .map(|e| e.candidate.record.id.as_str())
        .collect();
    assert_eq!(new_ids, vec!["p-new"]);
    assert_eq!(output.digest.top_new[0].candidate.record.primary_category(), "Integration");

    // One entry per author: Bo's weaker plugin is skipped.
    let updated_ids: Vec<&str> = output
        .digest
        .top_updated
        .iter()
        .map(|e| e.candidate.record.id.as_str())
        .collect();
    assert_eq!(updated_ids, vec!["p-upd-a", "p-upd-c"]);
    assert_eq!(output.updated_trace.skipped_author_cap, 1);
    let ranks: Vec<usize> = output.digest.top_updated.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2]);

    let markdown = render_markdown(&output.digest);
    assert!(markdown.contains("# Plugin Catalog Monthly Digest: March 2024 (2024-03)"));
    assert!(markdown.contains("**Fresh Connector** (Ann): #1 launched this month with 250 total downloads and no ratings yet."));
    assert!(markdown.contains("**Query Helper** (Bo): #1 was updated this month with 48,000 total downloads and a 4.7/5 rating."));
}

#[test]
fn regenerating_from_same_input_is_byte_identical() {
    let catalog = parse_catalog(&feed());
    let pipeline = DigestPipeline::new(ScoringConfig::default()).expect("valid config");
    let month = MonthToken::parse("2024-03").expect("month");

    let render = || {
        let output = pipeline.run(&catalog, month, as_of(), GenerationMetadata::new(as_of()));
        (
            serde_json::to_string_pretty(&output.digest).expect("serialize"),
            render_markdown(&output.digest),
        )
    };

    assert_eq!(render(), render());
}

#[test]
fn file_store_layout_matches_monthly_and_digest_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSnapshotStore::new(dir.path());
    let catalog = parse_catalog(&feed());
    let pipeline = DigestPipeline::new(ScoringConfig::default()).expect("valid config");
    let month = MonthToken::parse("2024-03").expect("month");

    let snapshot = pipeline.diff(&catalog, month, as_of());
    let source = store.save_snapshot(&snapshot).expect("save snapshot");
    let output = pipeline.finish(
        snapshot,
        GenerationMetadata::new(as_of()).with_source(source.display().to_string()),
    );
    let markdown = render_markdown(&output.digest);
    store.save_digest(&output.digest, &markdown).expect("save digest");

    assert!(dir.path().join("monthly/2024-03.json").is_file());
    assert!(dir.path().join("digests/2024-03/digest.json").is_file());
    assert!(dir.path().join("digests/2024-03/digest.md").is_file());
    assert!(markdown.contains("- Source snapshot: monthly/2024-03.json"));

    let reloaded = store
        .load_snapshot("2024-03")
        .expect("load")
        .expect("snapshot present");
    assert_eq!(reloaded, output.snapshot);
}

#[test]
fn empty_month_still_produces_a_digest() {
    let store = MemorySnapshotStore::new();
    let catalog = parse_catalog(&feed());
    let pipeline = DigestPipeline::new(ScoringConfig::default()).expect("valid config");
    let month = MonthToken::parse("2022-08").expect("month");

    let output = pipeline.run(&catalog, month, as_of(), GenerationMetadata::new(as_of()));
    let markdown = render_markdown(&output.digest);
    store.save_digest(&output.digest, &markdown).expect("save");

    assert!(output.digest.is_empty());
    assert!(markdown.contains("- No new plugin candidates selected."));
    assert!(markdown.contains("- No updated plugin candidates selected."));
    assert!(store.digest("2022-08").expect("lock").is_some());
}
