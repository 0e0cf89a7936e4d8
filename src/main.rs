use std::fs;

use anyhow::Context;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use digest_ranker::{
    catalog::parse_catalog_str,
    config::Config,
    observability,
    pipeline::{DigestPipeline, GenerationMetadata, render_markdown},
    store::{FileSnapshotStore, SnapshotStore},
    util::time,
};

fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                message,
                "panic occurred"
            );
        } else {
            error!(thread = thread_name, message, "panic occurred without location");
        }
    }));

    observability::init().context("failed to initialize tracing")?;
    let config = Config::from_env().context("failed to load configuration")?;

    let run_id = Uuid::now_v7();
    let span = info_span!("digest_ranker", %run_id, month = %config.month());
    let _guard = span.enter();

    let raw = fs::read_to_string(config.catalog_path()).with_context(|| {
        format!(
            "failed to read catalog at {}",
            config.catalog_path().display()
        )
    })?;
    let catalog = parse_catalog_str(&raw).context("catalog is not valid JSON")?;
    info!(
        items = catalog.len(),
        heuristics = ?config.heuristics_path(),
        recency_policy = %config.scoring().recency_policy,
        "catalog loaded"
    );

    let pipeline = DigestPipeline::new(config.scoring().clone())?;
    let store = FileSnapshotStore::new(config.output_dir());
    let as_of = time::now();

    let snapshot = pipeline.diff(&catalog, config.month(), as_of);
    let source = store
        .save_snapshot(&snapshot)
        .context("failed to write snapshot")?;

    if snapshot.is_empty() {
        if config.ci() {
            warn!(month = %config.month(), "no new or updated plugins; digest will be empty");
        } else {
            info!(month = %config.month(), "no new or updated plugins this month");
        }
    }

    let metadata = GenerationMetadata::new(as_of).with_source(source.display().to_string());
    let output = pipeline.finish(snapshot, metadata);
    let markdown = render_markdown(&output.digest);
    let location = store
        .save_digest(&output.digest, &markdown)
        .context("failed to write digest")?;

    info!(
        json = %location.json.display(),
        markdown = %location.markdown.display(),
        selected_new = output.digest.counts.selected_new,
        selected_updated = output.digest.counts.selected_updated,
        "digest written"
    );
    Ok(())
}
