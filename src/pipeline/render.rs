//! Markdown rendering of a digest draft.

use crate::period::MonthToken;
use crate::util::text::thousands;

use super::assemble::{DigestRecord, RankedEntry};
use super::types::Bucket;

/// Render the editor-facing markdown draft for a digest.
#[must_use]
pub fn render_markdown(digest: &DigestRecord) -> String {
    let title = MonthToken::parse(&digest.period)
        .map_or_else(|_| digest.period.clone(), |m| format!("{} ({})", m.label(), m));
    let metadata = &digest.metadata;

    let mut lines = vec![
        format!("# Plugin Catalog Monthly Digest: {title}"),
        String::new(),
        format!("- Generated at: {}", metadata.generated_at.to_rfc3339()),
        format!("- Review status: {}", metadata.review_status),
    ];
    if let Some(source) = &metadata.source_snapshot {
        lines.push(format!("- Source snapshot: {source}"));
    }

    lines.push(String::new());
    lines.push("## Highlights".to_string());
    lines.push(format!(
        "- New plugins this month: {}",
        digest.counts.snapshot.new_plugins
    ));
    lines.push(format!(
        "- Updated plugins this month: {}",
        digest.counts.snapshot.updated_plugins
    ));
    lines.push("- Verify highlighted plugins against release notes before publish.".to_string());

    lines.push(String::new());
    render_section(&mut lines, "Top New Plugins", &digest.top_new, Bucket::New);
    lines.push(String::new());
    render_section(
        &mut lines,
        "Top Updated Plugins",
        &digest.top_updated,
        Bucket::Updated,
    );

    if !metadata.editorial_notes.is_empty() {
        lines.push(String::new());
        lines.push("## Editorial Notes".to_string());
        lines.extend(metadata.editorial_notes.iter().map(|note| format!("- {note}")));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_section(
    lines: &mut Vec<String>,
    heading: &str,
    entries: &[RankedEntry],
    bucket: Bucket,
) {
    lines.push(format!("## {heading}"));
    if entries.is_empty() {
        lines.push(format!("- No {bucket} plugin candidates selected."));
        return;
    }
    for entry in entries {
        let record = &entry.candidate.record;
        lines.push(format!(
            "- **{}** ({}): {}",
            record.name,
            record.author,
            rationale(entry, bucket)
        ));
        lines.push(format!("  - Score: {:.4}", entry.candidate.score));
    }
}

/// One-line explanation of why an entry made the list.
#[must_use]
pub fn rationale(entry: &RankedEntry, bucket: Bucket) -> String {
    let record = &entry.candidate.record;
    let verb = match bucket {
        Bucket::New => "launched",
        Bucket::Updated => "was updated",
    };
    let rating = if record.is_rated() {
        format!("a {:.1}/5 rating", record.average_rating)
    } else {
        "no ratings yet".to_string()
    };
    format!(
        "#{} {verb} this month with {} total downloads and {rating}.",
        entry.rank,
        thousands(record.total_downloads)
    )
}
