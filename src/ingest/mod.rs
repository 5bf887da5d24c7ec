// src/ingest/mod.rs
//! Third-party review fetching.
//!
//! Providers return raw [`ReviewRecord`]s; validation happens later, per
//! record, in the aggregator. Text is normalized here so that HTML noise from
//! upstream does not leak into duplicate detection.

pub mod providers;
pub mod types;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

use crate::review::ReviewRecord;
use crate::ingest::types::ReviewSource;

/// Longest review text kept after normalization (chars).
pub const MAX_TEXT_CHARS: usize = 5_000;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_reviews_total", "Reviews returned by review sources.");
        describe_counter!(
            "ingest_source_errors_total",
            "Review source fetch/parse errors."
        );
        describe_histogram!("ingest_fetch_ms", "Review source fetch time in milliseconds.");
    });
}

/// Decode entities, strip tags, fold typographic quotes, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let no_tags = RE_TAGS.replace_all(&decoded, "");

    let quotes = no_tags
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let out = RE_WS.replace_all(&quotes, " ");
    let out = out.trim();

    if out.chars().count() > MAX_TEXT_CHARS {
        out.chars().take(MAX_TEXT_CHARS).collect()
    } else {
        out.to_string()
    }
}

/// Fetch one entity's reviews from a source, recording ingest telemetry.
/// Records whose `text` is a string get it normalized; anything else is left
/// for the aggregator to reject.
pub async fn fetch_normalized(
    source: &dyn ReviewSource,
    place_id: &str,
) -> anyhow::Result<Vec<ReviewRecord>> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();

    let mut records = match source.fetch(place_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                error = ?e,
                source = source.name(),
                "review source error"
            );
            counter!("ingest_source_errors_total").increment(1);
            return Err(e);
        }
    };

    for rec in &mut records {
        if let Some(serde_json::Value::String(text)) = rec.text.as_mut() {
            *text = normalize_text(text);
        }
    }

    histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ingest_reviews_total").increment(records.len() as u64);
    tracing::info!(
        target: "ingest",
        source = source.name(),
        reviews = records.len(),
        "reviews fetched"
    );
    Ok(records)
}
