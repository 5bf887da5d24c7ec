//! Fraud-signal detectors.
//!
//! Each detector is a pure predicate over `(review, history, batch context)`
//! with a fixed human-readable reason. Declaration order in [`Signal::ALL`] is
//! the order reasons appear in a verdict.
//!
//! Thresholds and phrase lists come from the `[detectors]` config section:
//! - `max_activity_frequency`: history activity above this triggers HighActivity
//! - `min_distinct_products`:  fewer distinct reviewed products triggers NarrowDiversity
//! - `vague_phrases`:          any (case-insensitive) hit triggers VagueLanguage
//! - `min_words`:              fewer whitespace words triggers Brevity
//! - `fresh_window_secs`:      younger reviews trigger Temporal
//! - `min_polarity`:           lower sentiment polarity triggers Sentiment
//! - `promotional_phrases`:    any hit triggers PromotionalLanguage

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::duplicates::DuplicateTracker;
use crate::review::{Review, ReviewerHistory};
use crate::sentiment::PolarityScorer;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub max_activity_frequency: u32,
    pub min_distinct_products: usize,
    pub vague_phrases: Vec<String>,
    pub min_words: usize,
    pub fresh_window_secs: i64,
    pub min_polarity: f32,
    pub promotional_phrases: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_activity_frequency: 5,
            min_distinct_products: 3,
            vague_phrases: vec![
                "great product".into(),
                "highly recommended".into(),
                "best ever".into(),
            ],
            min_words: 5,
            fresh_window_secs: 24 * 3600,
            min_polarity: 0.1,
            promotional_phrases: vec![
                "buy now".into(),
                "limited time offer".into(),
                "free gift".into(),
            ],
        }
    }
}

/// Per-batch evaluation context shared by all detectors.
pub struct BatchContext<'a> {
    pub now: DateTime<Utc>,
    pub duplicates: &'a DuplicateTracker,
    pub sentiment: &'a dyn PolarityScorer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    HighActivity,
    NarrowDiversity,
    VagueLanguage,
    Brevity,
    Temporal,
    Sentiment,
    PromotionalLanguage,
    DuplicateContent,
}

impl Signal {
    pub const ALL: [Signal; 8] = [
        Signal::HighActivity,
        Signal::NarrowDiversity,
        Signal::VagueLanguage,
        Signal::Brevity,
        Signal::Temporal,
        Signal::Sentiment,
        Signal::PromotionalLanguage,
        Signal::DuplicateContent,
    ];

    pub fn reason(self) -> &'static str {
        match self {
            Signal::HighActivity => "High activity frequency.",
            Signal::NarrowDiversity => "Narrow diversity of reviews.",
            Signal::VagueLanguage => "Contains vague language.",
            Signal::Brevity => "Review is too brief.",
            Signal::Temporal => "Posted within a suspicious timeframe.",
            Signal::Sentiment => "Negative sentiment detected.",
            Signal::PromotionalLanguage => "Contains promotional language.",
            Signal::DuplicateContent => "Duplicate content detected.",
        }
    }

    /// Short stable name for logs and metrics labels.
    pub fn name(self) -> &'static str {
        match self {
            Signal::HighActivity => "high_activity",
            Signal::NarrowDiversity => "narrow_diversity",
            Signal::VagueLanguage => "vague_language",
            Signal::Brevity => "brevity",
            Signal::Temporal => "temporal",
            Signal::Sentiment => "sentiment",
            Signal::PromotionalLanguage => "promotional_language",
            Signal::DuplicateContent => "duplicate_content",
        }
    }

    pub fn triggered(
        self,
        review: &Review,
        history: &ReviewerHistory,
        ctx: &BatchContext<'_>,
        cfg: &DetectorConfig,
    ) -> bool {
        match self {
            Signal::HighActivity => history.activity_frequency > cfg.max_activity_frequency,
            Signal::NarrowDiversity => history.distinct_products() < cfg.min_distinct_products,
            Signal::VagueLanguage => contains_any(&review.text, &cfg.vague_phrases),
            Signal::Brevity => review.text.split_whitespace().count() < cfg.min_words,
            Signal::Temporal => {
                ctx.now.signed_duration_since(review.posted_at)
                    < Duration::seconds(cfg.fresh_window_secs)
            }
            Signal::Sentiment => ctx.sentiment.polarity(&review.text) < cfg.min_polarity,
            Signal::PromotionalLanguage => contains_any(&review.text, &cfg.promotional_phrases),
            Signal::DuplicateContent => ctx.duplicates.is_duplicate(&review.text),
        }
    }
}

// --- internals ---

fn contains_any(text: &str, phrases: &[String]) -> bool {
    let t = normalize(text);
    phrases.iter().any(|p| {
        let p = normalize(p);
        !p.is_empty() && t.contains(p.as_str())
    })
}

/// Lowercase + condensed whitespace so "Best   EVER" matches "best ever".
fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}
