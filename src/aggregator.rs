//! # Verdict Aggregator
//! Pure, testable logic that maps `(records, history)` → `BatchReport`.
//! No I/O besides logging; the clock is an explicit argument.
//!
//! Policy: every detector runs for every review in declaration order;
//! `is_fake` is the unweighted OR of triggered detectors and `reasons` lists
//! the triggered ones in that same order. The rule path never sets
//! `is_suspicious`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::duplicates::DuplicateTracker;
use crate::error::InputError;
use crate::review::{anon_hash, Review, ReviewRecord, ReviewerHistory};
use crate::sentiment::{LexiconScorer, PolarityScorer};
use crate::signals::{BatchContext, DetectorConfig, Signal};
use crate::verdict::{BatchReport, RecordFailure, RecordOutcome, Verdict};

#[derive(Clone)]
pub struct VerdictAggregator {
    cfg: DetectorConfig,
    sentiment: Arc<dyn PolarityScorer>,
}

impl Default for VerdictAggregator {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl VerdictAggregator {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            cfg,
            sentiment: Arc::new(LexiconScorer::new()),
        }
    }

    /// Replace the bundled lexicon scorer with an external polarity source.
    pub fn with_sentiment(mut self, scorer: Arc<dyn PolarityScorer>) -> Self {
        self.sentiment = scorer;
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Validate and evaluate a batch of wire records against the current time.
    pub fn evaluate_records(
        &self,
        records: &[ReviewRecord],
        history: &ReviewerHistory,
    ) -> BatchReport {
        let parsed = parse_records(records);
        self.evaluate_parsed(records, &parsed, history, Utc::now())
    }

    /// Evaluate already-parsed records. `records` and `parsed` are index-aligned;
    /// the raw record only supplies a best-effort id for failure slots.
    pub fn evaluate_parsed(
        &self,
        records: &[ReviewRecord],
        parsed: &[Result<Review, InputError>],
        history: &ReviewerHistory,
        now: DateTime<Utc>,
    ) -> BatchReport {
        let duplicates = DuplicateTracker::from_texts(
            parsed
                .iter()
                .filter_map(|p| p.as_ref().ok())
                .map(|r| r.text.as_str()),
        );
        let ctx = BatchContext {
            now,
            duplicates: &duplicates,
            sentiment: self.sentiment.as_ref(),
        };

        let results = parsed
            .iter()
            .enumerate()
            .map(|(index, p)| match p {
                Ok(review) => RecordOutcome::Ok(self.verdict_for(review, history, &ctx)),
                Err(err) => {
                    let id = records.get(index).and_then(ReviewRecord::display_id);
                    debug!(target: "aggregator", index, kind = ?err.kind(), "record rejected");
                    RecordOutcome::Error(RecordFailure::new(index, id, err))
                }
            })
            .collect::<Vec<_>>();

        let report = BatchReport::new(results);
        debug!(
            target: "aggregator",
            total = report.summary.total,
            fake = report.summary.fake,
            failed = report.summary.failed,
            duplicated_texts = duplicates.duplicated_texts(),
            "batch evaluated"
        );
        report
    }

    /// Run every detector, in declaration order, for one review.
    pub fn verdict_for(
        &self,
        review: &Review,
        history: &ReviewerHistory,
        ctx: &BatchContext<'_>,
    ) -> Verdict {
        let triggered: Vec<Signal> = Signal::ALL
            .into_iter()
            .filter(|s| s.triggered(review, history, ctx, &self.cfg))
            .collect();

        if !triggered.is_empty() {
            debug!(
                target: "aggregator",
                review = %anon_hash(&review.text),
                signals = ?triggered.iter().map(|s| s.name()).collect::<Vec<_>>(),
                "signals triggered"
            );
        }

        Verdict {
            review_text: review.id.is_none().then(|| review.text.clone()),
            id: review.id.clone(),
            is_fake: !triggered.is_empty(),
            is_suspicious: false,
            reasons: triggered.iter().map(|s| s.reason().to_string()).collect(),
            classifier: None,
        }
    }
}

pub fn parse_records(records: &[ReviewRecord]) -> Vec<Result<Review, InputError>> {
    records.iter().map(Review::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn clean_history() -> ReviewerHistory {
        ReviewerHistory::new(1, ["p1", "p2", "p3"])
    }

    fn old_date() -> String {
        (Utc::now() - Duration::days(30)).format("%Y-%m-%d").to_string()
    }

    #[test]
    fn clean_review_is_genuine_with_no_reasons() {
        let agg = VerdictAggregator::default();
        let recs = vec![ReviewRecord::new(
            "r1",
            "The kettle boils quickly and the handle stays cool, we are very pleased",
            &old_date(),
        )];
        let report = agg.evaluate_records(&recs, &clean_history());
        let v = report.results[0].verdict().unwrap();
        assert!(!v.is_fake);
        assert!(!v.is_suspicious);
        assert!(v.reasons.is_empty());
    }

    #[test]
    fn reasons_follow_declaration_order() {
        let agg = VerdictAggregator::default();
        // promotional + brief + vague + narrow + high activity
        let recs = vec![ReviewRecord::new("r1", "best ever, buy now", &old_date())];
        let report = agg.evaluate_records(&recs, &ReviewerHistory::new(9, ["p1"]));
        let v = report.results[0].verdict().unwrap();
        assert!(v.is_fake);
        let order: Vec<usize> = v
            .reasons
            .iter()
            .map(|r| Signal::ALL.iter().position(|s| s.reason() == r).unwrap())
            .collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
        assert_eq!(v.reasons.first().map(String::as_str), Some("High activity frequency."));
        assert!(v.reasons.contains(&"Contains promotional language.".to_string()));
    }

    #[test]
    fn duplicates_are_batch_scoped() {
        let agg = VerdictAggregator::default();
        let d = old_date();
        let recs = vec![
            ReviewRecord::new("a", "hello world", &d),
            ReviewRecord::new("b", "hello world", &d),
            ReviewRecord::new("c", "goodbye", &d),
        ];
        let report = agg.evaluate_records(&recs, &clean_history());
        let dup = Signal::DuplicateContent.reason().to_string();
        let flags: Vec<bool> = report
            .verdicts()
            .map(|v| v.reasons.contains(&dup))
            .collect();
        assert_eq!(flags, vec![true, true, false]);

        // same text alone in a new batch is not a duplicate
        let single = agg.evaluate_records(&recs[..1], &clean_history());
        assert!(!single.results[0].verdict().unwrap().reasons.contains(&dup));
    }

    #[test]
    fn malformed_record_keeps_its_slot_and_batch_continues() {
        let agg = VerdictAggregator::default();
        let d = old_date();
        let recs: Vec<ReviewRecord> = vec![
            ReviewRecord::new("a", "short one", &d),
            serde_json::from_value(json!({"id": "b", "text": "fine", "date": "not a date"}))
                .unwrap(),
            serde_json::from_value(json!({"id": "c", "date": d})).unwrap(),
            ReviewRecord::new("d", "another short one", &d),
        ];
        let report = agg.evaluate_records(&recs, &clean_history());
        assert_eq!(report.len(), 4);
        assert!(report.results[0].verdict().is_some());
        assert_eq!(report.results[1].failure().unwrap().id.as_deref(), Some("b"));
        assert_eq!(report.results[2].failure().unwrap().index, 2);
        assert_eq!(report.results[3].verdict().unwrap().id.as_deref(), Some("d"));
        assert_eq!(report.summary.failed, 2);
    }

    #[test]
    fn records_without_id_echo_their_text() {
        let agg = VerdictAggregator::default();
        let recs: Vec<ReviewRecord> =
            vec![serde_json::from_value(json!({"text": "nice", "date": old_date()})).unwrap()];
        let report = agg.evaluate_records(&recs, &clean_history());
        let v = report.results[0].verdict().unwrap();
        assert_eq!(v.id, None);
        assert_eq!(v.review_text.as_deref(), Some("nice"));
    }

    struct FixedPolarity(f32);
    impl PolarityScorer for FixedPolarity {
        fn polarity(&self, _text: &str) -> f32 {
            self.0
        }
    }

    #[test]
    fn external_polarity_source_is_used() {
        let d = old_date();
        let recs = vec![ReviewRecord::new("a", "the parcel arrived on a rainy tuesday", &d)];
        let lexicon = VerdictAggregator::default().evaluate_records(&recs, &clean_history());
        assert_eq!(
            lexicon.results[0].verdict().unwrap().reasons,
            vec![Signal::Sentiment.reason().to_string()]
        );

        let positive = VerdictAggregator::default()
            .with_sentiment(Arc::new(FixedPolarity(0.8)))
            .evaluate_records(&recs, &clean_history());
        assert!(positive.results[0].verdict().unwrap().reasons.is_empty());
    }
}
