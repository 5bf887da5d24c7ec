// tests/e2e_batch.rs
//
// End-to-end batch evaluation through the aggregator:
// vague + brief + duplicate, a clean long review, and a duplicate of the first.
// Order of results must follow input order, including under shuffling.

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;

use truetale_analyzer::{ReviewRecord, ReviewerHistory, Signal, VerdictAggregator};

const DUP_TEXT: &str = "Great product, best ever!";
const CLEAN_TEXT: &str = "The kettle boils quickly and the handle stays cool, we are very pleased";

fn reasons(signals: &[Signal]) -> Vec<String> {
    signals.iter().map(|s| s.reason().to_string()).collect()
}

fn clean_history() -> ReviewerHistory {
    ReviewerHistory::new(1, ["p1", "p2", "p3"])
}

fn days_ago(n: i64) -> String {
    (Utc::now() - Duration::days(n)).format("%Y-%m-%d").to_string()
}

#[test]
fn three_review_batch_keeps_order_and_reasons() {
    let recs = vec![
        ReviewRecord::new("a", DUP_TEXT, &days_ago(20)),
        ReviewRecord::new("b", CLEAN_TEXT, &days_ago(20)),
        ReviewRecord::new("c", DUP_TEXT, &days_ago(40)),
    ];
    let report = VerdictAggregator::default().evaluate_records(&recs, &clean_history());
    let v: Vec<_> = report.verdicts().collect();
    assert_eq!(v.len(), 3);

    let dup_reasons = reasons(&[
        Signal::VagueLanguage,
        Signal::Brevity,
        Signal::DuplicateContent,
    ]);

    assert_eq!(v[0].id.as_deref(), Some("a"));
    assert!(v[0].is_fake);
    assert_eq!(v[0].reasons, dup_reasons);

    assert_eq!(v[1].id.as_deref(), Some("b"));
    assert!(!v[1].is_fake);
    assert!(v[1].reasons.is_empty());

    // identical text, identical content signals
    assert_eq!(v[2].id.as_deref(), Some("c"));
    assert!(v[2].is_fake);
    assert_eq!(v[2].reasons, dup_reasons);

    assert!(v.iter().all(|v| !v.is_suspicious));
}

#[test]
fn fresh_duplicate_adds_temporal_in_declaration_order() {
    let now = Utc::now().to_rfc3339();
    let recs = vec![
        ReviewRecord::new("a", DUP_TEXT, &now),
        ReviewRecord::new("c", DUP_TEXT, &days_ago(40)),
    ];
    let report = VerdictAggregator::default().evaluate_records(&recs, &clean_history());
    assert_eq!(
        report.results[0].verdict().unwrap().reasons,
        reasons(&[
            Signal::VagueLanguage,
            Signal::Brevity,
            Signal::Temporal,
            Signal::DuplicateContent,
        ])
    );
    assert!(!report.results[1]
        .verdict()
        .unwrap()
        .reasons
        .contains(&Signal::Temporal.reason().to_string()));
}

#[test]
fn duplicate_alone_flags_an_otherwise_clean_review() {
    let text = "Lovely staff and excellent food, we will definitely come back";
    let recs = vec![
        ReviewRecord::new("x", text, &days_ago(15)),
        ReviewRecord::new("y", CLEAN_TEXT, &days_ago(15)),
        ReviewRecord::new("z", text, &days_ago(90)),
    ];
    let report = VerdictAggregator::default().evaluate_records(&recs, &clean_history());
    let only_dup = reasons(&[Signal::DuplicateContent]);
    assert_eq!(report.results[0].verdict().unwrap().reasons, only_dup);
    assert!(report.results[1].verdict().unwrap().reasons.is_empty());
    assert_eq!(report.results[2].verdict().unwrap().reasons, only_dup);
}

#[test]
fn shuffled_batches_preserve_input_order() {
    let agg = VerdictAggregator::default();
    let mut recs: Vec<ReviewRecord> = (0..40)
        .map(|i| {
            let text = match i % 4 {
                0 => DUP_TEXT.to_string(),
                1 => CLEAN_TEXT.to_string(),
                2 => format!("review number {i} buy now"),
                _ => "nice".to_string(),
            };
            ReviewRecord::new(&format!("id-{i}"), &text, &days_ago(5 + i))
        })
        .collect();

    let mut rng = rand::rng();
    for _ in 0..5 {
        recs.shuffle(&mut rng);
        let report = agg.evaluate_records(&recs, &clean_history());
        assert_eq!(report.len(), recs.len());
        for (rec, out) in recs.iter().zip(report.results.iter()) {
            assert_eq!(out.verdict().unwrap().id, rec.display_id());
        }
        assert_eq!(report.summary.total, 40);
        assert_eq!(report.summary.genuine, 10);
    }
}
