//! Verdict and batch-report types (wire shape of every analysis response).

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, InputError};

/// Decision for one review plus its ordered reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Emitted only for records without an id, so callers can still match results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
    pub is_fake: bool,
    pub is_suspicious: bool,
    pub reasons: Vec<String>,
    /// Present only when a classifier is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<ClassifierSignal>,
}

/// Classifier contribution to a verdict. `Unknown` is never read as "genuine".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifierSignal {
    Known { label: bool, confidence: f32 },
    Unknown,
}

/// A record that could not be analyzed; it keeps its slot in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub error: String,
    pub kind: ErrorKind,
}

impl RecordFailure {
    pub fn new(index: usize, id: Option<String>, err: &InputError) -> Self {
        Self {
            index,
            id,
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Ok(Verdict),
    Error(RecordFailure),
}

impl RecordOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            RecordOutcome::Ok(v) => Some(v),
            RecordOutcome::Error(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RecordFailure> {
        match self {
            RecordOutcome::Ok(_) => None,
            RecordOutcome::Error(f) => Some(f),
        }
    }
}

/// Fake / Suspicious / Genuine counts as shown in the extension popup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub fake: usize,
    pub suspicious: usize,
    pub genuine: usize,
    pub failed: usize,
}

/// Results aligned with input order and length, plus a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<RecordOutcome>,
    pub summary: Summary,
}

impl BatchReport {
    pub fn new(results: Vec<RecordOutcome>) -> Self {
        let summary = summarize(&results);
        Self { results, summary }
    }

    /// Recompute the summary after verdicts were enriched in place.
    pub fn refresh_summary(&mut self) {
        self.summary = summarize(&self.results);
    }

    pub fn verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.results.iter().filter_map(RecordOutcome::verdict)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordFailure> {
        self.results.iter().filter_map(RecordOutcome::failure)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn summarize(results: &[RecordOutcome]) -> Summary {
    let mut s = Summary {
        total: results.len(),
        ..Summary::default()
    };
    for r in results {
        match r {
            RecordOutcome::Ok(v) if v.is_fake => s.fake += 1,
            RecordOutcome::Ok(v) if v.is_suspicious => s.suspicious += 1,
            RecordOutcome::Ok(_) => s.genuine += 1,
            RecordOutcome::Error(_) => s.failed += 1,
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn verdict(id: Option<&str>, is_fake: bool, is_suspicious: bool) -> Verdict {
        Verdict {
            id: id.map(str::to_string),
            review_text: None,
            is_fake,
            is_suspicious,
            reasons: vec![],
            classifier: None,
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ok = RecordOutcome::Ok(verdict(Some("r1"), true, false));
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(
            v,
            json!({
                "status": "ok",
                "id": "r1",
                "is_fake": true,
                "is_suspicious": false,
                "reasons": []
            })
        );

        let err = RecordOutcome::Error(RecordFailure::new(
            1,
            Some("r2".into()),
            &InputError::MalformedDate("soon".into()),
        ));
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["kind"], "malformed_date");
        assert_eq!(v["index"], 1);
    }

    #[test]
    fn unknown_classifier_signal_is_explicit() {
        let mut v = verdict(Some("r1"), false, false);
        v.classifier = Some(ClassifierSignal::Unknown);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["classifier"], json!({"status": "unknown"}));
    }

    #[test]
    fn summary_counts_fake_before_suspicious() {
        let report = BatchReport::new(vec![
            RecordOutcome::Ok(verdict(Some("a"), true, true)),
            RecordOutcome::Ok(verdict(Some("b"), false, true)),
            RecordOutcome::Ok(verdict(Some("c"), false, false)),
            RecordOutcome::Error(RecordFailure::new(3, None, &InputError::MissingField("text"))),
        ]);
        assert_eq!(
            report.summary,
            Summary {
                total: 4,
                fake: 1,
                suspicious: 1,
                genuine: 1,
                failed: 1
            }
        );
    }
}
