//! Core service: admission-free analysis flow shared by every entrypoint.
//!
//! cache lookup → (paced fetch) → aggregate → classifier enrichment → cache put.
//! Admission control for inbound clients happens in the HTTP layer, before
//! any of this runs.

use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregator::{parse_records, VerdictAggregator};
use crate::cache::VerdictStore;
use crate::classifier::{Classification, DynClassifier};
use crate::error::{AnalyzeError, ClassifierUnavailable};
use crate::ingest::{self, types::ReviewSource};
use crate::ratelimit::GlobalPacing;
use crate::review::{ReviewRecord, ReviewerHistory};
use crate::verdict::{BatchReport, ClassifierSignal, RecordOutcome};

pub const CLASSIFIER_REASON: &str = "Classifier flagged the text as likely fake.";

/// How the verdict cache took part in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// No cache key was supplied.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Verdict cache namespace. A batch posted under some `source_id` never
/// answers a fetch for the place with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey<'a> {
    Analyze(&'a str),
    Fetch(&'a str),
}

impl CacheKey<'_> {
    pub fn to_store_key(self) -> String {
        match self {
            CacheKey::Analyze(id) => format!("analyze:{id}"),
            CacheKey::Fetch(id) => format!("fetch:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analyzed {
    pub report: Arc<BatchReport>,
    pub cache: CacheStatus,
}

pub struct ReviewService {
    aggregator: VerdictAggregator,
    store: Arc<dyn VerdictStore>,
    classifier: Option<DynClassifier>,
    suspicious_threshold: f32,
    source: Arc<dyn ReviewSource>,
    fetch_pacing: Arc<GlobalPacing>,
    fetch_history: ReviewerHistory,
}

impl ReviewService {
    pub fn new(aggregator: VerdictAggregator, store: Arc<dyn VerdictStore>) -> Self {
        Self {
            aggregator,
            store,
            classifier: None,
            suspicious_threshold: 0.5,
            source: Arc::new(ingest::providers::fixture::StaticSource::new()),
            fetch_pacing: Arc::new(GlobalPacing::per_minute(10)),
            fetch_history: ReviewerHistory::new(6, ["product1", "product2"]),
        }
    }

    pub fn with_classifier(mut self, classifier: DynClassifier, suspicious_threshold: f32) -> Self {
        self.classifier = Some(classifier);
        self.suspicious_threshold = suspicious_threshold;
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ReviewSource>, pacing: Arc<GlobalPacing>) -> Self {
        self.source = source;
        self.fetch_pacing = pacing;
        self
    }

    pub fn with_fetch_history(mut self, history: ReviewerHistory) -> Self {
        self.fetch_history = history;
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Analyze caller-supplied records. With a `key`, a cached report for that
    /// key is returned as-is; otherwise the fresh report is stored under it.
    pub async fn analyze(
        &self,
        key: Option<&str>,
        records: &[ReviewRecord],
        history: &ReviewerHistory,
    ) -> Analyzed {
        let key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| CacheKey::Analyze(k).to_store_key());
        if let Some(k) = key.as_deref() {
            if let Some(report) = self.cached(k) {
                return Analyzed {
                    report,
                    cache: CacheStatus::Hit,
                };
            }
        }

        let report = Arc::new(self.compute(records, history).await);

        let cache = match key.as_deref() {
            Some(k) => {
                self.store_report(k, Arc::clone(&report));
                CacheStatus::Miss
            }
            None => CacheStatus::Bypass,
        };
        Analyzed { report, cache }
    }

    /// Analyze the current reviews of `place_id`, fetched through the paced
    /// review source on a cache miss.
    pub async fn fetch_and_analyze(&self, place_id: &str) -> Result<Analyzed, AnalyzeError> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(AnalyzeError::BadRequest("place_id is required".into()));
        }

        let key = CacheKey::Fetch(place_id).to_store_key();
        if let Some(report) = self.cached(&key) {
            return Ok(Analyzed {
                report,
                cache: CacheStatus::Hit,
            });
        }

        self.fetch_pacing.acquire().await;
        let records = ingest::fetch_normalized(self.source.as_ref(), place_id)
            .await
            .map_err(AnalyzeError::Upstream)?;

        let report = Arc::new(self.compute(&records, &self.fetch_history).await);
        self.store_report(&key, Arc::clone(&report));
        Ok(Analyzed {
            report,
            cache: CacheStatus::Miss,
        })
    }

    /// Run only the classifier on one text.
    pub async fn predict(&self, text: &str) -> Result<Classification, AnalyzeError> {
        if text.trim().is_empty() {
            return Err(AnalyzeError::BadRequest("review_text is required".into()));
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| ClassifierUnavailable::new("no classifier configured"))?;
        classifier.classify(text).await.map_err(|e| {
            counter!("classifier_unavailable_total").increment(1);
            warn!(target: "classifier", reason = %e.reason, "prediction unavailable");
            AnalyzeError::from(e)
        })
    }

    fn cached(&self, key: &str) -> Option<Arc<BatchReport>> {
        match self.store.get(key) {
            Ok(Some(report)) => {
                counter!("verdict_cache_hits_total").increment(1);
                debug!(target: "cache", key, "hit");
                Some(report)
            }
            Ok(None) => {
                counter!("verdict_cache_misses_total").increment(1);
                None
            }
            Err(e) => {
                counter!("verdict_cache_errors_total").increment(1);
                warn!(target: "cache", error = %e, "cache read failed; recomputing");
                None
            }
        }
    }

    fn store_report(&self, key: &str, report: Arc<BatchReport>) {
        if let Err(e) = self.store.put(key, report) {
            counter!("verdict_cache_errors_total").increment(1);
            warn!(target: "cache", error = %e, "cache write skipped");
        }
    }

    async fn compute(&self, records: &[ReviewRecord], history: &ReviewerHistory) -> BatchReport {
        let t0 = Instant::now();
        let parsed = parse_records(records);
        let mut report = self
            .aggregator
            .evaluate_parsed(records, &parsed, history, Utc::now());

        if let Some(classifier) = &self.classifier {
            let mut unavailable = 0usize;
            for (outcome, review) in report.results.iter_mut().zip(parsed.iter()) {
                let (RecordOutcome::Ok(verdict), Ok(review)) = (outcome, review) else {
                    continue;
                };
                match classifier.classify(&review.text).await {
                    Ok(c) => {
                        verdict.classifier = Some(ClassifierSignal::Known {
                            label: c.label,
                            confidence: c.confidence,
                        });
                        if c.label && c.confidence >= self.suspicious_threshold {
                            verdict.is_suspicious = true;
                            verdict.reasons.push(CLASSIFIER_REASON.to_string());
                        }
                    }
                    Err(_) => {
                        unavailable += 1;
                        verdict.classifier = Some(ClassifierSignal::Unknown);
                    }
                }
            }
            if unavailable > 0 {
                counter!("classifier_unavailable_total").increment(unavailable as u64);
                warn!(
                    target: "classifier",
                    provider = classifier.name(),
                    unavailable,
                    "classifier signal unknown for some reviews"
                );
            }
            report.refresh_summary();
        }

        let s = report.summary;
        counter!("reviews_analyzed_total").increment((s.total - s.failed) as u64);
        counter!("reviews_flagged_total").increment(s.fake as u64);
        counter!("review_record_failures_total").increment(s.failed as u64);
        histogram!("analyze_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        info!(
            target: "service",
            total = s.total,
            fake = s.fake,
            suspicious = s.suspicious,
            failed = s.failed,
            "batch analyzed"
        );
        report
    }
}
