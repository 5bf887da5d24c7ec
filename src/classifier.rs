//! Classifier adapter: uniform interface to an offline-trained fake-review
//! text classifier, plus concrete providers.
//!
//! A classifier that cannot answer returns `ClassifierUnavailable`; callers
//! record that as an unknown signal and never as "genuine".

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::classifier::ClassifierConfig;
use crate::error::ClassifierUnavailable;
use crate::ratelimit::GlobalPacing;

/// Output of a binary / probabilistic text classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// `true` means "likely fake".
    pub label: bool,
    /// Confidence of `label`, in [0, 1].
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: bool, confidence: f32) -> Self {
        Self {
            label,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Build from the probability of the "fake" class.
    pub fn from_probability(p_fake: f32) -> Self {
        let p = if p_fake.is_finite() { p_fake.clamp(0.0, 1.0) } else { 0.0 };
        if p >= 0.5 {
            Self::new(true, p)
        } else {
            Self::new(false, 1.0 - p)
        }
    }
}

#[async_trait]
pub trait ReviewClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierUnavailable>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn ReviewClassifier>;

/// Build a classifier according to config and environment.
///
/// * `CLASSIFIER_TEST_MODE=mock` returns a deterministic [`FixedClassifier`].
/// * `enabled = false` returns `None` (no classifier signal on verdicts).
/// * Otherwise an [`HttpClassifier`] behind a [`GlobalPacing`] gate.
pub fn build_classifier(cfg: &ClassifierConfig) -> Option<DynClassifier> {
    if std::env::var("CLASSIFIER_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Some(Arc::new(FixedClassifier::answering(Classification::new(
            false, 0.9,
        ))));
    }

    if !cfg.enabled {
        return None;
    }

    let Some(endpoint) = cfg.endpoint.clone().filter(|e| !e.trim().is_empty()) else {
        warn!(target: "classifier", "classifier enabled without endpoint; signal will be unknown");
        return Some(Arc::new(DisabledClassifier));
    };

    let http = match HttpClassifier::new(endpoint, cfg.api_key.clone(), cfg.timeout_ms) {
        Ok(h) => h,
        Err(e) => {
            warn!(target: "classifier", error = %e, "failed to build http classifier");
            return Some(Arc::new(DisabledClassifier));
        }
    };
    let pacing = Arc::new(GlobalPacing::per_minute(cfg.calls_per_minute));
    Some(Arc::new(PacedClassifier::new(http, pacing)))
}

// ------------------------------------------------------------
// Text preprocessing (mirrors the training pipeline)
// ------------------------------------------------------------

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit regex"));

/// Lowercase, collapse whitespace, strip punctuation and digits, trim.
pub fn clean_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let out = RE_WS.replace_all(&lower, " ");
    let out = RE_PUNCT.replace_all(&out, "");
    let out = RE_DIGITS.replace_all(&out, "");
    out.trim().to_string()
}

// ------------------------------------------------------------
// Providers
// ------------------------------------------------------------

/// Model server reached over HTTP. POSTs `{"data": "<cleaned text>"}`.
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(endpoint: String, api_key: Option<String>, timeout_ms: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("truetale-analyzer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

/// Response shapes accepted from model servers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictResponse {
    Labelled { label: bool, confidence: f32 },
    Hard { prediction: bool },
    Probabilities { prediction: Vec<Vec<f32>> },
}

impl PredictResponse {
    fn into_classification(self) -> Option<Classification> {
        match self {
            PredictResponse::Labelled { label, confidence } => {
                Some(Classification::new(label, confidence))
            }
            PredictResponse::Hard { prediction } => Some(Classification::new(prediction, 1.0)),
            PredictResponse::Probabilities { prediction } => prediction
                .first()
                .and_then(|row| row.first())
                .map(|p| Classification::from_probability(*p)),
        }
    }
}

#[async_trait]
impl ReviewClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierUnavailable> {
        #[derive(Serialize)]
        struct Req<'a> {
            data: &'a str,
        }

        let cleaned = clean_text(text);
        let mut req = self.http.post(&self.endpoint).json(&Req { data: &cleaned });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClassifierUnavailable::new(format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(ClassifierUnavailable::new(format!(
                "model server returned {}",
                resp.status()
            )));
        }
        let body: PredictResponse = resp
            .json()
            .await
            .map_err(|e| ClassifierUnavailable::new(format!("unreadable response: {e}")))?;
        body.into_classification()
            .ok_or_else(|| ClassifierUnavailable::new("empty prediction"))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Always unavailable; used when the classifier is misconfigured.
pub struct DisabledClassifier;

#[async_trait]
impl ReviewClassifier for DisabledClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, ClassifierUnavailable> {
        Err(ClassifierUnavailable::new("classifier disabled"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic classifier for tests and local runs.
#[derive(Clone)]
pub struct FixedClassifier {
    pub fixed: Result<Classification, ClassifierUnavailable>,
}

impl FixedClassifier {
    pub fn answering(c: Classification) -> Self {
        Self { fixed: Ok(c) }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            fixed: Err(ClassifierUnavailable::new(reason)),
        }
    }
}

#[async_trait]
impl ReviewClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, ClassifierUnavailable> {
        self.fixed.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Wraps a classifier so calls to it are spaced by a shared pacing gate.
pub struct PacedClassifier<C> {
    inner: C,
    pacing: Arc<GlobalPacing>,
}

impl<C: ReviewClassifier> PacedClassifier<C> {
    pub fn new(inner: C, pacing: Arc<GlobalPacing>) -> Self {
        Self { inner, pacing }
    }
}

#[async_trait]
impl<C: ReviewClassifier> ReviewClassifier for PacedClassifier<C> {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierUnavailable> {
        self.pacing.acquire().await;
        self.inner.classify(text).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
