// src/config/classifier.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_timeout_ms() -> u64 {
    5_000
}
fn default_calls_per_minute() -> u32 {
    60
}
fn default_suspicious_threshold() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Model server URL receiving `{"data": "<text>"}`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// "ENV" means: read from CLASSIFIER_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Outbound pacing for the model server (GlobalPacing).
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: u32,
    /// A "fake" label at or above this confidence marks a verdict suspicious.
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
            calls_per_minute: default_calls_per_minute(),
            suspicious_threshold: default_suspicious_threshold(),
        }
    }
}

impl ClassifierConfig {
    /// Resolve "ENV" api keys and clamp out-of-range values.
    pub fn normalize(mut self) -> anyhow::Result<Self> {
        if let Some(key) = &self.api_key {
            if key.trim().eq_ignore_ascii_case("env") {
                self.api_key = Some(
                    env::var("CLASSIFIER_API_KEY")
                        .map_err(|_| anyhow::anyhow!("Missing CLASSIFIER_API_KEY env var"))?,
                );
            }
        }

        if !(0.0..=1.0).contains(&self.suspicious_threshold) {
            self.suspicious_threshold = default_suspicious_threshold();
        }
        if self.calls_per_minute == 0 {
            self.calls_per_minute = default_calls_per_minute();
        }

        Ok(self)
    }
}
