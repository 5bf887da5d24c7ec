use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ingest::types::ReviewSource;
use crate::review::ReviewRecord;

/// In-memory review source for tests and local runs without an API key.
#[derive(Default)]
pub struct StaticSource {
    places: HashMap<String, Vec<ReviewRecord>>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, place_id: &str, reviews: Vec<ReviewRecord>) -> Self {
        self.places.insert(place_id.to_string(), reviews);
        self
    }

    /// Every fetch fails as if the upstream were down.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReviewSource for StaticSource {
    async fn fetch(&self, place_id: &str) -> Result<Vec<ReviewRecord>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing {
            return Err(anyhow!("static source configured to fail"));
        }
        Ok(self.places.get(place_id).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
