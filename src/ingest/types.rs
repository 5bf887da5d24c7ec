// src/ingest/types.rs
use anyhow::Result;

use crate::review::ReviewRecord;

/// Collaborator that fetches the current reviews of one entity (e.g. a place).
#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch(&self, place_id: &str) -> Result<Vec<ReviewRecord>>;
    fn name(&self) -> &'static str;
}
