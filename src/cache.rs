//! In-memory verdict cache.
//!
//! Maps an opaque source key (e.g. a place id) to the last computed
//! [`BatchReport`]. Reports are shared as `Arc` so readers never copy them.
//! Entries are dropped wholesale by the sweeper; there is no per-entry TTL.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CacheUnavailable;
use crate::verdict::BatchReport;

/// Something the periodic sweeper can clean.
pub trait Sweep: Send + Sync {
    /// Perform one sweep, returning how many entries were dropped.
    fn sweep(&self) -> usize;

    fn label(&self) -> &'static str;
}

/// Storage seam for analysis results. The service fails open on errors.
pub trait VerdictStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Arc<BatchReport>>, CacheUnavailable>;

    fn put(&self, key: &str, report: Arc<BatchReport>) -> Result<(), CacheUnavailable>;
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<BatchReport>,
    pub inserted_at: DateTime<Utc>,
}

/// Diagnostic view for `/debug/cache`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub oldest_inserted_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    offline: AtomicBool,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut guard = self.entries.write();
        let n = guard.len();
        guard.clear();
        n
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.entries.read();
        CacheStats {
            entries: guard.len(),
            oldest_inserted_at: guard.values().map(|e| e.inserted_at).min(),
        }
    }

    /// Make every get/put fail with `CacheUnavailable` (fault injection).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    fn ensure_online(&self) -> Result<(), CacheUnavailable> {
        if self.offline.load(Ordering::Relaxed) {
            Err(CacheUnavailable::new("store offline"))
        } else {
            Ok(())
        }
    }
}

impl VerdictStore for ResultCache {
    fn get(&self, key: &str) -> Result<Option<Arc<BatchReport>>, CacheUnavailable> {
        self.ensure_online()?;
        Ok(self.entries.read().get(key).map(|e| Arc::clone(&e.value)))
    }

    fn put(&self, key: &str, report: Arc<BatchReport>) -> Result<(), CacheUnavailable> {
        self.ensure_online()?;
        self.entries.write().insert(
            key.to_string(),
            CacheEntry {
                value: report,
                inserted_at: Utc::now(),
            },
        );
        Ok(())
    }
}

impl Sweep for ResultCache {
    fn sweep(&self) -> usize {
        self.clear()
    }

    fn label(&self) -> &'static str {
        "verdict_cache"
    }
}
