//! Batch-scoped duplicate text counter.
//!
//! Counts are exact-text and live only as long as one batch evaluation; nothing
//! is shared across batches or cache entries.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DuplicateTracker {
    counts: HashMap<String, usize>,
}

impl DuplicateTracker {
    pub fn from_texts<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for t in texts {
            *counts.entry(t.to_string()).or_default() += 1;
        }
        Self { counts }
    }

    pub fn count(&self, text: &str) -> usize {
        self.counts.get(text).copied().unwrap_or(0)
    }

    /// True when the exact text occurs more than once in the batch.
    pub fn is_duplicate(&self, text: &str) -> bool {
        self.count(text) > 1
    }

    /// Number of distinct texts that occur more than once.
    pub fn duplicated_texts(&self) -> usize {
        self.counts.values().filter(|&&n| n > 1).count()
    }
}
