use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide observability counters. Never read by the ranking itself.
#[derive(Debug, Default)]
pub struct EngineCounters {
    requests: AtomicU64,
    unresolved_category: AtomicU64,
    empty_pool: AtomicU64,
    excluded_incompatible: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub requests: u64,
    pub unresolved_category: u64,
    pub empty_pool: u64,
    pub excluded_incompatible: u64,
}

impl EngineCounters {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved_category(&self) {
        self.unresolved_category.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_pool(&self) {
        self.empty_pool.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_excluded_incompatible(&self, count: usize) {
        self.excluded_incompatible.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            unresolved_category: self.unresolved_category.load(Ordering::Relaxed),
            empty_pool: self.empty_pool.load(Ordering::Relaxed),
            excluded_incompatible: self.excluded_incompatible.load(Ordering::Relaxed),
        }
    }
}
