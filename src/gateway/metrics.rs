use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Request counters for the gateway. Updated with relaxed atomics.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    admitted: AtomicU64,
    denied: AtomicU64,
    cache_hits: AtomicU64,
    upstream_fills: AtomicU64,
    upstream_failures: AtomicU64,
    cache_errors: AtomicU64,
    coalesced: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upstream_fill(&self) {
        self.upstream_fills.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            upstream_fills: self.upstream_fills.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub denied: u64,
    pub cache_hits: u64,
    pub upstream_fills: u64,
    pub upstream_failures: u64,
    pub cache_errors: u64,
    /// Misses that waited on another request's fetch instead of starting one.
    pub coalesced: u64,
}

impl MetricsSnapshot {
    /// Share of resolved lookups served from cache, 0.0 when nothing resolved yet.
    pub fn hit_ratio(&self) -> f64 {
        let resolved = self.cache_hits + self.upstream_fills;
        if resolved == 0 {
            0.0
        } else {
            self.cache_hits as f64 / resolved as f64
        }
    }
}
