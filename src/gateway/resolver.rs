use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::cache::{CacheError, CacheStore};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::upstream::{Payload, UpstreamError, UpstreamFetcher};

use super::metrics::GatewayMetrics;
use super::single_flight::SingleFlight;

/// Where a resolved payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    CacheHit,
    UpstreamFill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub payload: Payload,
    pub source: Source,
    /// Non-fatal cache failures met while resolving.
    pub diagnostics: Vec<CacheError>,
}

/// Payload plus the cache write failure, if the write failed.
type FillOutcome = Result<(Payload, Option<CacheError>), UpstreamError>;

/// Cache-aside lookup: read the cache, on a miss fetch upstream and populate
/// the cache, then return the payload.
///
/// Concurrent misses for one key share a single fetch and a single write.
/// The fill runs on its own task, so a caller that goes away mid-fetch
/// neither cancels it for the others nor leaves it behind for later callers.
pub struct CacheAsideResolver {
    cache: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamFetcher>,
    ttl: Duration,
    fetch_timeout: Duration,
    cache_timeout: Duration,
    default_key: String,
    flights: SingleFlight<FillOutcome>,
    metrics: Arc<GatewayMetrics>,
}

impl CacheAsideResolver {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamFetcher>,
        config: &GatewayConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            cache,
            upstream,
            ttl: config.ttl,
            fetch_timeout: config.fetch_timeout,
            cache_timeout: config.cache_timeout,
            default_key: config.default_key.trim().to_string(),
            flights: SingleFlight::new(),
            metrics,
        }
    }

    /// Missing or blank keys map to the default key; others are trimmed.
    pub fn normalize_key<'a>(&'a self, key: Option<&'a str>) -> &'a str {
        match key.map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => &self.default_key,
        }
    }

    pub async fn resolve(&self, key: Option<&str>) -> Result<Resolved, GatewayError> {
        let key = self.normalize_key(key);
        let mut diagnostics = Vec::new();

        match timeout(self.cache_timeout, self.cache.get(key)).await {
            Ok(Ok(Some(bytes))) => {
                tracing::debug!(key, bytes = bytes.len(), "Cache hit");
                self.metrics.record_cache_hit();
                return Ok(Resolved {
                    payload: Payload::from(bytes),
                    source: Source::CacheHit,
                    diagnostics,
                });
            }
            Ok(Ok(None)) => tracing::debug!(key, "Cache miss"),
            Ok(Err(err)) => {
                tracing::warn!(key, error = %err, "Cache read failed, falling back to upstream");
                self.metrics.record_cache_error();
                diagnostics.push(err);
            }
            Err(_) => {
                let err = CacheError::Timeout(self.cache_timeout);
                tracing::warn!(key, error = %err, "Cache read failed, falling back to upstream");
                self.metrics.record_cache_error();
                diagnostics.push(err);
            }
        }

        let fill = Fill {
            cache: Arc::clone(&self.cache),
            upstream: Arc::clone(&self.upstream),
            key: key.to_string(),
            ttl: self.ttl,
            fetch_timeout: self.fetch_timeout,
            cache_timeout: self.cache_timeout,
        };
        let (outcome, leader) = self.flights.run(key, move || fill.run()).await;
        let outcome =
            outcome.unwrap_or_else(|aborted| Err(UpstreamError::Unavailable(aborted.to_string())));
        if !leader {
            self.metrics.record_coalesced();
        }

        match outcome {
            Ok((payload, write_error)) => {
                self.metrics.record_upstream_fill();
                if let Some(err) = write_error {
                    if leader {
                        self.metrics.record_cache_error();
                    }
                    diagnostics.push(err);
                }
                Ok(Resolved {
                    payload,
                    source: Source::UpstreamFill,
                    diagnostics,
                })
            }
            Err(err) => {
                self.metrics.record_upstream_failure();
                tracing::error!(key, error = %err, "Upstream fetch failed");
                Err(err.into())
            }
        }
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }
}

/// Owned state for one fetch-and-populate, so it can outlive the request
/// that started it.
struct Fill {
    cache: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamFetcher>,
    key: String,
    ttl: Duration,
    fetch_timeout: Duration,
    cache_timeout: Duration,
}

impl Fill {
    async fn run(self) -> FillOutcome {
        let payload = match timeout(self.fetch_timeout, self.upstream.fetch(&self.key)).await {
            Ok(fetched) => fetched?,
            Err(_) => return Err(UpstreamError::Timeout(self.fetch_timeout)),
        };
        tracing::info!(key = %self.key, bytes = payload.len(), "Fetched from upstream");

        let write = timeout(
            self.cache_timeout,
            self.cache.set(&self.key, payload.as_bytes(), self.ttl),
        )
        .await;
        let write_error = match write {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(_) => Some(CacheError::Timeout(self.cache_timeout)),
        };
        if let Some(err) = &write_error {
            tracing::warn!(key = %self.key, error = %err, "Cache write failed, serving fetched payload");
        }
        Ok((payload, write_error))
    }
}
