use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::clock::Clock;

use super::bucket::{RateLimiter, saturating_secs};

/// Owns one token bucket per client identifier.
///
/// Lookup and insert-if-absent go through a single `DashMap` entry, so two
/// first sightings of the same client can never produce two buckets.
/// Buckets idle for longer than the idle timeout are dropped by
/// [`ClientLimiterRegistry::evict_idle`], and a new client that would push
/// the map past `max_clients` first makes room for itself.
#[derive(Debug)]
pub struct ClientLimiterRegistry {
    limiters: DashMap<String, Arc<RateLimiter>>,
    rate: f64,
    burst: u32,
    idle_timeout: Duration,
    max_clients: usize,
    clock: Arc<dyn Clock>,
}

impl ClientLimiterRegistry {
    /// The idle timeout is raised to at least `burst / rate`: a bucket idle
    /// that long is full again, so dropping it cannot change a decision.
    pub fn new(
        rate: f64,
        burst: u32,
        idle_timeout: Duration,
        max_clients: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let time_to_full = saturating_secs(f64::from(burst) / rate);
        Self {
            limiters: DashMap::new(),
            rate,
            burst,
            idle_timeout: idle_timeout.max(time_to_full),
            max_clients: max_clients.max(1),
            clock,
        }
    }

    pub fn get_limiter(&self, client_id: &str) -> Arc<RateLimiter> {
        if let Some(existing) = self.limiters.get(client_id) {
            return Arc::clone(existing.value());
        }

        if self.limiters.len() >= self.max_clients {
            self.make_room();
        }

        let limiter = Arc::clone(
            self.limiters
                .entry(client_id.to_string())
                .or_insert_with(|| {
                    tracing::debug!(client_id, "Tracking new client");
                    Arc::new(RateLimiter::new(self.rate, self.burst, Arc::clone(&self.clock)))
                })
                .value(),
        );

        // Racing first sightings can each pass the check above.
        while self.limiters.len() > self.max_clients {
            if !self.evict_oldest_except(Some(client_id)) {
                break;
            }
        }
        limiter
    }

    pub fn allow(&self, client_id: &str) -> bool {
        self.get_limiter(client_id).allow()
    }

    /// Drops buckets whose last access is older than the idle timeout.
    /// Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.limiters.len();
        self.limiters.retain(|_, limiter| {
            now.saturating_duration_since(limiter.last_access()) < self.idle_timeout
        });
        before.saturating_sub(self.limiters.len())
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.limiters.contains_key(client_id)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn make_room(&self) {
        let evicted = self.evict_idle();
        if self.limiters.len() < self.max_clients {
            tracing::debug!(evicted, "Evicted idle clients to make room");
            return;
        }

        self.evict_oldest_except(None);
    }

    /// Removes the least recently used bucket other than `keep`.
    fn evict_oldest_except(&self, keep: Option<&str>) -> bool {
        let oldest = self
            .limiters
            .iter()
            .filter(|entry| Some(entry.key().as_str()) != keep)
            .min_by_key(|entry| entry.value().last_access())
            .map(|entry| entry.key().clone());
        match oldest {
            Some(client_id) => {
                self.limiters.remove(&client_id);
                tracing::debug!(client_id, "Evicted least recently used client");
                true
            }
            None => false,
        }
    }
}

/// Periodically evicts idle client buckets until the task is aborted.
pub fn spawn_sweeper(registry: Arc<ClientLimiterRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle();
            if evicted > 0 {
                tracing::info!(evicted, remaining = registry.len(), "Swept idle client limiters");
            }
        }
    })
}
