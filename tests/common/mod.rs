#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use weather_gateway::{
    AppState,
    cache::{CacheError, CacheStore, MemoryCacheStore},
    clock::{Clock, ManualClock},
    config::{Config, GatewayConfig},
    gateway::{AdmissionGateway, CacheAsideResolver, GatewayMetrics},
    limiter::ClientLimiterRegistry,
    upstream::{Payload, UpstreamError, UpstreamFetcher},
};

pub fn payload_for(key: &str) -> Payload {
    Payload::from(format!("{{\"resolvedAddress\":\"{}\"}}", key).as_str())
}

/// Upstream double: answers with `payload_for(key)` unless a failure is queued.
#[derive(Default)]
pub struct ScriptedUpstream {
    calls: AtomicUsize,
    failures: Mutex<VecDeque<UpstreamError>>,
    delay: Mutex<Duration>,
}

impl ScriptedUpstream {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, err: UpstreamError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl UpstreamFetcher for ScriptedUpstream {
    async fn fetch(&self, key: &str) -> Result<Payload, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(payload_for(key))
    }
}

/// Memory store that counts calls and can be told to fail or stall.
pub struct TestCache {
    pub inner: MemoryCacheStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
    get_delay: Mutex<Duration>,
}

impl TestCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryCacheStore::with_clock(clock),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            fail_gets: AtomicBool::new(false),
            fail_sets: AtomicBool::new(false),
            get_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    pub fn stall_gets(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl CacheStore for TestCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let delay = *self.get_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("READONLY replica".into()));
        }
        self.inner.set(key, value, ttl).await
    }
}

pub struct Harness {
    pub gateway: Arc<AdmissionGateway>,
    pub cache: Arc<TestCache>,
    pub upstream: Arc<ScriptedUpstream>,
    pub clock: ManualClock,
    pub metrics: Arc<GatewayMetrics>,
}

impl Harness {
    pub fn new(config: GatewayConfig) -> Self {
        let clock = ManualClock::default();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let cache = Arc::new(TestCache::new(Arc::clone(&shared_clock)));
        let upstream = Arc::new(ScriptedUpstream::default());
        let metrics = Arc::new(GatewayMetrics::new());

        let registry = Arc::new(ClientLimiterRegistry::new(
            config.rate,
            config.burst,
            Duration::from_secs(600),
            1_000,
            shared_clock,
        ));
        let cache_port: Arc<dyn CacheStore> = cache.clone();
        let upstream_port: Arc<dyn UpstreamFetcher> = upstream.clone();
        let resolver =
            CacheAsideResolver::new(cache_port, upstream_port, &config, Arc::clone(&metrics));
        let gateway = Arc::new(AdmissionGateway::new(registry, resolver, Arc::clone(&metrics)));

        Self {
            gateway,
            cache,
            upstream,
            clock,
            metrics,
        }
    }

    pub fn state(&self, trust_forwarded_headers: bool) -> AppState {
        AppState {
            config: test_config(trust_forwarded_headers),
            gateway: Arc::clone(&self.gateway),
        }
    }
}

pub fn test_config(trust_forwarded_headers: bool) -> Config {
    let defaults = GatewayConfig::default();
    Config {
        redis_url: "redis://127.0.0.1:6379".to_string(),
        upstream_api_key: "test-key".to_string(),
        upstream_base_url: "http://127.0.0.1:9".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        rate_limit_rate: defaults.rate,
        rate_limit_burst: defaults.burst,
        cache_ttl_secs: defaults.ttl.as_secs(),
        fetch_timeout_ms: 2_000,
        cache_timeout_ms: 3_000,
        default_key: defaults.default_key,
        limiter_idle_secs: 600,
        limiter_max_clients: 1_000,
        limiter_sweep_secs: 60,
        trust_forwarded_headers,
    }
}
