use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub upstream_api_key: String,
    pub upstream_base_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub rate_limit_rate: f64,
    pub rate_limit_burst: u32,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
    pub cache_timeout_ms: u64,
    pub default_key: String,
    pub limiter_idle_secs: u64,
    pub limiter_max_clients: usize,
    pub limiter_sweep_secs: u64,
    pub trust_forwarded_headers: bool,
}

/// Reads an optional variable, keeping the default when it is unset or unparsable.
fn var_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = GatewayConfig::default();
        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            upstream_api_key: env::var("WEATHER_API_KEY")?,
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_BASE_URL.to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: var_or("SERVER_PORT", 7878),
            rate_limit_rate: var_or("RATE_LIMIT_RATE", defaults.rate),
            rate_limit_burst: var_or("RATE_LIMIT_BURST", defaults.burst),
            cache_ttl_secs: var_or("CACHE_TTL_SECS", defaults.ttl.as_secs()),
            fetch_timeout_ms: var_or("FETCH_TIMEOUT_MS", defaults.fetch_timeout.as_millis() as u64),
            cache_timeout_ms: var_or("CACHE_TIMEOUT_MS", defaults.cache_timeout.as_millis() as u64),
            default_key: env::var("DEFAULT_KEY").unwrap_or(defaults.default_key),
            limiter_idle_secs: var_or("LIMITER_IDLE_SECS", 600),
            limiter_max_clients: var_or("LIMITER_MAX_CLIENTS", 100_000),
            limiter_sweep_secs: var_or("LIMITER_SWEEP_SECS", 60),
            trust_forwarded_headers: var_or("TRUST_FORWARDED_HEADERS", false),
        })
    }

    /// The option set handed to the gateway core.
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            rate: self.rate_limit_rate,
            burst: self.rate_limit_burst,
            ttl: Duration::from_secs(self.cache_ttl_secs),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            cache_timeout: Duration::from_millis(self.cache_timeout_ms),
            default_key: self.default_key.clone(),
        }
    }

    pub fn limiter_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.limiter_idle_secs)
    }

    pub fn limiter_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.limiter_sweep_secs.max(1))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("rate must be a positive finite number of tokens per second, got {0}")]
    InvalidRate(f64),
    #[error("rate {rate} is too small to refill a burst of {burst}")]
    RateTooSmall { rate: f64, burst: u32 },
    #[error("burst must be at least 1")]
    ZeroBurst,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("default lookup key must not be blank")]
    BlankDefaultKey,
}

/// Injected settings for admission control and cache-aside resolution.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Tokens added to each client bucket per second.
    pub rate: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// Lifetime of a cached payload.
    pub ttl: Duration,
    pub fetch_timeout: Duration,
    /// Budget for each cache get or set, independent of the fetch budget.
    pub cache_timeout: Duration,
    /// Key used when a lookup arrives without one.
    pub default_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate: 2.0,
            burst: 10,
            ttl: Duration::from_secs(5 * 60),
            fetch_timeout: Duration::from_secs(2),
            cache_timeout: Duration::from_secs(3),
            default_key: "maltepe".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(ConfigError::InvalidRate(self.rate));
        }
        if self.burst == 0 {
            return Err(ConfigError::ZeroBurst);
        }
        if Duration::try_from_secs_f64(f64::from(self.burst) / self.rate).is_err() {
            return Err(ConfigError::RateTooSmall {
                rate: self.rate,
                burst: self.burst,
            });
        }
        for (name, value) in [
            ("ttl", self.ttl),
            ("fetch_timeout", self.fetch_timeout),
            ("cache_timeout", self.cache_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if self.default_key.trim().is_empty() {
            return Err(ConfigError::BlankDefaultKey);
        }
        Ok(())
    }
}
