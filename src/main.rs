use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weather_gateway::{
    AppState, app,
    cache::{CacheStore, RedisCacheStore},
    clock::{Clock, SystemClock},
    config::Config,
    gateway::{AdmissionGateway, CacheAsideResolver, GatewayMetrics},
    limiter::{ClientLimiterRegistry, spawn_sweeper},
    upstream::{UpstreamFetcher, WeatherClient},
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    let gateway_config = config.gateway();
    gateway_config
        .validate()
        .expect("Invalid rate limit or cache configuration");
    tracing::info!(
        rate = gateway_config.rate,
        burst = gateway_config.burst,
        ttl_secs = gateway_config.ttl.as_secs(),
        default_key = %gateway_config.default_key,
        "Gateway configured"
    );

    // Redis 缓存
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let cache: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(Arc::new(redis_client)));

    // 上游天气服务
    let upstream: Arc<dyn UpstreamFetcher> = Arc::new(
        WeatherClient::new(
            &config.upstream_base_url,
            &config.upstream_api_key,
            gateway_config.fetch_timeout,
        )
        .expect("Failed to create upstream client"),
    );

    // 限流器
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(ClientLimiterRegistry::new(
        gateway_config.rate,
        gateway_config.burst,
        config.limiter_idle_timeout(),
        config.limiter_max_clients,
        clock,
    ));
    let _sweeper = spawn_sweeper(Arc::clone(&registry), config.limiter_sweep_interval());

    let metrics = Arc::new(GatewayMetrics::new());
    let resolver = CacheAsideResolver::new(cache, upstream, &gateway_config, Arc::clone(&metrics));
    let gateway = Arc::new(AdmissionGateway::new(registry, resolver, metrics));

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        gateway,
    };
    let router = app(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
