use std::sync::Arc;

use axum::{Router, routing::get};
use config::Config;
use gateway::AdmissionGateway;

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod middleware;
pub mod routes;
pub mod upstream;
pub mod utils;

/// Process-wide state, built once in `main` and shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<AdmissionGateway>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::weather::index))
        .route("/weather", get(routes::weather::get_weather))
        .route("/health", get(routes::health::health))
        .layer(axum::middleware::from_fn(middleware::log_errors))
        .with_state(state)
}
