use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;
use crate::gateway::MetricsSnapshot;
use crate::utils::success_to_api_response;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub tracked_clients: usize,
    pub metrics: MetricsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = &state.gateway;
    (
        StatusCode::OK,
        success_to_api_response(HealthResponse {
            status: "ok".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            tracked_clients: gateway.registry().len(),
            metrics: gateway.metrics().snapshot(),
        }),
    )
}
