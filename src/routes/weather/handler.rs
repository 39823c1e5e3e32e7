use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};

use crate::AppState;
use crate::gateway::Source;
use crate::middleware::ClientId;

use super::model::WeatherQuery;

pub async fn index() -> Redirect {
    Redirect::to("/weather")
}

/// Serves the payload bytes as-is; `x-cache` says whether it came from cache.
pub async fn get_weather(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Query(query): Query<WeatherQuery>,
) -> Response {
    match state.gateway.handle(&client_id, query.country.as_deref()).await {
        Ok(resolved) => {
            let source = match resolved.source {
                Source::CacheHit => "hit",
                Source::UpstreamFill => "miss",
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/json"),
                    (header::HeaderName::from_static("x-cache"), source),
                ],
                resolved.payload.into_bytes(),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}
