use axum::{
    body::{Body, to_bytes},
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, error, warn};
use uuid::Uuid;

const MAX_LOGGED_BODY: usize = 4096;

/// Tags each request with an id, echoes it in `x-request-id`, and logs the
/// body of throttled and server-error responses.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("x-request-id", value);
        }

        let status = response.status();
        if !status.is_server_error() && status != StatusCode::TOO_MANY_REQUESTS {
            return response;
        }

        // Error bodies are built in-process, so buffering them whole is bounded.
        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read error response body: {}", e);
                return Response::from_parts(parts, Body::empty());
            }
        };
        let body_str = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_LOGGED_BODY)]);

        if status.is_server_error() {
            error!(status = %parts.status, body = %body_str, "Server error occurred");
        } else {
            warn!(status = %parts.status, body = %body_str, "Request throttled");
        }

        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    }
    .instrument(span)
    .await
}
