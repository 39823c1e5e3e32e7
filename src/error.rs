use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::cache::CacheError;
use crate::upstream::UpstreamError;
use crate::utils::{error_codes, error_to_api_response};

/// Request-level outcomes other than success.
///
/// `AdmissionDenied` is an expected control outcome rather than a fault.
/// `CacheUnavailable` is never returned by the gateway itself: cache
/// failures are reported as diagnostics on an otherwise successful result.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("too many requests, retry in {retry_after:?}")]
    AdmissionDenied { retry_after: Duration },
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream rejected the request with status {status}: {body}")]
    UpstreamRejected { status: u16, body: String },
    #[error("upstream returned a malformed payload: {0}")]
    UpstreamMalformed(String),
    #[error(transparent)]
    CacheUnavailable(#[from] CacheError),
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unavailable(_) | UpstreamError::Timeout(_) => {
                GatewayError::UpstreamUnavailable(err.to_string())
            }
            UpstreamError::Rejected { status, body } => {
                GatewayError::UpstreamRejected { status, body }
            }
            UpstreamError::Malformed(reason) => GatewayError::UpstreamMalformed(reason),
        }
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AdmissionDenied { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamRejected { .. } | GatewayError::UpstreamMalformed(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::CacheUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            GatewayError::AdmissionDenied { .. } => error_codes::RATE_LIMIT,
            GatewayError::UpstreamUnavailable(_) => error_codes::UPSTREAM_UNAVAILABLE,
            GatewayError::UpstreamRejected { .. } => error_codes::UPSTREAM_REJECTED,
            GatewayError::UpstreamMalformed(_) => error_codes::UPSTREAM_MALFORMED,
            GatewayError::CacheUnavailable(_) => error_codes::CACHE_UNAVAILABLE,
        }
    }

    fn client_message(&self) -> String {
        match self {
            GatewayError::AdmissionDenied { retry_after } => format!(
                "Too many requests, retry in {} seconds",
                retry_after_secs(*retry_after)
            ),
            other => other.to_string(),
        }
    }
}

/// Whole seconds for `Retry-After`, rounded up and never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs().saturating_add(u64::from(wait.subsec_nanos() > 0));
    secs.max(1)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = error_to_api_response::<()>(self.code(), self.client_message());
        let mut response = (status, body).into_response();

        if let GatewayError::AdmissionDenied { retry_after } = self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}
