use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::AppState;

/// Rate-limiting identity of the caller, taken from the connection origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

/// Resolves the client identifier.
///
/// Proxy headers (`x-real-ip`, then the first non-empty `x-forwarded-for`
/// entry) are only honored when `trust_forwarded` is set; otherwise any
/// caller could pick its own bucket.
pub fn client_id_from(headers: &HeaderMap, remote: Option<SocketAddr>, trust_forwarded: bool) -> String {
    let remote_ip = remote.map(|addr| addr.ip().to_string());

    let forwarded = trust_forwarded
        .then(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .or_else(|| {
                    headers
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
                })
        })
        .flatten();

    forwarded
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .to_string()
}

impl FromRequestParts<AppState> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let id = client_id_from(&parts.headers, remote, state.config.trust_forwarded_headers);
        tracing::debug!(client_id = %id, "Identified client");
        Ok(ClientId(id))
    }
}
