use std::sync::Arc;

use crate::error::GatewayError;
use crate::limiter::ClientLimiterRegistry;

use super::metrics::GatewayMetrics;
use super::resolver::{CacheAsideResolver, Resolved};

/// Request-handling contract: admit the client, then resolve the key.
///
/// Over-limit clients are rejected before any cache or upstream work. Each
/// request spends at most one token and issues at most one cache read and
/// one cache write. There are no retries here.
pub struct AdmissionGateway {
    registry: Arc<ClientLimiterRegistry>,
    resolver: CacheAsideResolver,
    metrics: Arc<GatewayMetrics>,
}

impl AdmissionGateway {
    pub fn new(
        registry: Arc<ClientLimiterRegistry>,
        resolver: CacheAsideResolver,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            registry,
            resolver,
            metrics,
        }
    }

    pub async fn handle(&self, client_id: &str, key: Option<&str>) -> Result<Resolved, GatewayError> {
        if let Err(retry_after) = self.registry.get_limiter(client_id).check() {
            self.metrics.record_denied();
            tracing::warn!(client_id, ?retry_after, "Rejected over-limit client");
            return Err(GatewayError::AdmissionDenied { retry_after });
        }
        self.metrics.record_admitted();

        let resolved = self.resolver.resolve(key).await?;
        for diagnostic in &resolved.diagnostics {
            tracing::warn!(client_id, error = %diagnostic, "Served despite cache failure");
        }
        Ok(resolved)
    }

    pub fn registry(&self) -> &Arc<ClientLimiterRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &CacheAsideResolver {
        &self.resolver
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }
}
