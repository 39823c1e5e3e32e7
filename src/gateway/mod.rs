//! Admission control composed with cache-aside resolution.

mod admission;
mod metrics;
mod resolver;
mod single_flight;

pub use admission::AdmissionGateway;
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use resolver::{CacheAsideResolver, Resolved, Source};
pub use single_flight::{FlightAborted, SingleFlight};
