//! Upstream data provider port.

use std::time::Duration;

use async_trait::async_trait;

mod model;
mod weather;

pub use model::{Day, Weather};
pub use weather::WeatherClient;

/// Opaque resolved value, passed through byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Unavailable(String),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    #[error("upstream answered with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("upstream payload could not be decoded: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait UpstreamFetcher: Send + Sync + 'static {
    /// Fetches the value for `key`. The caller bounds the call with its own
    /// deadline; implementations should also give up on their own.
    async fn fetch(&self, key: &str) -> Result<Payload, UpstreamError>;
}
