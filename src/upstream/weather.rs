use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::{Payload, UpstreamError, UpstreamFetcher, model::Weather};

/// Longest upstream error body kept in [`UpstreamError::Rejected`].
const MAX_ERROR_BODY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum WeatherClientError {
    #[error("invalid upstream base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetches today's forecast for a place from the timeline API.
///
/// The body is decoded into [`Weather`] and re-encoded, so only payloads
/// with the expected shape ever reach the cache.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, WeatherClientError> {
        let invalid = |reason: String| WeatherClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            timeout,
        })
    }

    fn url_for(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key).push("today");
        }
        url.query_pairs_mut()
            .append_pair("unitGroup", "metric")
            .append_pair("include", "days")
            .append_pair("key", &self.api_key)
            .append_pair("contentType", "json");
        url
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            // The request URL carries the API key.
            UpstreamError::Unavailable(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl UpstreamFetcher for WeatherClient {
    async fn fetch(&self, key: &str) -> Result<Payload, UpstreamError> {
        let response = self
            .http
            .get(self.url_for(key))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        if !status.is_success() {
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let weather: Weather =
            serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        let bytes =
            serde_json::to_vec(&weather).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        Ok(Payload::from(bytes))
    }
}

/// Lossy UTF-8 text of at most `MAX_ERROR_BODY` bytes, cut on a char boundary.
fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY {
        return text.into_owned();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
