//! Feature Data Service client
//!
//! Wraps the four calls of the external service behind typed async
//! functions. No business logic lives here beyond surfacing transport,
//! status and payload errors; degradation policy belongs to the callers.

use async_trait::async_trait;
use featscope_common::types::{
    DescriptionRequest, DescriptionResponse, EffectSample, RawEffectSample, SearchHit,
};
use featscope_common::FeatureId;
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("featscope/", env!("CARGO_PKG_VERSION"));

/// Feature Data Service client errors
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport failure (connection refused, timeout, bad URL)
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status
    #[error("Service error {0}: {1}")]
    Status(u16, String),

    /// Response body missing, unparsable or of the wrong shape
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// The Feature Data Service as seen by the explorer
///
/// Implemented over HTTP by [`HttpFeatureClient`]; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// `GET /get_data?index={feature}`: features similar to `feature`
    async fn similar(&self, feature: FeatureId) -> Result<EffectSample, ClientError>;

    /// `GET /get_top_effects?feature={feature}`: strongest effects of `feature`
    async fn top_effects(&self, feature: FeatureId) -> Result<EffectSample, ClientError>;

    /// `POST /get_description`: text descriptions for a batch of features
    ///
    /// Features the service knows nothing about are simply absent.
    async fn descriptions(
        &self,
        keys: &[FeatureId],
    ) -> Result<HashMap<FeatureId, String>, ClientError>;

    /// `GET /search/{query}`: free-text search over descriptions
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError>;
}

/// HTTP implementation of [`FeatureSource`]
pub struct HttpFeatureClient {
    http_client: reqwest::Client,
    origin: Url,
}

impl HttpFeatureClient {
    /// Create a client for the service at `origin` (e.g. `http://localhost:5000`)
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, ClientError> {
        let origin = Url::parse(origin)
            .map_err(|e| ClientError::Network(format!("invalid service origin {}: {}", origin, e)))?;

        if origin.cannot_be_a_base() {
            return Err(ClientError::Network(format!(
                "service origin cannot be a base URL: {}",
                origin
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            origin,
        })
    }

    /// Origin the client talks to
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Build an endpoint URL from path segments (each segment is percent-encoded)
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Network(format!("bad service origin: {}", self.origin)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and check the status
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn fetch_effects(
        &self,
        path: &str,
        param: &str,
        feature: FeatureId,
    ) -> Result<EffectSample, ClientError> {
        let url = self.endpoint(&[path])?;
        tracing::debug!(feature, url = %url, "Fetching effect sample");

        let request = self
            .http_client
            .get(url)
            .query(&[(param, feature.to_string())]);
        let response = self.send(request).await?;

        let raw: Option<RawEffectSample> = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;

        let sample = raw
            .ok_or_else(|| ClientError::Malformed("empty effect payload".to_string()))?
            .validate()
            .map_err(|e| ClientError::Malformed(e.to_string()))?;

        tracing::debug!(feature, entries = sample.len(), "Effect sample received");
        Ok(sample)
    }
}

#[async_trait]
impl FeatureSource for HttpFeatureClient {
    async fn similar(&self, feature: FeatureId) -> Result<EffectSample, ClientError> {
        self.fetch_effects("get_data", "index", feature)
            .await
            .inspect_err(|e| tracing::error!(feature, error = %e, "Similarity lookup failed"))
    }

    async fn top_effects(&self, feature: FeatureId) -> Result<EffectSample, ClientError> {
        self.fetch_effects("get_top_effects", "feature", feature)
            .await
            .inspect_err(|e| tracing::error!(feature, error = %e, "Top effects lookup failed"))
    }

    async fn descriptions(
        &self,
        keys: &[FeatureId],
    ) -> Result<HashMap<FeatureId, String>, ClientError> {
        let url = self.endpoint(&["get_description"])?;
        tracing::debug!(count = keys.len(), "Fetching descriptions");

        let body = DescriptionRequest {
            keys: keys.to_vec(),
        };
        let response = self.send(self.http_client.post(url).json(&body)).await?;

        let parsed: DescriptionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;

        Ok(parsed.descriptions)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        let url = self.endpoint(&["search", query])?;
        tracing::debug!(query, "Searching descriptions");

        let response = self.send(self.http_client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }
}
