//! The generic HTTP-backed [`Endpoint`] implementation: one per (provider,
//! region), parameterised over a [`Dialect`]. Grounded on the
//! `perform_request`/`check_response` shape used for upstream REST calls
//! elsewhere in the pack: build the request, apply auth, send, classify
//! the status code, decode.

use crate::dialect::Dialect;
use crate::{synthesize_stream, ChatStream, Endpoint};
use async_trait::async_trait;
use omnigate_core::{ChatRequest, ChatResponse, GatewayError, Result};
use std::time::{Duration, Instant};

/// Upstream HTTPS calls get a long client timeout to accommodate slow
/// generations (spec §4.C: "≥30 min").
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct HttpEndpointConfig {
    pub provider: String,
    pub region: String,
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl HttpEndpointConfig {
    pub fn new(
        provider: impl Into<String>,
        region: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct HttpEndpoint<D: Dialect> {
    config: HttpEndpointConfig,
    dialect: D,
    client: reqwest::Client,
}

impl<D: Dialect> HttpEndpoint<D> {
    pub fn new(config: HttpEndpointConfig, dialect: D) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("building http client: {e}")))?;
        Ok(Self { config, dialect, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn upstream_error(&self, message: impl Into<String>) -> GatewayError {
        GatewayError::upstream_protocol(&self.config.provider, &self.config.region, message)
    }

    /// Classify the response status and decode the body as JSON. HTTP 429
    /// becomes `QuotaExceeded`; any other non-2xx becomes `UpstreamProtocol`
    /// (spec §4.C).
    async fn check_response(&self, response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if status.as_u16() == 429 {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::quota_exceeded(&self.config.provider, &self.config.region, message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(self.upstream_error(format!("HTTP {status}: {message}")));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| self.upstream_error(format!("decoding response body: {e}")))
    }
}

#[async_trait]
impl<D: Dialect + Send + Sync> Endpoint for HttpEndpoint<D> {
    fn provider(&self) -> &str {
        &self.config.provider
    }

    fn region(&self) -> &str {
        &self.config.region
    }

    async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        let builder = self.dialect.apply_auth(self.client.get(self.url("/")), &self.config.api_key);
        builder.send().await.map_err(|e| self.upstream_error(format!("ping failed: {e}")))?;
        Ok(started.elapsed())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let path = self.dialect.chat_path(&request.model);
        let body = self.dialect.build_chat_body(request);
        let builder = self
            .dialect
            .apply_auth(self.client.post(self.url(&path)).json(&body), &self.config.api_key);

        let response =
            builder.send().await.map_err(|e| self.upstream_error(format!("request failed: {e}")))?;
        let value = self.check_response(response).await?;

        self.dialect
            .parse_chat_response(&request.model, value)
            .map_err(|e| self.upstream_error(e))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let response = self.chat(request).await?;
        Ok(synthesize_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::OpenAiDialect;

    #[test]
    fn url_joins_base_and_path() {
        let config = HttpEndpointConfig::new("openai", "us-east", "https://api.openai.com/", "sk-test");
        let endpoint = HttpEndpoint::new(config, OpenAiDialect::new()).unwrap();
        assert_eq!(endpoint.url("/v1/chat/completions"), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn provider_and_region_match_config() {
        let config = HttpEndpointConfig::new("openai", "us-east", "https://api.openai.com", "sk-test");
        let endpoint = HttpEndpoint::new(config, OpenAiDialect::new()).unwrap();
        assert_eq!(endpoint.provider(), "openai");
        assert_eq!(endpoint.region(), "us-east");
        assert_eq!(endpoint.key(), "openai/us-east");
    }
}
