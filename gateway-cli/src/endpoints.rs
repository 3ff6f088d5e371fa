//! Builds a registered [`Endpoint`] from one [`EndpointConfig`] entry,
//! dispatching on the configured dialect name to the matching translator
//! (spec §4.C).

use crate::config::EndpointConfig;
use omnigate_core::{GatewayError, Result};
use omnigate_endpoint::providers::{AnthropicDialect, GeminiDialect, LocalDialect, MistralDialect, OpenAiDialect, XaiDialect};
use omnigate_endpoint::{Endpoint, HttpEndpoint, HttpEndpointConfig};
use std::sync::Arc;

pub fn build_endpoint(config: &EndpointConfig) -> Result<Arc<dyn Endpoint>> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| GatewayError::Config(format!("missing environment variable {}", config.api_key_env)))?;
    let http_config =
        HttpEndpointConfig::new(config.provider.clone(), config.region.clone(), config.base_url.clone(), api_key);

    let endpoint: Arc<dyn Endpoint> = match config.dialect.as_str() {
        "openai" => Arc::new(HttpEndpoint::new(http_config, OpenAiDialect::new())?),
        "anthropic" => Arc::new(HttpEndpoint::new(http_config, AnthropicDialect::new())?),
        "gemini" => Arc::new(HttpEndpoint::new(http_config, GeminiDialect::new())?),
        "mistral" => Arc::new(HttpEndpoint::new(http_config, MistralDialect::new())?),
        "xai" => Arc::new(HttpEndpoint::new(http_config, XaiDialect::new())?),
        "local" => Arc::new(HttpEndpoint::new(http_config, LocalDialect::new())?),
        other => return Err(GatewayError::Config(format!("unknown dialect '{other}'"))),
    };
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dialect_is_a_config_error() {
        std::env::set_var("TEST_API_KEY_UNKNOWN_DIALECT", "key");
        let config = EndpointConfig {
            provider: "acme".into(),
            region: "us".into(),
            dialect: "acme-proprietary".into(),
            base_url: "https://example.com".into(),
            api_key_env: "TEST_API_KEY_UNKNOWN_DIALECT".into(),
        };
        let err = build_endpoint(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn missing_api_key_env_var_is_a_config_error() {
        std::env::remove_var("TEST_API_KEY_DOES_NOT_EXIST");
        let config = EndpointConfig {
            provider: "openai".into(),
            region: "us".into(),
            dialect: "openai".into(),
            base_url: "https://api.openai.com".into(),
            api_key_env: "TEST_API_KEY_DOES_NOT_EXIST".into(),
        };
        let err = build_endpoint(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn known_dialect_builds_successfully() {
        std::env::set_var("TEST_API_KEY_KNOWN_DIALECT", "key");
        let config = EndpointConfig {
            provider: "openai".into(),
            region: "us".into(),
            dialect: "openai".into(),
            base_url: "https://api.openai.com".into(),
            api_key_env: "TEST_API_KEY_KNOWN_DIALECT".into(),
        };
        assert!(build_endpoint(&config).is_ok());
    }
}
