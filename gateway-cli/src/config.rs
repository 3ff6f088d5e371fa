//! TOML configuration file format for the `omnigate` binary. Endpoint
//! credentials are never stored here directly — only the name of the
//! environment variable that holds them, so a config file is safe to
//! commit (spec §9: credentials are endpoint attributes, not identity).

use omnigate_core::RoutingConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// The identity half of (provider, region) — spec §3.
    pub provider: String,
    pub region: String,
    /// Which wire dialect to translate through: `openai`, `anthropic`,
    /// `gemini`, `mistral`, `xai`, or `local`.
    pub dialect: String,
    pub base_url: String,
    pub api_key_env: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let config: AppConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn endpoint_list_parses() {
        let text = r#"
            listen = "0.0.0.0:9000"

            [[endpoints]]
            provider = "openai"
            region = "us-east"
            dialect = "openai"
            base_url = "https://api.openai.com"
            api_key_env = "OPENAI_API_KEY"
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].provider, "openai");
    }
}
