//! Endpoint identity and capability types shared across the fabric.
//!
//! An endpoint is uniquely named by `(provider, region)`; credentials and
//! base URL are attributes, not identity (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId {
    pub provider: String,
    pub region: String,
}

impl EndpointId {
    pub fn new(provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self { provider: provider.into(), region: region.into() }
    }

    /// `"provider/region"`, the canonical string key used by the state
    /// store and the admin surface's path segments.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.region)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The capability surface a provider adapter may implement. Unsupported
/// capabilities return [`crate::GatewayError::Unsupported`] rather than
/// being absent from a trait — see `omnigate-endpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Chat,
    ChatStream,
    Embedding,
    Image,
    TranscribeAudio,
    TranslateAudio,
    Speech,
    Moderation,
    FineTuning,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Chat => "chat",
            Capability::ChatStream => "chat_stream",
            Capability::Embedding => "embedding",
            Capability::Image => "image",
            Capability::TranscribeAudio => "transcribe_audio",
            Capability::TranslateAudio => "translate_audio",
            Capability::Speech => "speech",
            Capability::Moderation => "moderation",
            Capability::FineTuning => "fine_tuning",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_key_is_provider_slash_region() {
        let id = EndpointId::new("openai", "us-east");
        assert_eq!(id.key(), "openai/us-east");
        assert_eq!(id.to_string(), "openai/us-east");
    }

    #[test]
    fn endpoint_identity_ignores_attributes() {
        // Two endpoints with the same (provider, region) are identical even
        // though credentials/base URL would differ in EndpointStatus.
        let a = EndpointId::new("anthropic", "us-west");
        let b = EndpointId::new("anthropic", "us-west");
        assert_eq!(a, b);
    }
}
