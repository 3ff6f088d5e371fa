//! Capability-typed endpoint adapters (spec §4.C). Each adapter is a handle
//! to one upstream (provider + region + base URL + credential) that
//! translates OpenAI-shaped requests into the provider's dialect and
//! inverts the response. Unsupported capabilities return
//! [`omnigate_core::GatewayError::Unsupported`] rather than panicking —
//! union-interface-with-default-unsupported, not deep inheritance (spec §9).

pub mod dialect;
pub mod http;
pub mod providers;
pub mod types;

pub use dialect::Dialect;
pub use http::{HttpEndpoint, HttpEndpointConfig};
pub use types::{
    ChatStreamChunk, ChatStreamDelta, EmbeddingRequest, EmbeddingResponse, EmbeddingVector,
    ImageGenerationRequest, ImageGenerationResponse, ImageResult,
};

use async_trait::async_trait;
use futures::stream::BoxStream;
use omnigate_core::{ChatRequest, ChatResponse, GatewayError, Result};
use std::time::Duration;

pub type ChatStream = BoxStream<'static, Result<ChatStreamChunk>>;

/// The union capability interface every endpoint adapter implements.
/// Default methods return [`GatewayError::Unsupported`]; concrete adapters
/// override only what their provider actually backs.
#[async_trait]
pub trait Endpoint: Send + Sync {
    fn provider(&self) -> &str;
    fn region(&self) -> &str;

    fn key(&self) -> String {
        format!("{}/{}", self.provider(), self.region())
    }

    /// Measures round-trip latency to the upstream without issuing a real
    /// generation request.
    async fn ping(&self) -> Result<Duration>;

    async fn shutdown(&self) {}

    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
        Err(self.unsupported("chat"))
    }

    /// Streaming chat. Adapters without native SSE support may synthesize a
    /// three-chunk stream (role → content → final-with-usage) from the
    /// non-streaming call; this is explicitly permitted (spec §9).
    async fn chat_stream(&self, _request: &ChatRequest) -> Result<ChatStream> {
        Err(self.unsupported("chat_stream"))
    }

    async fn embedding(&self, _request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        Err(self.unsupported("embedding"))
    }

    async fn image(&self, _request: &ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        Err(self.unsupported("image"))
    }

    async fn transcribe_audio(&self, _audio: &[u8], _mime: &str) -> Result<String> {
        Err(self.unsupported("transcribe_audio"))
    }

    async fn translate_audio(&self, _audio: &[u8], _mime: &str) -> Result<String> {
        Err(self.unsupported("translate_audio"))
    }

    async fn speech(&self, _text: &str, _voice: &str) -> Result<Vec<u8>> {
        Err(self.unsupported("speech"))
    }

    async fn moderation(&self, _input: &str) -> Result<bool> {
        Err(self.unsupported("moderation"))
    }

    async fn fine_tuning(&self, _training_file: &str) -> Result<String> {
        Err(self.unsupported("fine_tuning"))
    }

    fn unsupported(&self, capability: &str) -> GatewayError {
        GatewayError::unsupported(self.provider(), capability)
    }
}

/// Synthesize a three-chunk stream (role, content, final-with-usage) from a
/// completed non-streaming response. Shared by every adapter that lacks
/// native SSE support.
pub fn synthesize_stream(response: ChatResponse) -> ChatStream {
    use futures::stream;

    let role_chunk = ChatStreamChunk {
        id: response.id.clone(),
        model: response.model.clone(),
        delta: ChatStreamDelta { role: Some("assistant".to_string()), content: None },
        finish_reason: None,
        usage: None,
    };

    let content = response.choices.first().and_then(|c| match &c.message.content {
        omnigate_core::MessageContent::Text(t) => Some(t.clone()),
        omnigate_core::MessageContent::Parts(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| match p {
                    omnigate_core::ContentPart::Text { text } => Some(text.clone()),
                    omnigate_core::ContentPart::ImageUrl { .. } => None,
                })
                .collect();
            Some(joined)
        }
    });

    let content_chunk = ChatStreamChunk {
        id: response.id.clone(),
        model: response.model.clone(),
        delta: ChatStreamDelta { role: None, content },
        finish_reason: None,
        usage: None,
    };

    let finish_reason = response.choices.first().and_then(|c| c.finish_reason.clone());
    let final_chunk = ChatStreamChunk {
        id: response.id.clone(),
        model: response.model.clone(),
        delta: ChatStreamDelta { role: None, content: None },
        finish_reason,
        usage: response.usage.clone(),
    };

    Box::pin(stream::iter(vec![Ok(role_chunk), Ok(content_chunk), Ok(final_chunk)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use omnigate_core::{ChatChoice, ChatMessage, MessageContent, Usage};

    struct StubEndpoint;

    #[async_trait]
    impl Endpoint for StubEndpoint {
        fn provider(&self) -> &str {
            "stub"
        }
        fn region(&self) -> &str {
            "local"
        }
        async fn ping(&self) -> Result<Duration> {
            Ok(Duration::from_millis(1))
        }
    }

    #[tokio::test]
    async fn default_chat_returns_unsupported() {
        let endpoint = StubEndpoint;
        let req = ChatRequest::default();
        let err = endpoint.chat(&req).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unsupported { .. }));
        assert!(!err.counts_as_breaker_failure());
    }

    #[test]
    fn key_combines_provider_and_region() {
        assert_eq!(StubEndpoint.key(), "stub/local");
    }

    #[tokio::test]
    async fn synthesize_stream_yields_role_then_content_then_final() {
        let response = ChatResponse {
            id: "resp-1".into(),
            model: "gpt-4".into(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".into(),
                    content: MessageContent::Text("hello".into()),
                },
                finish_reason: Some("stop".into()),
            }],
            usage: Some(Usage { prompt_tokens: 5, completion_tokens: 1, total_tokens: 6 }),
        };

        let mut stream = synthesize_stream(response);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta.role.as_deref(), Some("assistant"));

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.delta.content.as_deref(), Some("hello"));

        let third = stream.next().await.unwrap().unwrap();
        assert_eq!(third.finish_reason.as_deref(), Some("stop"));
        assert!(third.usage.is_some());

        assert!(stream.next().await.is_none());
    }
}
