//! OpenAI's own wire shape is the gateway's canonical vocabulary, so this
//! dialect is close to a pass-through; it exists mainly to own the
//! `/chat/completions` path and round-trip through `serde_json::Value`
//! rather than assume the upstream returns exactly the crate's struct
//! shape (extra upstream fields must not break decoding).

use crate::dialect::Dialect;
use omnigate_core::ChatRequest;
use omnigate_core::ChatResponse;

#[derive(Debug, Clone, Default)]
pub struct OpenAiDialect {
    name: &'static str,
}

impl OpenAiDialect {
    pub fn new() -> Self {
        Self { name: "openai" }
    }

    pub fn named(name: &'static str) -> Self {
        Self { name }
    }
}

impl Dialect for OpenAiDialect {
    fn name(&self) -> &str {
        self.name
    }

    fn chat_path(&self, _model: &str) -> String {
        "/v1/chat/completions".to_string()
    }

    fn build_chat_body(&self, request: &ChatRequest) -> serde_json::Value {
        serde_json::to_value(request).unwrap_or(serde_json::Value::Null)
    }

    fn parse_chat_response(&self, _model: &str, body: serde_json::Value) -> Result<ChatResponse, String> {
        serde_json::from_value(body).map_err(|e| format!("decoding OpenAI-shaped response: {e}"))
    }
}

/// Mistral's `/v1/chat/completions` is OpenAI-compatible; distinct type so
/// callers select it by provider name rather than reusing [`OpenAiDialect`]
/// directly.
#[derive(Debug, Clone, Default)]
pub struct MistralDialect(OpenAiDialect);

impl MistralDialect {
    pub fn new() -> Self {
        Self(OpenAiDialect::named("mistral"))
    }
}

impl Dialect for MistralDialect {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn chat_path(&self, model: &str) -> String {
        self.0.chat_path(model)
    }
    fn build_chat_body(&self, request: &ChatRequest) -> serde_json::Value {
        self.0.build_chat_body(request)
    }
    fn parse_chat_response(&self, model: &str, body: serde_json::Value) -> Result<ChatResponse, String> {
        self.0.parse_chat_response(model, body)
    }
}

/// xAI's Grok API is also OpenAI-compatible.
#[derive(Debug, Clone, Default)]
pub struct XaiDialect(OpenAiDialect);

impl XaiDialect {
    pub fn new() -> Self {
        Self(OpenAiDialect::named("xai"))
    }
}

impl Dialect for XaiDialect {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn chat_path(&self, model: &str) -> String {
        self.0.chat_path(model)
    }
    fn build_chat_body(&self, request: &ChatRequest) -> serde_json::Value {
        self.0.build_chat_body(request)
    }
    fn parse_chat_response(&self, model: &str, body: serde_json::Value) -> Result<ChatResponse, String> {
        self.0.parse_chat_response(model, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigate_core::{ChatMessage, MessageContent};

    #[test]
    fn chat_path_is_v1_chat_completions() {
        assert_eq!(OpenAiDialect::new().chat_path("gpt-4"), "/v1/chat/completions");
    }

    #[test]
    fn build_chat_body_round_trips_through_json() {
        let req = ChatRequest {
            model: "gpt-4".into(),
            messages: vec![ChatMessage { role: "user".into(), content: MessageContent::Text("hi".into()) }],
            ..Default::default()
        };
        let body = OpenAiDialect::new().build_chat_body(&req);
        assert_eq!(body["model"], "gpt-4");
    }

    #[test]
    fn parse_chat_response_decodes_valid_body() {
        let body = serde_json::json!({
            "id": "resp-1",
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
        });
        let response = OpenAiDialect::new().parse_chat_response("gpt-4", body).unwrap();
        assert_eq!(response.id, "resp-1");
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.usage.unwrap().total_tokens, 3);
    }

    #[test]
    fn parse_chat_response_rejects_malformed_body() {
        let body = serde_json::json!({"not": "a chat response"});
        assert!(OpenAiDialect::new().parse_chat_response("gpt-4", body).is_err());
    }

    #[test]
    fn mistral_and_xai_reuse_openai_shape_under_their_own_name() {
        assert_eq!(MistralDialect::new().name(), "mistral");
        assert_eq!(XaiDialect::new().name(), "xai");
        assert_eq!(MistralDialect::new().chat_path("m"), "/v1/chat/completions");
    }
}
