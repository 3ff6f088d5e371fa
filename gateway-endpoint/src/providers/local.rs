//! Local inference servers (Ollama-compatible `/api/chat`): no bearer auth
//! by default, and a `done`/`message` shape instead of a `choices` array.

use crate::dialect::Dialect;
use omnigate_core::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, MessageContent, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Value};

#[derive(Debug, Clone, Default)]
pub struct LocalDialect;

impl LocalDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for LocalDialect {
    fn name(&self) -> &str {
        "local"
    }

    fn chat_path(&self, _model: &str) -> String {
        "/api/chat".to_string()
    }

    fn build_chat_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role,
                    "content": text_of(&m.content),
                })
            })
            .collect();

        json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "top_p": request.top_p,
            }
        })
    }

    fn parse_chat_response(&self, model: &str, body: Value) -> Result<ChatResponse, String> {
        let message = body.get("message").ok_or_else(|| "local response missing message".to_string())?;
        let role = message.get("role").and_then(Value::as_str).unwrap_or("assistant").to_string();
        let content = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();

        let usage = if body.get("prompt_eval_count").is_some() || body.get("eval_count").is_some() {
            let prompt_tokens = body.get("prompt_eval_count").and_then(Value::as_u64).unwrap_or(0) as u32;
            let completion_tokens = body.get("eval_count").and_then(Value::as_u64).unwrap_or(0) as u32;
            Some(Usage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens })
        } else {
            None
        };

        Ok(ChatResponse {
            id: String::new(),
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage { role, content: MessageContent::Text(content) },
                finish_reason: body.get("done").and_then(Value::as_bool).map(|_| "stop".to_string()),
            }],
            usage,
        })
    }

    /// Local servers rarely require auth; only attach a header if the
    /// caller configured a non-empty token.
    fn apply_auth(&self, builder: RequestBuilder, api_key: &str) -> RequestBuilder {
        if api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(api_key)
        }
    }
}

fn text_of(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(t) => t.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                omnigate_core::ContentPart::Text { text } => Some(text.clone()),
                omnigate_core::ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(""),
    }
}
