//! Anthropic's Messages API: `system` is a top-level field rather than a
//! message with `role: "system"`, content blocks use `type`/`text` instead
//! of the untagged shape, and auth is `x-api-key` + `anthropic-version`
//! rather than a bearer token.

use crate::dialect::Dialect;
use omnigate_core::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, MessageContent, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Default)]
pub struct AnthropicDialect;

impl AnthropicDialect {
    pub fn new() -> Self {
        Self
    }

    fn content_to_text(content: &MessageContent) -> String {
        match content {
            MessageContent::Text(text) => text.clone(),
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
}

impl Dialect for AnthropicDialect {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn chat_path(&self, _model: &str) -> String {
        "/v1/messages".to_string()
    }

    fn build_chat_body(&self, request: &ChatRequest) -> Value {
        let mut system = None;
        let mut messages = Vec::new();
        for message in &request.messages {
            if message.role == "system" {
                system = Some(Self::content_to_text(&message.content));
                continue;
            }
            messages.push(json!({
                "role": message.role,
                "content": Self::content_to_text(&message.content),
            }));
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        body
    }

    fn parse_chat_response(&self, model: &str, body: Value) -> Result<ChatResponse, String> {
        let id = body.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let text = body
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| "anthropic response missing content array".to_string())?;

        let finish_reason = body.get("stop_reason").and_then(Value::as_str).map(|s| s.to_string());

        let usage = body.get("usage").map(|u| {
            let prompt_tokens = u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            let completion_tokens = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            Usage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
        });

        Ok(ChatResponse {
            id,
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage { role: "assistant".to_string(), content: MessageContent::Text(text) },
                finish_reason,
            }],
            usage,
        })
    }

    fn apply_auth(&self, builder: RequestBuilder, api_key: &str) -> RequestBuilder {
        builder.header("x-api-key", api_key).header("anthropic-version", ANTHROPIC_VERSION)
    }
}
