//! Google's `generateContent` shape: messages become `contents` with
//! `parts`, the assistant role is named `model` instead of `assistant`, and
//! auth is an API key query parameter rather than a bearer token.

use crate::dialect::Dialect;
use omnigate_core::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, MessageContent, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Value};

#[derive(Debug, Clone, Default)]
pub struct GeminiDialect;

impl GeminiDialect {
    pub fn new() -> Self {
        Self
    }

    fn to_gemini_role(role: &str) -> &str {
        match role {
            "assistant" => "model",
            "system" => "user",
            other => other,
        }
    }

    fn from_gemini_role(role: &str) -> String {
        match role {
            "model" => "assistant".to_string(),
            other => other.to_string(),
        }
    }
}

impl Dialect for GeminiDialect {
    fn name(&self) -> &str {
        "gemini"
    }

    fn chat_path(&self, model: &str) -> String {
        format!("/v1beta/models/{model}:generateContent")
    }

    fn build_chat_body(&self, request: &ChatRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": Self::to_gemini_role(&m.role),
                    "parts": [{"text": text_of(&m.content)}],
                })
            })
            .collect();

        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            generation_config.insert("topP".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }

        let mut body = json!({ "contents": contents });
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }
        body
    }

    fn parse_chat_response(&self, model: &str, body: Value) -> Result<ChatResponse, String> {
        let candidate = body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| "gemini response missing candidates".to_string())?;

        let role = candidate
            .get("content")
            .and_then(|c| c.get("role"))
            .and_then(Value::as_str)
            .unwrap_or("model");
        let text = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish_reason = candidate.get("finishReason").and_then(Value::as_str).map(|s| s.to_lowercase());

        let usage = body.get("usageMetadata").map(|u| {
            let prompt_tokens = u.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
            let total_tokens = u.get("totalTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
            Usage {
                prompt_tokens,
                completion_tokens: total_tokens.saturating_sub(prompt_tokens),
                total_tokens,
            }
        });

        Ok(ChatResponse {
            id: String::new(),
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: Self::from_gemini_role(role),
                    content: MessageContent::Text(text),
                },
                finish_reason,
            }],
            usage,
        })
    }

    fn apply_auth(&self, builder: RequestBuilder, api_key: &str) -> RequestBuilder {
        builder.query(&[("key", api_key)])
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
