//! A minimal, OpenAI-shaped request/response vocabulary shared by the
//! router (cost estimation), the cache layer (fingerprinting), and the
//! endpoint adapters (translation). Full wire-format fidelity (every OpenAI
//! field) is out of scope per spec §1 — this is the subset the routing
//! fabric itself needs to reason about.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Total byte length of all text content, used by the cost estimator's
    /// token approximation (spec §4.E: `bytes / 4`).
    pub fn text_byte_len(&self) -> usize {
        match self {
            MessageContent::Text(s) => s.len(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.len(),
                    ContentPart::ImageUrl { .. } => 0,
                })
                .sum(),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => {
                parts.iter().filter(|p| matches!(p, ContentPart::ImageUrl { .. })).count()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    #[serde(default)]
    pub stream: bool,
}

impl Default for ChatMessage {
    fn default() -> Self {
        Self { role: String::new(), content: MessageContent::Text(String::new()) }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_byte_len_counts_plain_string() {
        let content = MessageContent::Text("hello".to_string());
        assert_eq!(content.text_byte_len(), 5);
        assert_eq!(content.image_count(), 0);
    }

    #[test]
    fn text_byte_len_sums_text_parts_and_ignores_images() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "ab".to_string() },
            ContentPart::ImageUrl { image_url: ImageUrl { url: "http://x/y.png".to_string() } },
            ContentPart::Text { text: "cde".to_string() },
        ]);
        assert_eq!(content.text_byte_len(), 5);
        assert_eq!(content.image_count(), 1);
    }
}
