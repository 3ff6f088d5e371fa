//! Per-provider translation between the gateway's OpenAI-shaped vocabulary
//! and a provider's own wire dialect (spec §4.C: "JSON field renames,
//! content-part flattening for text-only providers, tool/function-call
//! shape conversion").

use omnigate_core::{ChatRequest, ChatResponse};
use reqwest::RequestBuilder;

/// One provider's request/response shape plus its auth convention. Kept as
/// small, composable objects rather than one deep adapter hierarchy (spec
/// §9: "avoid deep inheritance; prefer composition of small translator
/// objects").
pub trait Dialect: Send + Sync {
    fn name(&self) -> &str;

    /// Path appended to the endpoint's base URL for a chat completion call.
    fn chat_path(&self, model: &str) -> String;

    /// Build the provider-shaped request body from the gateway's
    /// OpenAI-shaped [`ChatRequest`].
    fn build_chat_body(&self, request: &ChatRequest) -> serde_json::Value;

    /// Parse the provider's response body back into the gateway's
    /// OpenAI-shaped [`ChatResponse`]. `Err` carries a human-readable
    /// description; the caller (which knows the endpoint's region) wraps it
    /// into a [`omnigate_core::GatewayError::UpstreamProtocol`].
    fn parse_chat_response(&self, model: &str, body: serde_json::Value) -> Result<ChatResponse, String>;

    /// Attach this provider's bearer/header convention to the request.
    fn apply_auth(&self, builder: RequestBuilder, api_key: &str) -> RequestBuilder {
        builder.bearer_auth(api_key)
    }
}
