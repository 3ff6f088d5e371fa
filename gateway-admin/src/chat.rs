//! Minimal OpenAI-shaped client surface (spec §6 SUPPLEMENT): enough of
//! `POST /v1/chat/completions` and `GET /v1/models` to drive the full
//! cache → router → state-store → adapter → record → cache-store pipeline
//! end-to-end in tests, without reimplementing provider wire formats.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use omnigate_core::ChatRequest;
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

const TENANT_HEADER: &str = "x-tenant-id";
const DEFAULT_TENANT: &str = "default";

fn tenant_id(headers: &HeaderMap) -> String {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_TENANT.to_string())
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<omnigate_core::ChatResponse>, ApiError> {
    let tenant = tenant_id(&headers);
    let response = state.gateway.chat_completion(&tenant, &request).await?;
    Ok(Json(response))
}

#[derive(Serialize)]
pub struct ModelEntry {
    id: String,
    object: &'static str,
    owned_by: String,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    object: &'static str,
    data: Vec<ModelEntry>,
}

/// Lists the registered endpoint keys as OpenAI-shaped model entries —
/// there is no separate model registry, so `provider/region` doubles as
/// the model id's owner here.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let data = state
        .router
        .keys()
        .into_iter()
        .map(|key| {
            let owned_by = key.split('/').next().unwrap_or(&key).to_string();
            ModelEntry { id: key, object: "model", owned_by }
        })
        .collect();
    Json(ModelsResponse { object: "list", data })
}
