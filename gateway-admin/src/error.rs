//! Client-facing error envelope. The admin and chat-completions routes both
//! return `GatewayError` through this wrapper so every failure path gets
//! the same exact OpenAI shape (spec §6: "Responses use exact OpenAI field
//! names and types") rather than the teacher's RFC 7807 `ApiError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use omnigate_core::GatewayError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    type_: &'static str,
    param: Option<String>,
    code: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.0.to_string(),
                type_: self.0.openai_error_type(),
                param: None,
                code: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
