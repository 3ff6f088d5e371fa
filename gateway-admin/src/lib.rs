//! The HTTP admin surface (spec §4.H, §6): read-only introspection and
//! config-patching routes over the router, plus a minimal OpenAI-shaped
//! client surface that exercises the orchestrator end-to-end. Owns no
//! listener itself — `omnigate-cli` binds the `axum::Router` this module
//! builds to a TCP socket.

pub mod chat;
pub mod error;
pub mod routing;

pub use error::ApiError;

use axum::http::{header, Method};
use axum::routing::{get, patch, post};
use axum::Router as AxumRouter;
use omnigate_orchestrator::Gateway;
use omnigate_router::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub router: Arc<Router>,
    pub gateway: Arc<Gateway>,
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Builds the full admin + client-surface router. `omnigate-cli` supplies
/// the `AppState` and calls `axum::serve` on the result.
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    let routing_routes = AxumRouter::new()
        .route("/stats", get(routing::stats))
        .route("/health", get(routing::health))
        .route("/config", patch(routing::patch_config))
        .route("/endpoints/{provider}/{region}", get(routing::endpoint_metrics))
        .route("/circuit-breakers/{provider}/{region}", get(routing::circuit_breaker))
        .route("/circuit-breakers/{provider}/{region}/reset", post(routing::reset_circuit_breaker));

    let client_routes = AxumRouter::new()
        .route("/chat/completions", post(chat::chat_completions))
        .route("/models", get(chat::list_models));

    AxumRouter::new()
        .nest("/v1/routing", routing_routes)
        .nest("/v1", client_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}
