//! Admin surface (spec §4.H, §6): read-only introspection plus the two
//! mutations the router exposes — config patching and a forced breaker
//! reset. Every handler funnels through `Router`/`EndpointMetrics`'s own
//! public API, so it respects the same locks as the request-handling path.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use omnigate_core::{RoutingConfig, RoutingConfigPatch, Strategy};
use omnigate_metrics::MetricsSnapshot;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

fn not_found(message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": { "message": message.into(), "type": "not_found" } });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// `StrategyChange` carries a raw `std::time::Instant`, which has no
/// meaningful JSON form; the admin view drops it and keeps only what a
/// client can act on.
#[derive(Serialize)]
pub struct StrategyChangeView {
    from: Strategy,
    to: Strategy,
    reason: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    config: RoutingConfig,
    adaptive_strategy: Strategy,
    adaptive_history: Vec<StrategyChangeView>,
    registered_endpoints: Vec<String>,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let (adaptive_strategy, adaptive_history) = state.router.adaptive_snapshot();
    let adaptive_history = adaptive_history
        .into_iter()
        .map(|c| StrategyChangeView { from: c.from, to: c.to, reason: c.reason })
        .collect();
    Json(StatsResponse {
        config: state.router.config(),
        adaptive_strategy,
        adaptive_history,
        registered_endpoints: state.router.keys(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    strategy: Strategy,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", strategy: state.router.config().strategy })
}

pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<RoutingConfigPatch>,
) -> Json<RoutingConfig> {
    state.router.patch_config(patch);
    Json(state.router.config())
}

#[derive(Serialize)]
pub struct EndpointMetricsView {
    #[serde(flatten)]
    metrics: MetricsSnapshot,
    last_ping_latency_ms: Option<f64>,
}

pub async fn endpoint_metrics(
    State(state): State<Arc<AppState>>,
    Path((provider, region)): Path<(String, String)>,
) -> Response {
    let key = format!("{provider}/{region}");
    match state.router.get(&key) {
        Some(status) => {
            let view = EndpointMetricsView {
                metrics: status.metrics.snapshot(),
                last_ping_latency_ms: status.last_ping_latency().map(|d| d.as_secs_f64() * 1000.0),
            };
            Json(view).into_response()
        }
        None => not_found(format!("no endpoint registered for {key}")),
    }
}

#[derive(Serialize)]
pub struct CircuitBreakerView {
    breaker_state: omnigate_metrics::BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    seconds_since_last_failure: Option<f64>,
}

impl From<MetricsSnapshot> for CircuitBreakerView {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            breaker_state: snapshot.breaker_state,
            consecutive_failures: snapshot.consecutive_failures,
            consecutive_successes: snapshot.consecutive_successes,
            seconds_since_last_failure: snapshot.seconds_since_last_failure,
        }
    }
}

pub async fn circuit_breaker(
    State(state): State<Arc<AppState>>,
    Path((provider, region)): Path<(String, String)>,
) -> Response {
    let key = format!("{provider}/{region}");
    match state.router.get(&key) {
        Some(status) => Json(CircuitBreakerView::from(status.metrics.snapshot())).into_response(),
        None => not_found(format!("no endpoint registered for {key}")),
    }
}

pub async fn reset_circuit_breaker(
    State(state): State<Arc<AppState>>,
    Path((provider, region)): Path<(String, String)>,
) -> Response {
    let key = format!("{provider}/{region}");
    match state.router.get(&key) {
        Some(status) => {
            status.metrics.reset_breaker();
            tracing::info!(endpoint = %key, "circuit breaker reset via admin surface");
            Json(CircuitBreakerView::from(status.metrics.snapshot())).into_response()
        }
        None => not_found(format!("no endpoint registered for {key}")),
    }
}
