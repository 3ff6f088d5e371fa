//! A registered upstream: the adapter handle plus its metrics record
//! (spec §3 `EndpointStatus`). Exclusive to the router's endpoint table;
//! created at registration, destroyed only at shutdown.

use omnigate_endpoint::Endpoint;
use omnigate_metrics::EndpointMetrics;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Optional rate-cap metadata for an endpoint's backing model, surfaced by
/// the admin stats snapshot (spec §3: "optional model-capability
/// descriptor (rate caps)"). Nothing currently populates this from
/// provider-advertised limits; it is set at registration when known.
#[derive(Debug, Clone, Default)]
pub struct CapabilityDescriptor {
    pub requests_per_minute: Option<u32>,
    pub tokens_per_minute: Option<u32>,
}

#[derive(Clone)]
pub struct EndpointStatus {
    pub endpoint: Arc<dyn Endpoint>,
    pub metrics: Arc<EndpointMetrics>,
    pub capabilities: Option<CapabilityDescriptor>,
    last_ping: Arc<RwLock<Option<Duration>>>,
}

impl EndpointStatus {
    pub fn new(endpoint: Arc<dyn Endpoint>, metrics: Arc<EndpointMetrics>) -> Self {
        Self { endpoint, metrics, capabilities: None, last_ping: Arc::new(RwLock::new(None)) }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityDescriptor) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn key(&self) -> String {
        self.endpoint.key()
    }

    /// Whether this endpoint should appear in a candidate list right now —
    /// delegates the lazy Open→HalfOpen transition to the metrics record
    /// (spec §4.D).
    pub fn is_available(&self) -> bool {
        self.metrics.is_available()
    }

    /// Last latency measured by a `Ping` health check, as opposed to the
    /// metrics record's EWMA over real traffic. `None` until the first
    /// successful ping.
    pub fn last_ping_latency(&self) -> Option<Duration> {
        *self.last_ping.read().unwrap()
    }

    /// Records the outcome of a `Ping` health check (called by
    /// `Router::refresh_ping`). Not fed into the breaker or EWMA — pings
    /// measure reachability, not serving latency.
    pub fn record_ping(&self, latency: Duration) {
        *self.last_ping.write().unwrap() = Some(latency);
    }

    /// Recent (short-window) request success rate, delegated to the
    /// metrics record.
    pub fn recent_success_rate(&self) -> f64 {
        self.metrics.short_window_success_rate()
    }

    /// Recent (short-window) request error rate, the complement of
    /// [`Self::recent_success_rate`].
    pub fn recent_error_rate(&self) -> f64 {
        1.0 - self.recent_success_rate()
    }

    /// Seconds since the last recorded failure, or `None` if there has
    /// never been one.
    pub fn seconds_since_last_failure(&self) -> Option<f64> {
        self.metrics.snapshot().seconds_since_last_failure
    }
}
