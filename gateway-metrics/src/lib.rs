//! Per-endpoint metrics and the three-state circuit breaker (spec §4.D):
//! lifetime counters, long-run and short-window EWMA, and the
//! closed/open/half-open state machine with its lazy timeout check.

pub mod breaker;
pub mod metrics;
pub mod registry;

pub use breaker::BreakerState;
pub use metrics::{EndpointMetrics, MetricsSnapshot};
pub use registry::MetricsRegistry;
