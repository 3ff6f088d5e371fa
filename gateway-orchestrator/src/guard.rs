//! RAII active-connection guard (spec §4.I, §5): increments on creation,
//! decrements on drop — including when the future that holds it is
//! cancelled before completion, which is the one case a plain
//! increment/decrement pair around an `.await` can't cover. Grounded on
//! `harborgrid-justin-caddy`'s `PooledConnection`, whose `Drop` releases
//! its pool slot the same way.

use omnigate_metrics::EndpointMetrics;
use std::sync::Arc;

pub struct ActiveGuard {
    metrics: Arc<EndpointMetrics>,
}

impl ActiveGuard {
    pub fn enter(metrics: Arc<EndpointMetrics>) -> Self {
        metrics.incr_active();
        Self { metrics }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.metrics.decr_active();
    }
}
