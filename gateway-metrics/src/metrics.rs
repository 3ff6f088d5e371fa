//! Per-endpoint statistics record (spec §3, §4.D): lifetime counters, a
//! long-run and a short (≈5 min, rolling) EWMA window, and the breaker
//! state machine. Outer counters are atomics; everything the breaker
//! touches lives behind one inner lock, matching the two-level locking
//! policy of spec §5 (outer table lock lives in the router; this is the
//! per-entry inner lock).

use crate::breaker::BreakerState;
use omnigate_core::{CircuitBreakerConfig, Clock};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SHORT_WINDOW: Duration = Duration::from_secs(5 * 60);
const LONG_RUN_COEFFICIENT: f64 = 0.1;
const SHORT_WINDOW_COEFFICIENT: f64 = 0.2;

struct Inner {
    long_run_latency_ms: f64,
    long_run_cost: f64,
    has_long_run_sample: bool,
    short_window_latency_ms: f64,
    short_window_cost: f64,
    short_window_success_rate: f64,
    short_window_updated_at: Option<Instant>,
    state: BreakerState,
    last_failure: Option<Instant>,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            long_run_latency_ms: 0.0,
            long_run_cost: 0.0,
            has_long_run_sample: false,
            short_window_latency_ms: 0.0,
            short_window_cost: 0.0,
            short_window_success_rate: 1.0,
            short_window_updated_at: None,
            state: BreakerState::Closed,
            last_failure: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }
}

/// A point-in-time view suitable for the admin surface (spec §6
/// `/endpoints/{provider}/{region}`, `/circuit-breakers/{provider}/{region}`).
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub active: i64,
    pub long_run_latency_ms: f64,
    pub long_run_cost: f64,
    pub short_window_latency_ms: f64,
    pub short_window_cost: f64,
    pub short_window_success_rate: f64,
    pub breaker_state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub seconds_since_last_failure: Option<f64>,
}

pub struct EndpointMetrics {
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    active: AtomicI64,
    inner: RwLock<Inner>,
}

impl EndpointMetrics {
    pub fn new(clock: Arc<dyn Clock>, config: CircuitBreakerConfig) -> Self {
        Self {
            clock,
            config,
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            active: AtomicI64::new(0),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Increment the active-connection gauge on selection.
    pub fn incr_active(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the active-connection gauge on completion, clamped at zero
    /// (spec §3 invariant, exercised on both normal completion and
    /// cancellation per §5).
    pub fn decr_active(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some((v - 1).max(0)));
    }

    pub fn active_connections(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Record one request outcome: lifetime counters, both EWMA windows,
    /// and the breaker state machine (spec §4.D).
    pub fn record(&self, latency: Duration, cost: f64, success: bool) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if success {
            self.successful.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        let now = self.clock.now();
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let mut inner = self.inner.write();

        if inner.has_long_run_sample {
            inner.long_run_latency_ms =
                (1.0 - LONG_RUN_COEFFICIENT) * inner.long_run_latency_ms + LONG_RUN_COEFFICIENT * latency_ms;
            inner.long_run_cost =
                (1.0 - LONG_RUN_COEFFICIENT) * inner.long_run_cost + LONG_RUN_COEFFICIENT * cost;
        } else {
            inner.long_run_latency_ms = latency_ms;
            inner.long_run_cost = cost;
            inner.has_long_run_sample = true;
        }

        let success_sample = if success { 1.0 } else { 0.0 };
        let rolls = match inner.short_window_updated_at {
            Some(last) => now.duration_since(last) > SHORT_WINDOW,
            None => true,
        };
        if rolls {
            inner.short_window_latency_ms = latency_ms;
            inner.short_window_cost = cost;
            inner.short_window_success_rate = success_sample;
        } else {
            inner.short_window_latency_ms = (1.0 - SHORT_WINDOW_COEFFICIENT) * inner.short_window_latency_ms
                + SHORT_WINDOW_COEFFICIENT * latency_ms;
            inner.short_window_cost =
                (1.0 - SHORT_WINDOW_COEFFICIENT) * inner.short_window_cost + SHORT_WINDOW_COEFFICIENT * cost;
            inner.short_window_success_rate = (1.0 - SHORT_WINDOW_COEFFICIENT) * inner.short_window_success_rate
                + SHORT_WINDOW_COEFFICIENT * success_sample;
        }
        inner.short_window_updated_at = Some(now);

        if success {
            inner.consecutive_successes += 1;
            inner.consecutive_failures = 0;
            if inner.state == BreakerState::HalfOpen
                && inner.consecutive_successes >= self.config.success_threshold
            {
                tracing::info!("breaker closing after {} consecutive successes", inner.consecutive_successes);
                inner.state = BreakerState::Closed;
            }
        } else {
            inner.consecutive_failures += 1;
            inner.consecutive_successes = 0;
            inner.last_failure = Some(now);
            match inner.state {
                BreakerState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                    tracing::warn!("breaker opening after {} consecutive failures", inner.consecutive_failures);
                    inner.state = BreakerState::Open;
                }
                BreakerState::HalfOpen => {
                    tracing::warn!("breaker reopening after a failure while half-open");
                    inner.state = BreakerState::Open;
                }
                _ => {}
            }
        }
    }

    /// Whether this endpoint is a routing candidate right now. Performs the
    /// lazy Open→HalfOpen transition when `breaker_timeout` has elapsed.
    pub fn is_available(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner.last_failure.map(|lf| now.duration_since(lf));
                if elapsed.is_none_or(|e| e >= self.config.breaker_timeout) {
                    tracing::info!("breaker entering half-open after timeout");
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.inner.read().state
    }

    /// Admin-forced reset: breaker → Closed, both consecutive counters
    /// cleared. Lifetime counters are untouched (spec §6).
    pub fn reset_breaker(&self) {
        let mut inner = self.inner.write();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.read().consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.inner.read().consecutive_successes
    }

    pub fn long_run_latency_ms(&self) -> f64 {
        self.inner.read().long_run_latency_ms
    }

    pub fn short_window_success_rate(&self) -> f64 {
        self.inner.read().short_window_success_rate
    }

    pub fn short_window_latency_ms(&self) -> f64 {
        self.inner.read().short_window_latency_ms
    }

    pub fn long_run_cost(&self) -> f64 {
        self.inner.read().long_run_cost
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = self.clock.now();
        let inner = self.inner.read();
        MetricsSnapshot {
            total: self.total(),
            successful: self.successful(),
            failed: self.failed(),
            active: self.active_connections(),
            long_run_latency_ms: inner.long_run_latency_ms,
            long_run_cost: inner.long_run_cost,
            short_window_latency_ms: inner.short_window_latency_ms,
            short_window_cost: inner.short_window_cost,
            short_window_success_rate: inner.short_window_success_rate,
            breaker_state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            seconds_since_last_failure: inner.last_failure.map(|lf| now.duration_since(lf).as_secs_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigate_core::MockClock;

    fn metrics() -> (Arc<EndpointMetrics>, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let config = CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            breaker_timeout: Duration::from_secs(1),
        };
        (Arc::new(EndpointMetrics::new(clock.clone(), config)), clock)
    }

    #[test]
    fn first_sample_sets_long_run_average_directly() {
        let (m, _clock) = metrics();
        m.record(Duration::from_millis(200), 0.01, true);
        assert_eq!(m.long_run_latency_ms(), 200.0);
    }

    #[test]
    fn long_run_average_uses_ewma_after_first_sample() {
        let (m, _clock) = metrics();
        m.record(Duration::from_millis(100), 0.0, true);
        m.record(Duration::from_millis(200), 0.0, true);
        // 0.9*100 + 0.1*200 = 110
        assert!((m.long_run_latency_ms() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn short_window_rolls_after_five_minutes() {
        let (m, clock) = metrics();
        m.record(Duration::from_millis(100), 0.0, true);
        clock.advance(Duration::from_secs(6 * 60));
        m.record(Duration::from_millis(500), 0.0, true);
        assert_eq!(m.short_window_latency_ms(), 500.0);
    }

    // Scenario S4.
    #[test]
    fn breaker_opens_after_threshold_and_recovers_through_half_open() {
        let (m, clock) = metrics();
        for _ in 0..4 {
            m.record(Duration::from_millis(10), 0.0, false);
        }
        assert_eq!(m.breaker_state(), BreakerState::Open);
        assert!(!m.is_available());

        clock.advance(Duration::from_millis(1100));
        assert!(m.is_available());
        assert_eq!(m.breaker_state(), BreakerState::HalfOpen);

        m.record(Duration::from_millis(10), 0.0, true);
        assert_eq!(m.breaker_state(), BreakerState::HalfOpen);
        m.record(Duration::from_millis(10), 0.0, true);
        assert_eq!(m.breaker_state(), BreakerState::Closed);

        // Lifetime failure counter persists through recovery.
        assert_eq!(m.failed(), 4);
    }

    #[test]
    fn single_failure_in_half_open_reopens_breaker() {
        let (m, clock) = metrics();
        for _ in 0..3 {
            m.record(Duration::from_millis(10), 0.0, false);
        }
        clock.advance(Duration::from_secs(2));
        assert!(m.is_available());
        assert_eq!(m.breaker_state(), BreakerState::HalfOpen);

        m.record(Duration::from_millis(10), 0.0, false);
        assert_eq!(m.breaker_state(), BreakerState::Open);
    }

    #[test]
    fn active_connections_never_go_negative() {
        let (m, _clock) = metrics();
        m.decr_active();
        m.decr_active();
        assert_eq!(m.active_connections(), 0);
        m.incr_active();
        assert_eq!(m.active_connections(), 1);
        m.decr_active();
        assert_eq!(m.active_connections(), 0);
    }

    #[test]
    fn admin_reset_clears_breaker_but_not_lifetime_counters() {
        let (m, _clock) = metrics();
        for _ in 0..3 {
            m.record(Duration::from_millis(10), 0.0, false);
        }
        assert_eq!(m.breaker_state(), BreakerState::Open);
        m.reset_breaker();
        assert_eq!(m.breaker_state(), BreakerState::Closed);
        assert_eq!(m.consecutive_failures(), 0);
        assert_eq!(m.total(), 3);
        assert_eq!(m.failed(), 3);
    }
}
