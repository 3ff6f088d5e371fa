//! The adaptive meta-strategy controller (spec §4.E, §3 `AdaptiveState`).
//! When the configured strategy is `adaptive`, the router delegates each
//! decision's actual strategy to this state machine, which re-evaluates
//! fleet-wide averages no more than once per `evaluation_interval` and only
//! once enough samples have accumulated (testable property 6).

use omnigate_core::{AdaptiveConfig, Clock, Strategy};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct StrategyChange {
    pub at: Instant,
    pub from: Strategy,
    pub to: Strategy,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FleetSnapshot {
    pub avg_cost: f64,
    pub avg_latency_ms: f64,
    pub avg_load: f64,
}

pub struct AdaptiveState {
    clock: Arc<dyn Clock>,
    active_strategy: Strategy,
    last_evaluation: Instant,
    sample_count: u32,
    history: Vec<StrategyChange>,
    history_cap: usize,
}

impl AdaptiveState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            active_strategy: Strategy::Latency,
            last_evaluation: now,
            sample_count: 0,
            history: Vec::new(),
            history_cap: 64,
        }
    }

    pub fn active_strategy(&self) -> Strategy {
        self.active_strategy
    }

    pub fn history(&self) -> &[StrategyChange] {
        &self.history
    }

    /// Call once per routing decision made while `adaptive` is configured.
    /// Returns the strategy to use for *this* decision.
    pub fn tick(&mut self, config: &AdaptiveConfig, fleet: FleetSnapshot) -> Strategy {
        self.sample_count += 1;
        let now = self.clock.now();
        let due = now.duration_since(self.last_evaluation) >= config.evaluation_interval;
        if due && self.sample_count >= config.min_samples {
            let (next, reason) = Self::decide(config, &fleet);
            if next != self.active_strategy {
                self.push_change(now, next, reason);
                self.active_strategy = next;
            }
            self.last_evaluation = now;
            self.sample_count = 0;
        }
        self.active_strategy
    }

    fn decide(config: &AdaptiveConfig, fleet: &FleetSnapshot) -> (Strategy, &'static str) {
        if fleet.avg_cost > config.cost_threshold {
            (Strategy::Cost, "average cost above threshold")
        } else if fleet.avg_latency_ms > config.latency_threshold_ms {
            (Strategy::Latency, "average latency above threshold")
        } else if fleet.avg_load > config.load_threshold {
            (Strategy::LeastConnections, "average load above threshold")
        } else {
            (Strategy::PerformanceBased, "fleet within all thresholds")
        }
    }

    fn push_change(&mut self, at: Instant, to: Strategy, reason: &'static str) {
        tracing::info!(from = ?self.active_strategy, to = ?to, reason, "adaptive strategy change");
        self.history.push(StrategyChange { at, from: self.active_strategy, to, reason: reason.to_string() });
        if self.history.len() > self.history_cap {
            self.history.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigate_core::MockClock;
    use std::time::Duration;

    fn config() -> AdaptiveConfig {
        AdaptiveConfig {
            evaluation_interval: Duration::from_secs(60),
            min_samples: 5,
            cost_threshold: 0.01,
            latency_threshold_ms: 2000.0,
            load_threshold: 50.0,
        }
    }

    #[test]
    fn starts_on_latency() {
        let state = AdaptiveState::new(Arc::new(MockClock::new()));
        assert_eq!(state.active_strategy(), Strategy::Latency);
    }

    #[test]
    fn does_not_evaluate_before_interval_elapses() {
        let clock = Arc::new(MockClock::new());
        let mut state = AdaptiveState::new(clock.clone());
        let cfg = config();
        for _ in 0..10 {
            state.tick(&cfg, FleetSnapshot { avg_cost: 1.0, ..Default::default() });
        }
        // Interval has not elapsed yet, regardless of sample count.
        assert_eq!(state.active_strategy(), Strategy::Latency);
    }

    #[test]
    fn does_not_evaluate_before_min_samples_reached() {
        let clock = Arc::new(MockClock::new());
        let mut state = AdaptiveState::new(clock.clone());
        let cfg = config();
        clock.advance(Duration::from_secs(61));
        state.tick(&cfg, FleetSnapshot { avg_cost: 1.0, ..Default::default() });
        assert_eq!(state.active_strategy(), Strategy::Latency);
    }

    #[test]
    fn switches_to_cost_when_fleet_cost_above_threshold() {
        let clock = Arc::new(MockClock::new());
        let mut state = AdaptiveState::new(clock.clone());
        let cfg = config();
        clock.advance(Duration::from_secs(61));
        let mut strategy = Strategy::Latency;
        for _ in 0..5 {
            strategy = state.tick(&cfg, FleetSnapshot { avg_cost: 1.0, ..Default::default() });
        }
        assert_eq!(strategy, Strategy::Cost);
        assert_eq!(state.history().len(), 1);
    }

    // Testable property 6: strategy never changes more than once per
    // evaluation_interval.
    #[test]
    fn does_not_re_evaluate_within_the_same_interval() {
        let clock = Arc::new(MockClock::new());
        let mut state = AdaptiveState::new(clock.clone());
        let cfg = config();
        clock.advance(Duration::from_secs(61));
        for _ in 0..5 {
            state.tick(&cfg, FleetSnapshot { avg_cost: 1.0, ..Default::default() });
        }
        assert_eq!(state.active_strategy(), Strategy::Cost);

        // Fleet conditions now call for performance-based, but the interval
        // hasn't elapsed again yet.
        for _ in 0..10 {
            state.tick(&cfg, FleetSnapshot::default());
        }
        assert_eq!(state.active_strategy(), Strategy::Cost);
        assert_eq!(state.history().len(), 1);
    }
}
