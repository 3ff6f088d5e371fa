//! Routing configuration shared between the router and the admin surface.
//! Weight normalisation (spec §4.E, testable property 7) lives here so both
//! sides of the admin PATCH path share one implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Latency,
    Cost,
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    RandomWeighted,
    PerformanceBased,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceWeights {
    pub cost: f64,
    pub latency: f64,
    pub success: f64,
    pub load: f64,
}

impl Default for PerformanceWeights {
    fn default() -> Self {
        Self { cost: 0.25, latency: 0.25, success: 0.25, load: 0.25 }
    }
}

impl PerformanceWeights {
    /// Rescale the four components to sum to 1, unless all four are zero
    /// (in which case they stay zero) — testable property 7.
    pub fn normalize(&mut self) {
        let sum = self.cost + self.latency + self.success + self.load;
        if sum <= 0.0 {
            self.cost = 0.0;
            self.latency = 0.0;
            self.success = 0.0;
            self.load = 0.0;
            return;
        }
        self.cost /= sum;
        self.latency /= sum;
        self.success /= sum;
        self.load /= sum;
    }

    pub fn is_normalized(&self) -> bool {
        let sum = self.cost + self.latency + self.success + self.load;
        if sum == 0.0 {
            self.cost == 0.0 && self.latency == 0.0 && self.success == 0.0 && self.load == 0.0
        } else {
            (sum - 1.0).abs() <= 1e-9
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub breaker_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            breaker_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub evaluation_interval: Duration,
    pub min_samples: u32,
    pub cost_threshold: f64,
    pub latency_threshold_ms: f64,
    pub load_threshold: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(60),
            min_samples: 20,
            cost_threshold: 0.01,
            latency_threshold_ms: 2000.0,
            load_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub strategy: Strategy,
    pub fallback_strategy: Strategy,
    pub weights: PerformanceWeights,
    /// Per-endpoint weight used by weighted-round-robin, keyed by
    /// `EndpointId::key()`. Missing entries default to 1.0.
    pub endpoint_weights: HashMap<String, f64>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub adaptive: AdaptiveConfig,
    pub metrics_enabled: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let mut weights = PerformanceWeights::default();
        weights.normalize();
        Self {
            strategy: Strategy::Latency,
            fallback_strategy: Strategy::RoundRobin,
            weights,
            endpoint_weights: HashMap::new(),
            circuit_breaker: CircuitBreakerConfig::default(),
            adaptive: AdaptiveConfig::default(),
            metrics_enabled: true,
        }
    }
}

impl RoutingConfig {
    pub fn endpoint_weight(&self, key: &str) -> f64 {
        self.endpoint_weights.get(key).copied().unwrap_or(1.0)
    }
}

/// Partial update applied by `PATCH /v1/routing/config`. Any `Some` field
/// is applied; weights are renormalised iff at least one of the four was
/// touched (spec §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfigPatch {
    pub strategy: Option<Strategy>,
    pub fallback_strategy: Option<Strategy>,
    pub cost_weight: Option<f64>,
    pub latency_weight: Option<f64>,
    pub success_rate_weight: Option<f64>,
    pub load_weight: Option<f64>,
    pub endpoint_weights: Option<HashMap<String, f64>>,
}

impl RoutingConfig {
    pub fn apply_patch(&mut self, patch: RoutingConfigPatch) {
        if let Some(s) = patch.strategy {
            self.strategy = s;
        }
        if let Some(s) = patch.fallback_strategy {
            self.fallback_strategy = s;
        }
        let mut weights_touched = false;
        if let Some(w) = patch.cost_weight {
            self.weights.cost = w;
            weights_touched = true;
        }
        if let Some(w) = patch.latency_weight {
            self.weights.latency = w;
            weights_touched = true;
        }
        if let Some(w) = patch.success_rate_weight {
            self.weights.success = w;
            weights_touched = true;
        }
        if let Some(w) = patch.load_weight {
            self.weights.load = w;
            weights_touched = true;
        }
        if weights_touched {
            self.weights.normalize();
        }
        if let Some(map) = patch.endpoint_weights {
            self.endpoint_weights.extend(map);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rescales_positive_weights_to_sum_one() {
        let mut w = PerformanceWeights { cost: 1.0, latency: 1.0, success: 1.0, load: 1.0 };
        w.normalize();
        assert!((w.cost + w.latency + w.success + w.load - 1.0).abs() < 1e-9);
        assert!(w.is_normalized());
    }

    #[test]
    fn normalize_leaves_all_zero_weights_zero() {
        let mut w = PerformanceWeights { cost: 0.0, latency: 0.0, success: 0.0, load: 0.0 };
        w.normalize();
        assert_eq!(w.cost, 0.0);
        assert_eq!(w.latency, 0.0);
        assert_eq!(w.success, 0.0);
        assert_eq!(w.load, 0.0);
        assert!(w.is_normalized());
    }

    #[test]
    fn patch_without_weight_fields_does_not_renormalize() {
        let mut cfg = RoutingConfig::default();
        cfg.weights = PerformanceWeights { cost: 2.0, latency: 2.0, success: 2.0, load: 2.0 };
        let patch = RoutingConfigPatch { strategy: Some(Strategy::Cost), ..Default::default() };
        cfg.apply_patch(patch);
        assert_eq!(cfg.weights.cost, 2.0);
        assert_eq!(cfg.strategy, Strategy::Cost);
    }

    #[test]
    fn patch_touching_one_weight_renormalizes_all_four() {
        let mut cfg = RoutingConfig::default();
        let patch = RoutingConfigPatch { cost_weight: Some(1.0), ..Default::default() };
        cfg.apply_patch(patch);
        assert!(cfg.weights.is_normalized());
    }

    #[test]
    fn endpoint_weight_defaults_to_one() {
        let cfg = RoutingConfig::default();
        assert_eq!(cfg.endpoint_weight("openai/us-east"), 1.0);
    }

    proptest::proptest! {
        #[test]
        fn normalize_always_sums_to_one_or_stays_zero(
            c in 0.0f64..100.0, l in 0.0f64..100.0, s in 0.0f64..100.0, ld in 0.0f64..100.0,
        ) {
            let mut w = PerformanceWeights { cost: c, latency: l, success: s, load: ld };
            w.normalize();
            proptest::prop_assert!(w.is_normalized());
        }
    }
}
