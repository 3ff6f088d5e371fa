//! The per-decision scoring rules (spec §4.E strategy table). Each
//! `select_*` function takes an already breaker-filtered candidate slice
//! and returns the index of the chosen candidate, or `None` for an empty
//! slice.

use crate::cost::{estimate_request_cost, PricingTable, ULTIMATE_DEFAULT_COST};
use crate::status::EndpointStatus;
use omnigate_core::{ChatRequest, PerformanceWeights};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

fn candidate_cost(candidate: &EndpointStatus, request: &ChatRequest, pricing: &PricingTable) -> f64 {
    estimate_request_cost(pricing, request).unwrap_or_else(|| {
        if candidate.metrics.total() > 0 {
            candidate.metrics.long_run_cost()
        } else {
            ULTIMATE_DEFAULT_COST
        }
    })
}

fn min_index_by(len: usize, mut key: impl FnMut(usize) -> f64) -> Option<usize> {
    (0..len).min_by(|&a, &b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal))
}

fn max_index_by(len: usize, mut key: impl FnMut(usize) -> f64) -> Option<usize> {
    (0..len).max_by(|&a, &b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal))
}

pub fn select_latency(candidates: &[EndpointStatus]) -> Option<usize> {
    min_index_by(candidates.len(), |i| candidates[i].metrics.short_window_latency_ms())
}

pub fn select_cost(candidates: &[EndpointStatus], request: &ChatRequest, pricing: &PricingTable) -> Option<usize> {
    min_index_by(candidates.len(), |i| candidate_cost(&candidates[i], request, pricing))
}

pub fn select_round_robin(candidates: &[EndpointStatus], cursor: &AtomicUsize) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    Some(cursor.fetch_add(1, AtomicOrdering::SeqCst) % candidates.len())
}

/// Weights are per-endpoint (spec §4.E: "per-endpoint weight defaults to
/// 1.0"), indexed the same as `candidates`. The cursor is mapped into the
/// cumulative weight range rather than the candidate count.
pub fn select_weighted_round_robin(
    candidates: &[EndpointStatus],
    weights: &[f64],
    cursor: &AtomicUsize,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return select_round_robin(candidates, cursor);
    }
    let ticket = (cursor.fetch_add(1, AtomicOrdering::SeqCst) as f64) % total_weight;
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if ticket < cumulative {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

/// Ties resolve to the first candidate with the minimum (spec §4.E).
pub fn select_least_connections(candidates: &[EndpointStatus]) -> Option<usize> {
    (0..candidates.len()).min_by_key(|&i| candidates[i].metrics.active_connections())
}

pub fn select_random_weighted(candidates: &[EndpointStatus], rng: &mut impl rand::Rng) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let weights: Vec<f64> = candidates
        .iter()
        .map(|c| {
            let success = c.metrics.short_window_success_rate();
            let latency_ms = c.metrics.short_window_latency_ms();
            let denom = (latency_ms + 1.0).ln().max(1e-6);
            (success / denom).max(0.01)
        })
        .collect();
    let total: f64 = weights.iter().sum();
    let mut ticket = rng.gen::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        if ticket < *w {
            return Some(i);
        }
        ticket -= w;
    }
    Some(weights.len() - 1)
}

fn performance_score(
    candidate: &EndpointStatus,
    weights: &PerformanceWeights,
    request: &ChatRequest,
    pricing: &PricingTable,
) -> f64 {
    let cost = candidate_cost(candidate, request, pricing);
    let x_cost = (1.0 - cost).max(0.0);
    let latency_ms = candidate.metrics.short_window_latency_ms();
    let x_latency = ((5000.0 - latency_ms) / 5000.0).max(0.0);
    let x_success = candidate.metrics.short_window_success_rate();
    let active = candidate.metrics.active_connections() as f64;
    let x_load = ((100.0 - active) / 100.0).max(0.0);
    weights.cost * x_cost + weights.latency * x_latency + weights.success * x_success + weights.load * x_load
}

pub fn select_performance_based(
    candidates: &[EndpointStatus],
    weights: &PerformanceWeights,
    request: &ChatRequest,
    pricing: &PricingTable,
) -> Option<usize> {
    max_index_by(candidates.len(), |i| performance_score(&candidates[i], weights, request, pricing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigate_core::{CircuitBreakerConfig, MockClock};
    use omnigate_metrics::EndpointMetrics;
    use omnigate_endpoint::Endpoint;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct StubEndpoint {
        provider: &'static str,
        region: &'static str,
    }

    #[async_trait]
    impl Endpoint for StubEndpoint {
        fn provider(&self) -> &str {
            self.provider
        }
        fn region(&self) -> &str {
            self.region
        }
        async fn ping(&self) -> omnigate_core::Result<Duration> {
            Ok(Duration::from_millis(1))
        }
    }

    fn candidate(provider: &'static str, region: &'static str, latency_ms: f64, active: i64) -> EndpointStatus {
        let clock = Arc::new(MockClock::new());
        let metrics = Arc::new(EndpointMetrics::new(clock, CircuitBreakerConfig::default()));
        if latency_ms > 0.0 {
            metrics.record(Duration::from_secs_f64(latency_ms / 1000.0), 0.0, true);
        }
        for _ in 0..active {
            metrics.incr_active();
        }
        EndpointStatus::new(Arc::new(StubEndpoint { provider, region }), metrics)
    }

    // Scenario S1.
    #[test]
    fn latency_strategy_picks_fastest() {
        let candidates = vec![
            candidate("openai", "us-east", 200.0, 0),
            candidate("anthropic", "us-west", 100.0, 0),
            candidate("google", "eu", 300.0, 0),
        ];
        let chosen = select_latency(&candidates).unwrap();
        assert_eq!(candidates[chosen].key(), "anthropic/us-west");
    }

    // Scenario S2.
    #[test]
    fn round_robin_is_fair_over_two_full_cycles() {
        let candidates =
            vec![candidate("a", "r", 0.0, 0), candidate("b", "r", 0.0, 0), candidate("c", "r", 0.0, 0)];
        let cursor = AtomicUsize::new(0);
        let mut counts = [0usize; 3];
        for _ in 0..6 {
            let i = select_round_robin(&candidates, &cursor).unwrap();
            counts[i] += 1;
        }
        assert_eq!(counts, [2, 2, 2]);
    }

    // Scenario S3.
    #[test]
    fn weighted_round_robin_favors_the_heavier_weight() {
        let candidates =
            vec![candidate("a", "r", 0.0, 0), candidate("b", "r", 0.0, 0), candidate("c", "r", 0.0, 0)];
        let weights = [3.0, 1.0, 1.0];
        let cursor = AtomicUsize::new(0);
        let mut counts = [0usize; 3];
        for _ in 0..15 {
            let i = select_weighted_round_robin(&candidates, &weights, &cursor).unwrap();
            counts[i] += 1;
        }
        assert!(counts[0] > counts[1]);
        assert!(counts[0] > counts[2]);
    }

    #[test]
    fn least_connections_prefers_fewest_active() {
        let candidates = vec![candidate("a", "r", 0.0, 5), candidate("b", "r", 0.0, 1)];
        let chosen = select_least_connections(&candidates).unwrap();
        assert_eq!(candidates[chosen].key(), "b/r");
    }

    #[test]
    fn least_connections_ties_resolve_to_first() {
        let candidates = vec![candidate("a", "r", 0.0, 2), candidate("b", "r", 0.0, 2)];
        assert_eq!(select_least_connections(&candidates), Some(0));
    }

    #[test]
    fn cost_strategy_falls_back_to_ultimate_default_for_unpriced_model() {
        let candidates = vec![candidate("a", "r", 0.0, 0)];
        let pricing = PricingTable::with_defaults();
        let request = ChatRequest { model: "unreleased-xyz".into(), ..Default::default() };
        let chosen = select_cost(&candidates, &request, &pricing).unwrap();
        assert_eq!(chosen, 0);
    }

    #[test]
    fn performance_based_prefers_lower_cost_lower_latency_higher_success() {
        let fast = candidate("fast", "r", 50.0, 0);
        let slow = candidate("slow", "r", 4000.0, 0);
        let candidates = vec![fast, slow];
        let weights = PerformanceWeights::default();
        let pricing = PricingTable::with_defaults();
        let request = ChatRequest { model: "gpt-4o".into(), ..Default::default() };
        let chosen = select_performance_based(&candidates, &weights, &request, &pricing).unwrap();
        assert_eq!(candidates[chosen].key(), "fast/r");
    }
}
