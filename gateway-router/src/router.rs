//! The router itself (spec §4.E): owns the endpoint table and the metrics
//! map behind one outer lock each, filters candidates by breaker state,
//! scores the survivors with the configured strategy, and feeds outcomes
//! back into the per-endpoint metrics. Two-level locking per spec §5: this
//! file's locks guard table/config structure only; per-entry field updates
//! go through `EndpointMetrics`'s own inner lock.

use crate::adaptive::{AdaptiveState, FleetSnapshot};
use crate::cost::PricingTable;
use crate::status::EndpointStatus;
use crate::strategy;
use omnigate_core::{ChatRequest, Clock, GatewayError, Result, RoutingConfig, RoutingConfigPatch, Strategy};
use omnigate_endpoint::Endpoint;
use omnigate_metrics::MetricsRegistry;
use rand::thread_rng;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

pub struct Router {
    endpoints: RwLock<HashMap<String, EndpointStatus>>,
    metrics: Arc<MetricsRegistry>,
    config: RwLock<RoutingConfig>,
    pricing: PricingTable,
    round_robin_cursor: AtomicUsize,
    adaptive: Mutex<AdaptiveState>,
}

impl Router {
    pub fn new(clock: Arc<dyn Clock>, config: RoutingConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new(clock.clone(), config.circuit_breaker.clone()));
        Self {
            endpoints: RwLock::new(HashMap::new()),
            metrics,
            config: RwLock::new(config),
            pricing: PricingTable::with_defaults(),
            round_robin_cursor: AtomicUsize::new(0),
            adaptive: Mutex::new(AdaptiveState::new(clock)),
        }
    }

    /// Registers an endpoint, lazily creating its metrics record. Idempotent
    /// on (provider, region): re-registering replaces the adapter handle but
    /// keeps the same metrics history.
    pub fn register(&self, endpoint: Arc<dyn Endpoint>) -> EndpointStatus {
        let key = endpoint.key();
        let metrics = self.metrics.get_or_create(&key);
        let status = EndpointStatus::new(endpoint, metrics);
        self.endpoints.write().unwrap().insert(key, status.clone());
        status
    }

    pub fn deregister(&self, key: &str) {
        self.endpoints.write().unwrap().remove(key);
    }

    pub fn get(&self, key: &str) -> Option<EndpointStatus> {
        self.endpoints.read().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.endpoints.read().unwrap().keys().cloned().collect()
    }

    pub fn config(&self) -> RoutingConfig {
        self.config.read().unwrap().clone()
    }

    /// Applies a partial admin update (spec §6 `PATCH /v1/routing/config`).
    pub fn patch_config(&self, patch: RoutingConfigPatch) {
        let mut config = self.config.write().unwrap();
        config.apply_patch(patch);
        tracing::info!("routing config patched");
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Current adaptive-strategy pick plus its change history, for the
    /// admin `GET /stats` snapshot (spec §6). Meaningless when
    /// `config().strategy != Strategy::Adaptive`, but harmless to read.
    pub fn adaptive_snapshot(&self) -> (Strategy, Vec<crate::adaptive::StrategyChange>) {
        let adaptive = self.adaptive.lock().unwrap();
        (adaptive.active_strategy(), adaptive.history().to_vec())
    }

    /// Feeds one outcome back into the metrics/breaker (spec §4.E `Record`).
    pub fn record(&self, key: &str, latency: Duration, cost: f64, success: bool) {
        if let Some(metrics) = self.metrics.get(key) {
            metrics.record(latency, cost, success);
        }
    }

    /// Issues a `Ping` health check against one registered endpoint and
    /// records the measured latency onto its `EndpointStatus` (spec §3
    /// "last measured latency"). Callers drive the cadence — see
    /// `omnigate-cli`'s periodic background task.
    pub async fn refresh_ping(&self, key: &str) -> Result<Duration> {
        let status = self.get(key).ok_or_else(|| GatewayError::NoCandidates)?;
        let latency = status.endpoint.ping().await?;
        status.record_ping(latency);
        Ok(latency)
    }

    /// Selects one endpoint from `candidate_keys` for `request` (spec §4.E
    /// `Route`). Unknown keys are silently dropped; an empty result after
    /// lookup is `NoCandidates`, which is always fatal.
    pub fn route(&self, candidate_keys: &[String], request: &ChatRequest) -> Result<EndpointStatus> {
        let all: Vec<EndpointStatus> = {
            let endpoints = self.endpoints.read().unwrap();
            candidate_keys.iter().filter_map(|k| endpoints.get(k).cloned()).collect()
        };

        if all.is_empty() {
            return Err(GatewayError::NoCandidates);
        }

        let filtered: Vec<EndpointStatus> = all.iter().filter(|c| c.is_available()).cloned().collect();
        let pool: &[EndpointStatus] = if filtered.is_empty() {
            tracing::warn!("all candidates filtered by open breakers, falling back to unfiltered list");
            &all
        } else {
            &filtered
        };

        let config = self.config();
        let primary = self.effective_strategy(&config, pool);

        if let Some(status) = self.select(primary, pool, &config, request) {
            return Ok(status);
        }

        if config.fallback_strategy != primary {
            tracing::warn!(
                strategy = ?primary,
                fallback = ?config.fallback_strategy,
                "primary strategy produced no result, retrying with fallback"
            );
            if let Some(status) = self.select(config.fallback_strategy, pool, &config, request) {
                return Ok(status);
            }
        }

        Err(GatewayError::NoCandidates)
    }

    fn effective_strategy(&self, config: &RoutingConfig, pool: &[EndpointStatus]) -> Strategy {
        if config.strategy != Strategy::Adaptive {
            return config.strategy;
        }
        let fleet = Self::fleet_snapshot(pool);
        self.adaptive.lock().unwrap().tick(&config.adaptive, fleet)
    }

    fn fleet_snapshot(pool: &[EndpointStatus]) -> FleetSnapshot {
        if pool.is_empty() {
            return FleetSnapshot::default();
        }
        let n = pool.len() as f64;
        let avg_cost = pool.iter().map(|c| c.metrics.long_run_cost()).sum::<f64>() / n;
        let avg_latency_ms = pool.iter().map(|c| c.metrics.short_window_latency_ms()).sum::<f64>() / n;
        let avg_load = pool.iter().map(|c| c.metrics.active_connections() as f64).sum::<f64>() / n;
        FleetSnapshot { avg_cost, avg_latency_ms, avg_load }
    }

    fn select(
        &self,
        strategy: Strategy,
        pool: &[EndpointStatus],
        config: &RoutingConfig,
        request: &ChatRequest,
    ) -> Option<EndpointStatus> {
        let index = match strategy {
            Strategy::Latency => strategy::select_latency(pool),
            Strategy::Cost => strategy::select_cost(pool, request, &self.pricing),
            Strategy::RoundRobin => strategy::select_round_robin(pool, &self.round_robin_cursor),
            Strategy::WeightedRoundRobin => {
                let weights: Vec<f64> = pool.iter().map(|c| config.endpoint_weight(&c.key())).collect();
                strategy::select_weighted_round_robin(pool, &weights, &self.round_robin_cursor)
            }
            Strategy::LeastConnections => strategy::select_least_connections(pool),
            Strategy::RandomWeighted => strategy::select_random_weighted(pool, &mut thread_rng()),
            Strategy::PerformanceBased => {
                strategy::select_performance_based(pool, &config.weights, request, &self.pricing)
            }
            // `effective_strategy` never returns `Adaptive` itself; kept for
            // exhaustiveness, falling back to the same scoring rule adaptive
            // mode converges to in steady state.
            Strategy::Adaptive => {
                strategy::select_performance_based(pool, &config.weights, request, &self.pricing)
            }
        };
        index.map(|i| pool[i].clone())
    }
}
