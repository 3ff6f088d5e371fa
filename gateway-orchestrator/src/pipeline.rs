//! The single-request pipeline (spec §4.I, §2): cache lookup happens
//! before routing; routing happens before dispatch; dispatch completion
//! happens before outcome recording; recording happens before cache
//! store (spec §5 ordering guarantees).

use crate::guard::ActiveGuard;
use omnigate_cache::Cache;
use omnigate_core::{ChatRequest, ChatResponse, GatewayError, Result};
use omnigate_router::{estimate_request_cost, EndpointStatus, PricingTable, Router};
use omnigate_state::StateStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum inter-call interval enforced per (provider, region, model)
    /// via the state store's rate gate. Zero disables throttling.
    pub min_call_interval: Duration,
    /// How long an endpoint is disabled after an upstream 429.
    pub quota_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { min_call_interval: Duration::ZERO, quota_backoff: Duration::from_secs(60) }
    }
}

/// Wires the cache, router, and state-store contracts into one
/// request-handling entry point. Does not own an HTTP surface itself —
/// `omnigate-admin` calls into this.
pub struct Gateway {
    router: Arc<Router>,
    state: Arc<dyn StateStore>,
    cache: Arc<Cache>,
    pricing: PricingTable,
    config: OrchestratorConfig,
}

impl Gateway {
    pub fn new(router: Arc<Router>, state: Arc<dyn StateStore>, cache: Arc<Cache>, config: OrchestratorConfig) -> Self {
        Self { router, state, cache, pricing: PricingTable::with_defaults(), config }
    }

    fn actual_cost(&self, request: &ChatRequest, response: &ChatResponse) -> f64 {
        if let Some(usage) = &response.usage {
            if let Some(pricing) = self.pricing.price_for(&request.model) {
                return (usage.prompt_tokens as f64 * pricing.input_price_per_million
                    + usage.completion_tokens as f64 * pricing.output_price_per_million)
                    / 1_000_000.0;
            }
        }
        estimate_request_cost(&self.pricing, request)
            .unwrap_or(omnigate_router::cost::ULTIMATE_DEFAULT_COST)
    }

    /// Runs one complete request: cache → route → rate-gate → dispatch →
    /// record → cache-store. `tenant_id` scopes both the cache lookup and
    /// the isolation invariant (spec §4.F).
    pub async fn chat_completion(&self, tenant_id: &str, request: &ChatRequest) -> Result<ChatResponse> {
        let hit = self.cache.lookup(tenant_id, request).await?;
        if hit.found {
            if let Some(response) = hit.entry {
                return Ok(response);
            }
        }

        let candidate_keys = self.router.keys();
        let mut excluded: Vec<String> = Vec::new();

        let response = loop {
            let pool: Vec<String> =
                candidate_keys.iter().filter(|k| !excluded.contains(k)).cloned().collect();
            let status = self.router.route(&pool, request)?;
            let key = status.key();
            match self.dispatch_once(&status, request).await {
                Ok(response) => break response,
                Err(e) if e.allows_fallback() && excluded.len() + 1 < candidate_keys.len() => {
                    excluded.push(key);
                }
                Err(e) => return Err(e),
            }
        };

        self.cache.store(tenant_id, request, &response).await?;
        Ok(response)
    }

    /// Dispatches one attempt against an already-selected endpoint — the
    /// key used for the rate gate, metrics recording, and a retry's
    /// exclusion list is the one the router actually picked, never
    /// re-derived.
    async fn dispatch_once(&self, status: &EndpointStatus, request: &ChatRequest) -> Result<ChatResponse> {
        let key = status.key();
        let provider = status.endpoint.provider().to_string();
        let region = status.endpoint.region().to_string();

        let (allowed, wait_for) =
            self.state.allow(&provider, &region, &request.model, self.config.min_call_interval).await?;
        if !allowed {
            return Err(GatewayError::RateLimited { wait_for });
        }

        let _guard = ActiveGuard::enter(status.metrics.clone());
        let started = Instant::now();
        let outcome = status.endpoint.chat(request).await;
        let latency = started.elapsed();

        match &outcome {
            Ok(response) => {
                let cost = self.actual_cost(request, response);
                self.router.record(&key, latency, cost, true);
            }
            Err(e) => {
                if e.counts_as_breaker_failure() {
                    let cost = estimate_request_cost(&self.pricing, request).unwrap_or(0.0);
                    self.router.record(&key, latency, cost, false);
                }
                if let GatewayError::QuotaExceeded { .. } = e {
                    self.state.disable(&provider, &region, &request.model, self.config.quota_backoff).await?;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use omnigate_cache::CacheConfig;
    use omnigate_core::{ChatChoice, ChatMessage, MessageContent, MockClock, RoutingConfig};
    use omnigate_endpoint::Endpoint;
    use omnigate_state::inprocess::InProcessStateStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubEndpoint {
        provider: &'static str,
        region: &'static str,
        calls: AtomicU32,
        fail_first_n: u32,
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
        async fn chat(&self, request: &ChatRequest) -> omnigate_core::Result<ChatResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(GatewayError::upstream_protocol(self.provider, self.region, "boom"));
            }
            Ok(ChatResponse {
                id: format!("resp-{n}"),
                model: request.model.clone(),
                choices: vec![ChatChoice {
                    index: 0,
                    message: ChatMessage { role: "assistant".into(), content: MessageContent::Text("hi".into()) },
                    finish_reason: Some("stop".into()),
                }],
                usage: None,
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage { role: "user".into(), content: MessageContent::Text("hello".into()) }],
            ..Default::default()
        }
    }

    fn gateway_with(endpoint: StubEndpoint) -> Gateway {
        let clock = Arc::new(MockClock::new());
        let router = Arc::new(Router::new(clock, RoutingConfig::default()));
        router.register(Arc::new(endpoint));
        let state: Arc<dyn StateStore> = Arc::new(InProcessStateStore::new(1024 * 1024));
        let cache = Arc::new(Cache::new(state.clone(), CacheConfig::default()));
        Gateway::new(router, state, cache, OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn happy_path_dispatches_and_caches_the_response() {
        let gateway =
            gateway_with(StubEndpoint { provider: "openai", region: "us", calls: AtomicU32::new(0), fail_first_n: 0 });
        let req = request();
        let response = gateway.chat_completion("tenant-a", &req).await.unwrap();
        assert_eq!(response.choices.len(), 1);

        // Second identical call is served from cache: the stub would
        // otherwise fail its second invocation if this ever re-dispatched
        // (fail_first_n is 0 here, so this only proves the cache path by
        // checking the response id matches the first).
        let cached = gateway.chat_completion("tenant-a", &req).await.unwrap();
        assert_eq!(cached.id, response.id);
    }

    #[tokio::test]
    async fn active_connections_return_to_zero_after_a_successful_call() {
        let endpoint = StubEndpoint { provider: "openai", region: "us", calls: AtomicU32::new(0), fail_first_n: 0 };
        let gateway = gateway_with(endpoint);
        gateway.chat_completion("tenant-a", &request()).await.unwrap();
        let status = gateway.router.get("openai/us").unwrap();
        assert_eq!(status.metrics.active_connections(), 0);
    }

    #[tokio::test]
    async fn no_registered_endpoints_is_no_candidates() {
        let clock = Arc::new(MockClock::new());
        let router = Arc::new(Router::new(clock, RoutingConfig::default()));
        let state: Arc<dyn StateStore> = Arc::new(InProcessStateStore::new(1024 * 1024));
        let cache = Arc::new(Cache::new(state.clone(), CacheConfig::default()));
        let gateway = Gateway::new(router, state, cache, OrchestratorConfig::default());
        let err = gateway.chat_completion("tenant-a", &request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoCandidates));
    }

    // Scenario S6, exercised through the full pipeline.
    #[tokio::test]
    async fn cache_isolation_holds_across_tenants_through_the_pipeline() {
        let endpoint = StubEndpoint { provider: "openai", region: "us", calls: AtomicU32::new(0), fail_first_n: 0 };
        let gateway = gateway_with(endpoint);
        let req = request();
        let first = gateway.chat_completion("tenant-a", &req).await.unwrap();
        let second = gateway.chat_completion("tenant-b", &req).await.unwrap();
        // Different tenants never share a cache entry, so the stub was
        // dispatched twice and produced two distinct response ids.
        assert_ne!(first.id, second.id);
    }
}
