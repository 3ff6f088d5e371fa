//! Outer table of per-endpoint metrics, created lazily on first touch
//! (spec §3). Two-level locking: this registry's `RwLock` guards map
//! membership only; field updates on an individual [`EndpointMetrics`] go
//! through its own inner lock, so concurrent `record` calls on different
//! endpoints never contend on the outer lock.

use crate::metrics::EndpointMetrics;
use omnigate_core::{CircuitBreakerConfig, Clock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MetricsRegistry {
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
    entries: RwLock<HashMap<String, Arc<EndpointMetrics>>>,
}

impl MetricsRegistry {
    pub fn new(clock: Arc<dyn Clock>, config: CircuitBreakerConfig) -> Self {
        Self { clock, config, entries: RwLock::new(HashMap::new()) }
    }

    /// Fetch the metrics record for `key`, creating it on first touch.
    pub fn get_or_create(&self, key: &str) -> Arc<EndpointMetrics> {
        if let Some(existing) = self.entries.read().get(key) {
            return existing.clone();
        }
        let mut entries = self.entries.write();
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(EndpointMetrics::new(self.clock.clone(), self.config.clone())))
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<EndpointMetrics>> {
        self.entries.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}
