//! The cache layer (spec §4.F): `Lookup`/`Store`/`Clear`/`Stop` over a
//! pluggable [`StateStore`] byte-cache backend, with tenant-scoped
//! fingerprinting providing the isolation invariant.

use crate::fingerprint::fingerprint;
use crate::strategy::{CacheStrategy, NoopSemanticMatcher, SemanticMatcher};
use omnigate_core::{ChatRequest, ChatResponse, GatewayError, Result};
use omnigate_state::StateStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default TTL for stored responses (spec §4.F names no fixed default;
/// this mirrors the state store's own cleanup cadence as a reasonable
/// baseline).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub strategy: CacheStrategy,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { strategy: CacheStrategy::default(), ttl: DEFAULT_CACHE_TTL }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    response: ChatResponse,
    strategy: CacheStrategy,
}

#[derive(Debug, Clone)]
pub struct LookupResult {
    pub found: bool,
    pub entry: Option<ChatResponse>,
    pub strategy: CacheStrategy,
}

impl LookupResult {
    fn miss(strategy: CacheStrategy) -> Self {
        Self { found: false, entry: None, strategy }
    }
}

/// Wraps a [`StateStore`] backend to provide request/response caching.
/// `Clear()` only resets this cache's own local key index: the backend
/// trait has no delete primitive, so previously-stored entries are left
/// to expire on their own TTL rather than being actively purged. This is
/// a disclosed simplification, not an oversight.
pub struct Cache {
    store: Arc<dyn StateStore>,
    config: CacheConfig,
    semantic: Arc<dyn SemanticMatcher>,
    keys: Mutex<HashSet<String>>,
}

impl Cache {
    pub fn new(store: Arc<dyn StateStore>, config: CacheConfig) -> Self {
        Self { store, config, semantic: Arc::new(NoopSemanticMatcher), keys: Mutex::new(HashSet::new()) }
    }

    pub fn with_semantic_matcher(mut self, matcher: Arc<dyn SemanticMatcher>) -> Self {
        self.semantic = matcher;
        self
    }

    fn cache_key(&self, tenant_id: &str, request: &ChatRequest) -> String {
        let fp = fingerprint(tenant_id, request, self.config.strategy);
        format!("chatcache:{fp}")
    }

    pub async fn lookup(&self, tenant_id: &str, request: &ChatRequest) -> Result<LookupResult> {
        if self.config.strategy == CacheStrategy::Semantic {
            if let Some(key) = self.semantic.find_similar(tenant_id, request).await? {
                if let Some(raw) = self.store.load_cache(&key).await? {
                    let stored: StoredEntry = serde_json::from_slice(&raw)
                        .map_err(|e| GatewayError::Config(format!("corrupt cache entry: {e}")))?;
                    return Ok(LookupResult {
                        found: true,
                        entry: Some(stored.response),
                        strategy: CacheStrategy::Semantic,
                    });
                }
            }
        }

        let key = self.cache_key(tenant_id, request);
        match self.store.load_cache(&key).await? {
            Some(raw) => {
                let stored: StoredEntry = serde_json::from_slice(&raw)
                    .map_err(|e| GatewayError::Config(format!("corrupt cache entry: {e}")))?;
                Ok(LookupResult { found: true, entry: Some(stored.response), strategy: stored.strategy })
            }
            None => Ok(LookupResult::miss(self.config.strategy)),
        }
    }

    pub async fn store(&self, tenant_id: &str, request: &ChatRequest, response: &ChatResponse) -> Result<()> {
        let key = self.cache_key(tenant_id, request);
        let entry = StoredEntry { response: response.clone(), strategy: self.config.strategy };
        let raw = serde_json::to_vec(&entry)
            .map_err(|e| GatewayError::Config(format!("cannot serialize cache entry: {e}")))?;
        self.store.save_cache(&key, raw, self.config.ttl).await?;
        self.keys.lock().unwrap().insert(key);
        Ok(())
    }

    /// Forgets this cache's own local key index. Does not instruct the
    /// backend to delete anything (it can't — see the struct doc); entries
    /// already written remain until their TTL elapses.
    pub fn clear(&self) {
        self.keys.lock().unwrap().clear();
    }

    /// No background task of its own to stop: cleanup is owned by the
    /// state-store backend. Present for contract symmetry with `Lookup`/
    /// `Store`/`Clear`.
    pub fn stop(&self) {}

    pub fn tracked_key_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}
