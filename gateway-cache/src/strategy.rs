//! Pluggable cache match strategies (spec §4.F). The strategy is a
//! config-time choice, but the result always reports back which strategy
//! actually produced the match.

use async_trait::async_trait;
use omnigate_core::{ChatRequest, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Fingerprint equality on the verbatim normalised request.
    Exact,
    /// Fingerprint equality on a case/whitespace-normalised token sequence.
    Token,
    /// Vector-similarity lookup against an external embedding store.
    Semantic,
}

impl Default for CacheStrategy {
    fn default() -> Self {
        CacheStrategy::Exact
    }
}

/// Hook for the `semantic` strategy's embedding-store lookup. The store
/// itself (and how it's populated) is out of scope here — this crate only
/// defines the seam an external implementation plugs into. Returns the
/// cache key of the most similar prior request, if any clears the
/// implementation's own similarity threshold.
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    async fn find_similar(&self, tenant_id: &str, request: &ChatRequest) -> Result<Option<String>>;
}

/// Used when `semantic` is configured but no [`SemanticMatcher`] was
/// wired in: degrades to the `token` strategy rather than failing closed,
/// and the result reports `Token` as the strategy that actually matched.
pub struct NoopSemanticMatcher;

#[async_trait]
impl SemanticMatcher for NoopSemanticMatcher {
    async fn find_similar(&self, _tenant_id: &str, _request: &ChatRequest) -> Result<Option<String>> {
        Ok(None)
    }
}
