//! The state store (spec §4.B): a cooldown/rate-limit gate keyed by
//! `(provider, region, model)`, plus a generic byte-cache with TTL and
//! LFU+LRU eviction bounded by a byte budget.
//!
//! Two conforming backends exist: [`inprocess::InProcessStateStore`] (a
//! mutex-guarded in-memory implementation) and, behind the `remote`
//! feature, [`remote::RemoteStateStore`] (a Redis-backed implementation
//! whose atomicity comes from server-evaluated Lua scripts rather than a
//! client-side read-modify-write).

pub mod inprocess;
#[cfg(feature = "remote")]
pub mod remote;

use async_trait::async_trait;
use omnigate_core::Result;
use std::time::Duration;

/// The contract both state-store backends implement (spec §4.B).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Rate-limit gate, not a counter: enforces a minimum inter-call
    /// interval per `(provider, region, model)`. Returns `(true, 0)` and
    /// commits a new cool-until when allowed; otherwise `(false,
    /// remaining_wait)`.
    async fn allow(
        &self,
        provider: &str,
        region: &str,
        model: &str,
        interval: Duration,
    ) -> Result<(bool, Duration)>;

    /// Unconditionally sets cool-until = now + duration. Used to react to
    /// upstream 429s.
    async fn disable(&self, provider: &str, region: &str, model: &str, duration: Duration)
    -> Result<()>;

    async fn save_cache(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Returns `None` if absent. May return an expired value one last time
    /// if the backend documents that quirk (see `inprocess`).
    async fn load_cache(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Composite rate-state key, `"provider:region:model"`.
pub(crate) fn rate_key(provider: &str, region: &str, model: &str) -> String {
    format!("{provider}:{region}:{model}")
}

/// Fixed per-entry bookkeeping overhead charged against the byte budget in
/// addition to `len(key) + len(value)` (spec §4.B).
pub const CACHE_ENTRY_OVERHEAD_BYTES: usize = 64;

/// Default background cleanup cadence (spec §4.B).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
