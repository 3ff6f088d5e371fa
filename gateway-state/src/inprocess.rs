//! In-process state store: one mutex for the rate-state map, a separate
//! mutex for the cache map + eviction heap (spec §5: "the heap is not
//! thread-safe on its own").

use crate::{rate_key, StateStore, CACHE_ENTRY_OVERHEAD_BYTES, DEFAULT_CLEANUP_INTERVAL};
use async_trait::async_trait;
use omnigate_core::{Clock, GatewayError, Heap, Result, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
    last_read: Instant,
    read_count: u64,
}

impl CacheEntry {
    fn size(&self, key: &str) -> usize {
        CACHE_ENTRY_OVERHEAD_BYTES + key.len() + self.value.len()
    }
}

/// The heap's sort key, kept separate from the byte payload so the heap
/// itself stays cheap to shuffle. Two entries sharing a `key` are treated
/// as identity-equal by `less` (see the struct-level doc) regardless of
/// their `read_count`/`last_read`, which is what lets `update` reposition
/// an existing entry rather than only ever finding a fresh one.
#[derive(Clone)]
struct HeapKey {
    key: String,
    read_count: u64,
    last_read: Instant,
}

/// Ordered by `(read_count asc, last_read asc, key asc)`; the top is the
/// eviction victim. Entries sharing a key always compare equal so that
/// `Heap::update` can locate and reposition an existing record.
fn heap_less(a: &HeapKey, b: &HeapKey) -> bool {
    if a.key == b.key {
        return false;
    }
    (a.read_count, a.last_read, &a.key) < (b.read_count, b.last_read, &b.key)
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    heap: Heap<HeapKey>,
    usage_bytes: usize,
    max_bytes: usize,
}

impl CacheState {
    fn new(max_bytes: usize) -> Self {
        Self { entries: HashMap::new(), heap: Heap::new(heap_less), usage_bytes: 0, max_bytes }
    }

    fn remove_key(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.usage_bytes = self.usage_bytes.saturating_sub(entry.size(key));
            self.heap.remove(&HeapKey {
                key: key.to_string(),
                read_count: entry.read_count,
                last_read: entry.last_read,
            });
        }
    }

    fn insert(&mut self, key: String, value: Vec<u8>, ttl: Duration, now: Instant) -> Result<()> {
        self.remove_key(&key);

        let entry = CacheEntry { value, expires_at: now + ttl, last_read: now, read_count: 1 };
        let needed = entry.size(&key);

        while self.usage_bytes + needed > self.max_bytes {
            let Some(victim) = self.heap.pop() else {
                return Err(GatewayError::Internal(format!(
                    "cache full: cannot free {needed} bytes for key {key:?} (max_bytes={})",
                    self.max_bytes
                )));
            };
            if let Some(victim_entry) = self.entries.remove(&victim.key) {
                self.usage_bytes = self.usage_bytes.saturating_sub(victim_entry.size(&victim.key));
            }
        }

        self.heap.push(HeapKey { key: key.clone(), read_count: 1, last_read: now });
        self.usage_bytes += needed;
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Returns the value plus whether the entry was found expired and
    /// purged (the documented "one last read" quirk).
    fn load(&mut self, key: &str, now: Instant) -> Option<Vec<u8>> {
        let expired = {
            let entry = self.entries.get(key)?;
            now >= entry.expires_at
        };

        if expired {
            let value = self.entries.get(key).map(|e| e.value.clone());
            self.remove_key(key);
            return value;
        }

        let entry = self.entries.get_mut(key)?;
        let old_read_count = entry.read_count;
        let old_last_read = entry.last_read;
        entry.read_count += 1;
        entry.last_read = now;
        let value = entry.value.clone();

        // Locate the existing heap record via its pre-update stats (the
        // `less` predicate treats same-key entries as identity-equal, so
        // this still finds it), then push the repositioned key/stat pair.
        let found = self.heap.update(HeapKey {
            key: key.to_string(),
            read_count: old_read_count + 1,
            last_read: now,
        });
        debug_assert!(found, "cache map/heap desynchronised for key {key:?} ({old_last_read:?})");

        Some(value)
    }

    fn purge_expired(&mut self, now: Instant) {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| now >= e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired_keys {
            self.remove_key(&key);
        }
    }

    fn total_bytes(&self) -> usize {
        self.usage_bytes
    }
}

pub struct InProcessStateStore {
    clock: Arc<dyn Clock>,
    rate_state: Mutex<HashMap<String, Instant>>,
    cache: Mutex<CacheState>,
}

impl InProcessStateStore {
    pub fn new(max_cache_bytes: usize) -> Self {
        Self::with_clock(max_cache_bytes, Arc::new(SystemClock))
    }

    pub fn with_clock(max_cache_bytes: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rate_state: Mutex::new(HashMap::new()),
            cache: Mutex::new(CacheState::new(max_cache_bytes)),
        }
    }

    /// Total bytes currently charged against the cache's byte budget.
    pub fn cache_bytes_in_use(&self) -> usize {
        self.cache.lock().unwrap().total_bytes()
    }

    /// Run one cleanup pass: purge expired rate-state and cache entries.
    /// Exposed directly (rather than only via a spawned ticker) so tests
    /// can drive it deterministically against a [`omnigate_core::MockClock`].
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        {
            let mut rate_state = self.rate_state.lock().unwrap();
            rate_state.retain(|_, cool_until| *cool_until > now);
        }
        {
            let mut cache = self.cache.lock().unwrap();
            cache.purge_expired(now);
        }
    }

    /// Spawn a background ticker that calls [`Self::purge_expired`] on the
    /// given cadence until the returned handle is dropped/aborted.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.purge_expired();
                tracing::debug!("state store cleanup pass complete");
            }
        })
    }

    pub fn spawn_default_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.spawn_cleanup(DEFAULT_CLEANUP_INTERVAL)
    }
}

#[async_trait]
impl StateStore for InProcessStateStore {
    async fn allow(
        &self,
        provider: &str,
        region: &str,
        model: &str,
        interval: Duration,
    ) -> Result<(bool, Duration)> {
        let now = self.clock.now();
        let key = rate_key(provider, region, model);
        let mut rate_state = self.rate_state.lock().unwrap();
        match rate_state.get(&key) {
            Some(cool_until) if *cool_until > now => Ok((false, *cool_until - now)),
            _ => {
                rate_state.insert(key, now + interval);
                Ok((true, Duration::ZERO))
            }
        }
    }

    async fn disable(
        &self,
        provider: &str,
        region: &str,
        model: &str,
        duration: Duration,
    ) -> Result<()> {
        let now = self.clock.now();
        let key = rate_key(provider, region, model);
        self.rate_state.lock().unwrap().insert(key, now + duration);
        Ok(())
    }

    async fn save_cache(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        self.cache.lock().unwrap().insert(key.to_string(), value, ttl, now)
    }

    async fn load_cache(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        Ok(self.cache.lock().unwrap().load(key, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigate_core::MockClock;

    fn store_with_clock(max_bytes: usize) -> (Arc<InProcessStateStore>, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let store = Arc::new(InProcessStateStore::with_clock(max_bytes, clock.clone()));
        (store, clock)
    }

    // --- Rate-limit gate (testable property 1 / scenario S5) ---

    #[tokio::test]
    async fn allow_grants_first_call_and_denies_within_interval() {
        let (store, clock) = store_with_clock(1 << 20);
        let interval = Duration::from_millis(100);

        let (ok, wait) = store.allow("openai", "us-east", "gpt-4", interval).await.unwrap();
        assert!(ok);
        assert_eq!(wait, Duration::ZERO);

        clock.advance(Duration::from_millis(50));
        let (ok, wait) = store.allow("openai", "us-east", "gpt-4", interval).await.unwrap();
        assert!(!ok);
        assert_eq!(wait, Duration::from_millis(50));

        clock.advance(Duration::from_millis(50));
        let (ok, wait) = store.allow("openai", "us-east", "gpt-4", interval).await.unwrap();
        assert!(ok);
        assert_eq!(wait, Duration::ZERO);
    }

    #[tokio::test]
    async fn allow_is_scoped_per_provider_region_model() {
        let (store, _clock) = store_with_clock(1 << 20);
        let interval = Duration::from_millis(100);
        let (ok_a, _) = store.allow("openai", "us-east", "gpt-4", interval).await.unwrap();
        let (ok_b, _) = store.allow("anthropic", "us-east", "gpt-4", interval).await.unwrap();
        let (ok_c, _) = store.allow("openai", "us-west", "gpt-4", interval).await.unwrap();
        assert!(ok_a && ok_b && ok_c);
    }

    // --- Disable override (testable property 2) ---

    #[tokio::test]
    async fn disable_overrides_allowed_state_for_full_duration() {
        let (store, clock) = store_with_clock(1 << 20);
        store
            .disable("openai", "us-east", "gpt-4", Duration::from_millis(200))
            .await
            .unwrap();

        let (ok, wait) = store.allow("openai", "us-east", "gpt-4", Duration::from_millis(1)).await.unwrap();
        assert!(!ok);
        assert!(wait > Duration::ZERO);

        clock.advance(Duration::from_millis(199));
        let (ok, _) = store.allow("openai", "us-east", "gpt-4", Duration::from_millis(1)).await.unwrap();
        assert!(!ok);

        clock.advance(Duration::from_millis(2));
        let (ok, _) = store.allow("openai", "us-east", "gpt-4", Duration::from_millis(1)).await.unwrap();
        assert!(ok);
    }

    // --- Cache byte budget (testable property 3) ---

    #[tokio::test]
    async fn overwrite_releases_previous_entry_bytes() {
        let (store, _clock) = store_with_clock(1 << 20);
        store.save_cache("k", vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();
        let after_first = store.cache_bytes_in_use();
        store.save_cache("k", vec![1, 2, 3, 4, 5], Duration::from_secs(60)).await.unwrap();
        let after_second = store.cache_bytes_in_use();
        // Second insert should only add the delta, not stack on top of the first.
        assert_eq!(after_second - after_first, 2);
    }

    #[tokio::test]
    async fn insert_errors_when_heap_empties_without_reaching_budget() {
        let (store, _clock) = store_with_clock(CACHE_ENTRY_OVERHEAD_BYTES + 1);
        let big = vec![0u8; 10_000];
        let result = store.save_cache("too-big", big, Duration::from_secs(60)).await;
        assert!(result.is_err());
    }

    // --- LFU+LRU eviction order (testable property 4) ---

    #[tokio::test]
    async fn eviction_prefers_least_frequently_then_least_recently_read() {
        let entry_bytes = CACHE_ENTRY_OVERHEAD_BYTES + 1 /* key */ + 1 /* value */;
        let (store, clock) = store_with_clock(entry_bytes * 3 + entry_bytes - 1);

        store.save_cache("a", vec![1], Duration::from_secs(60)).await.unwrap();
        store.save_cache("b", vec![1], Duration::from_secs(60)).await.unwrap();
        store.save_cache("c", vec![1], Duration::from_secs(60)).await.unwrap();

        // A: 1 read (from insert), B: 5 reads, C: 10 reads.
        for _ in 0..4 {
            store.load_cache("b").await.unwrap();
        }
        for _ in 0..9 {
            store.load_cache("c").await.unwrap();
        }
        clock.advance(Duration::from_millis(1));

        // Inserting a fourth entry should evict A first.
        store.save_cache("d", vec![1], Duration::from_secs(60)).await.unwrap();
        assert!(store.load_cache("a").await.unwrap().is_none());
        assert!(store.load_cache("b").await.unwrap().is_some());
        assert!(store.load_cache("c").await.unwrap().is_some());
        assert!(store.load_cache("d").await.unwrap().is_some());
    }

    // --- Documented expiry quirk ---

    #[tokio::test]
    async fn load_on_expired_entry_returns_value_once_then_misses() {
        let (store, clock) = store_with_clock(1 << 20);
        store.save_cache("k", vec![9, 9], Duration::from_millis(10)).await.unwrap();
        clock.advance(Duration::from_millis(11));

        let value = store.load_cache("k").await.unwrap();
        assert_eq!(value, Some(vec![9, 9]));

        let value = store.load_cache("k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn load_missing_key_returns_none() {
        let (store, _clock) = store_with_clock(1 << 20);
        assert_eq!(store.load_cache("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn purge_expired_removes_stale_rate_and_cache_entries() {
        let (store, clock) = store_with_clock(1 << 20);
        store.disable("p", "r", "m", Duration::from_millis(10)).await.unwrap();
        store.save_cache("k", vec![1], Duration::from_millis(10)).await.unwrap();

        clock.advance(Duration::from_millis(20));
        store.purge_expired();

        let (ok, _) = store.allow("p", "r", "m", Duration::from_millis(1)).await.unwrap();
        assert!(ok, "rate state should have been purged, not still cooling down");
        assert_eq!(store.cache_bytes_in_use(), 0);
    }
}
