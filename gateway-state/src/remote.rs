//! Redis-backed [`StateStore`]. Atomicity comes from server-evaluated Lua
//! scripts (the server reads its own clock and conditionally writes in one
//! round trip) rather than a client-side read-modify-write, per §4.B.
//!
//! Key layout (spec §6, with the deployment's own name substituted for the
//! upstream project's): `omnigate:disabled:{provider}:{region}:{model}`
//! holds the absolute cool-until instant in microseconds since the Unix
//! epoch, with `PEXPIRE` set to match. Cache keys are opaque to the store
//! and are namespaced under `omnigate:cache:`.

use crate::{rate_key, StateStore};
use async_trait::async_trait;
use omnigate_core::{GatewayError, Result};
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Atomically checks and, if allowed, commits a new cool-until timestamp.
/// Reads the server's own clock via `TIME` rather than trusting a
/// client-supplied timestamp, so gateway/Redis clock skew can't drift this
/// from the in-process backend's semantics. `ARGV`: [interval_micros].
/// Returns `{allowed, wait_micros}`.
const ALLOW_SCRIPT: &str = r#"
local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000000 + tonumber(time[2])
local current = tonumber(redis.call('GET', KEYS[1]))
local interval = tonumber(ARGV[1])
if current and current > now then
    return {0, current - now}
end
local cool_until = now + interval
redis.call('SET', KEYS[1], cool_until)
redis.call('PEXPIRE', KEYS[1], math.ceil(interval / 1000))
return {1, 0}
"#;

/// Unconditionally sets cool-until = now + duration, reading `now` from the
/// server's clock via `TIME`. `ARGV`: [duration_micros].
const DISABLE_SCRIPT: &str = r#"
local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000000 + tonumber(time[2])
local duration = tonumber(ARGV[1])
local cool_until = now + duration
redis.call('SET', KEYS[1], cool_until)
redis.call('PEXPIRE', KEYS[1], math.ceil(duration / 1000))
return 1
"#;

fn disabled_key(provider: &str, region: &str, model: &str) -> String {
    format!("omnigate:disabled:{}", rate_key(provider, region, model))
}

fn cache_key(key: &str) -> String {
    format!("omnigate:cache:{key}")
}

pub struct RemoteStateStore {
    client: redis::Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    allow_script: Script,
    disable_script: Script,
}

impl RemoteStateStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| GatewayError::Config(format!("invalid redis url {redis_url:?}: {e}")))?;
        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
            allow_script: Script::new(ALLOW_SCRIPT),
            disable_script: Script::new(DISABLE_SCRIPT),
        })
    }

    async fn ensure_connection(&self, conn: &mut Option<MultiplexedConnection>) -> Result<()> {
        if conn.is_some() {
            return Ok(());
        }
        let fresh = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| GatewayError::Io(format!("redis connect failed: {e}")))?;
        *conn = Some(fresh);
        Ok(())
    }

    /// Run `f` against a live connection, reconnecting and retrying once on
    /// failure (a Redis connection going stale is routine, not fatal).
    async fn with_connection<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let mut last_error = None;
        for attempt in 0..2 {
            let mut guard = self.connection.lock().await;
            self.ensure_connection(&mut guard).await?;
            let conn = guard.as_ref().expect("just ensured").clone();
            drop(guard);

            match f(conn).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %err,
                        "redis command failed; reconnecting"
                    );
                    *self.connection.lock().await = None;
                    last_error = Some(err);
                }
            }
        }
        Err(GatewayError::Io(format!(
            "redis command failed after retry: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn allow(
        &self,
        provider: &str,
        region: &str,
        model: &str,
        interval: Duration,
    ) -> Result<(bool, Duration)> {
        let key = disabled_key(provider, region, model);
        let interval_micros = interval.as_micros() as i64;
        let script = self.allow_script.clone();

        let (allowed, wait_micros): (i64, i64) = self
            .with_connection(|mut conn| {
                let script = script.clone();
                let key = key.clone();
                async move { script.key(key).arg(interval_micros).invoke_async(&mut conn).await }
            })
            .await?;

        Ok((allowed == 1, Duration::from_micros(wait_micros.max(0) as u64)))
    }

    async fn disable(
        &self,
        provider: &str,
        region: &str,
        model: &str,
        duration: Duration,
    ) -> Result<()> {
        let key = disabled_key(provider, region, model);
        let duration_micros = duration.as_micros() as i64;
        let script = self.disable_script.clone();

        let _: i64 = self
            .with_connection(|mut conn| {
                let script = script.clone();
                let key = key.clone();
                async move { script.key(key).arg(duration_micros).invoke_async(&mut conn).await }
            })
            .await?;
        Ok(())
    }

    async fn save_cache(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let redis_key = cache_key(key);
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = self
            .with_connection(|mut conn| {
                let redis_key = redis_key.clone();
                let value = value.clone();
                async move {
                    redis::cmd("SETEX")
                        .arg(&redis_key)
                        .arg(ttl_secs)
                        .arg(&value)
                        .query_async(&mut conn)
                        .await
                }
            })
            .await?;
        Ok(())
    }

    async fn load_cache(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let redis_key = cache_key(key);
        self.with_connection(|mut conn| {
            let redis_key = redis_key.clone();
            async move {
                redis::cmd("GET").arg(&redis_key).query_async::<Option<Vec<u8>>>(&mut conn).await
            }
        })
        .await
    }
}
