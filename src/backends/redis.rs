//! Redis storage backend.
//!
//! Records are stored as JSON strings under the circuit name. Locks use
//! `SET key token NX PX ttl` for acquisition and a compare-and-delete Lua
//! script for release, so only the holder can release its own lock.
//!
//! A lock whose handle is dropped without `unlock` is not released eagerly;
//! it expires after the lock TTL.

use crate::core::{BackendError, CircuitInformation, LockHandle, StorageBackend};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::fmt;
use std::time::{Duration, Instant};

/// Default lock TTL.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);

/// Default lock key prefix.
pub const DEFAULT_LOCK_PREFIX: &str = "lock";

/// Only deletes the key if the stored value matches the token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Retry policy for contended locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    /// Additional attempts after the first one.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

/// A storage backend backed by Redis.
///
/// # Example
///
/// ```rust,ignore
/// use sharedbreaker::backends::RedisBackend;
/// use sharedbreaker::circuit_breaker::{with_storage_backend, CircuitBreakerFactory};
/// use std::time::Duration;
///
/// let backend = RedisBackend::connect("redis://127.0.0.1:6379")
///     .await?
///     .with_lock_ttl(Duration::from_secs(5));
/// let factory = CircuitBreakerFactory::from_options([with_storage_backend(backend)])?;
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    lock_prefix: String,
    lock_ttl: Duration,
    lock_retry: Option<LockRetry>,
    record_ttl: Option<Duration>,
}

impl RedisBackend {
    /// Connects to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::from_connection(conn))
    }

    /// Uses an existing multiplexed connection.
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_retry: None,
            record_ttl: None,
        }
    }

    /// Sets the prefix of lock keys.
    pub fn with_lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    /// Sets how long a lock lives if its holder never releases it.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Retries contended locks instead of failing on the first attempt.
    pub fn with_lock_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.lock_retry = Some(LockRetry { attempts, delay });
        self
    }

    /// Evicts records `ttl` after their last write.
    ///
    /// An evicted record reads back as a fresh closed circuit.
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = Some(ttl);
        self
    }

    fn lock_key(&self, name: &str) -> String {
        format_lock_key(&self.lock_prefix, name)
    }
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("lock_prefix", &self.lock_prefix)
            .field("lock_ttl", &self.lock_ttl)
            .field("lock_retry", &self.lock_retry)
            .field("record_ttl", &self.record_ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(info)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(name).arg(payload);
        if let Some(ttl) = self.record_ttl {
            cmd.arg("PX").arg(duration_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(name).await?;
        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(CircuitInformation::default()),
        }
    }

    async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError> {
        let mut conn = self.conn.clone();
        let key = self.lock_key(name);
        let token = uuid::Uuid::new_v4().to_string();
        let millis = duration_millis(self.lock_ttl);
        let retry = self.lock_retry.unwrap_or(LockRetry {
            attempts: 0,
            delay: Duration::ZERO,
        });
        let started = Instant::now();

        for attempt in 0..=retry.attempts {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(millis)
                .query_async(&mut conn)
                .await?;

            if acquired.is_some() {
                tracing::trace!(lock_key = %key, attempt, "acquired redis lock");
                return Ok(Box::new(RedisLock {
                    conn,
                    name: name.to_string(),
                    key,
                    token,
                    released: false,
                }));
            }
            if attempt < retry.attempts {
                tokio::time::sleep(retry.delay).await;
            }
        }

        if self.lock_retry.is_some() {
            Err(BackendError::LockTimeout {
                name: name.to_string(),
                elapsed: started.elapsed(),
            })
        } else {
            Err(BackendError::LockUnavailable {
                name: name.to_string(),
            })
        }
    }
}

/// Lock handle of [`RedisBackend`].
pub struct RedisLock {
    conn: MultiplexedConnection,
    name: String,
    key: String,
    token: String,
    released: bool,
}

impl fmt::Debug for RedisLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisLock")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LockHandle for RedisLock {
    async fn unlock(&mut self) -> Result<(), BackendError> {
        if self.released {
            return Ok(());
        }
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut self.conn)
            .await?;
        self.released = true;

        if deleted == 1 {
            Ok(())
        } else {
            Err(BackendError::LockLost {
                name: self.name.clone(),
            })
        }
    }
}

/// Formats the Redis key of a circuit's lock.
pub fn format_lock_key(prefix: &str, name: &str) -> String {
    format!("{}:{}", prefix, name)
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lock_key() {
        assert_eq!(format_lock_key("lock", "payments"), "lock:payments");
        assert_eq!(
            format_lock_key("myapp:lock", "acme/payments"),
            "myapp:lock:acme/payments"
        );
    }

    #[test]
    fn test_release_script_compares_before_delete() {
        assert!(RELEASE_SCRIPT.contains("redis.call(\"get\""));
        assert!(RELEASE_SCRIPT.contains("redis.call(\"del\""));
    }

    #[test]
    fn test_redis_error_converts_to_backend_error() {
        let err: BackendError =
            redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into();
        assert!(matches!(err, BackendError::Redis(_)));
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_lock_failure());
    }

    #[test]
    fn test_duration_millis_never_zero() {
        assert_eq!(duration_millis(Duration::ZERO), 1);
        assert_eq!(duration_millis(Duration::from_secs(2)), 2000);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }
}
