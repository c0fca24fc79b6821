//! Ephemeral token store
//!
//! Maps bearer token values to owning usernames. The durable backend is
//! redis (cross-process sharing, automatic TTL expiry); when redis is
//! unreachable the store degrades to an in-process map for the remainder
//! of the process lifetime.
//!
//! Degradation is sticky: the backend is selected once, lazily, by a
//! connectivity probe on first use, and any failed probe or failed redis
//! operation flips a single `degraded` flag. There is no per-call retry
//! against a known-bad backend and no recovery probe. The flag is a
//! relaxed atomic; races cost at most one extra failed redis attempt.
//!
//! Accepted degradation: the in-memory fallback has no TTL enforcement,
//! so tokens held there live until `delete`/`clear` or process exit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Default token lifetime: 24 hours
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Bound on every redis operation, probe included
const OP_TIMEOUT: Duration = Duration::from_secs(2);

const KEY_PREFIX: &str = "token:";

/// Durable-preferred, memory-fallback store for ephemeral bearer tokens
pub struct TokenStore {
    client: Option<redis::Client>,
    conn: OnceCell<Option<MultiplexedConnection>>,
    degraded: AtomicBool,
    fallback: RwLock<HashMap<String, String>>,
    default_ttl: u64,
}

impl TokenStore {
    /// Create a store backed by redis at `redis_url`
    ///
    /// The connection is not established here; the first operation runs a
    /// PING probe and settles on a backend. An unparseable URL degrades
    /// immediately.
    pub fn new(redis_url: Option<&str>) -> Self {
        let client = match redis_url {
            Some(url) => match redis::Client::open(url) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "invalid redis URL, token store will use memory only");
                    None
                }
            },
            None => {
                info!("no redis configured, token store will use memory only");
                None
            }
        };

        let degraded = client.is_none();
        Self {
            client,
            conn: OnceCell::new(),
            degraded: AtomicBool::new(degraded),
            fallback: RwLock::new(HashMap::new()),
            default_ttl: DEFAULT_TTL_SECS,
        }
    }

    /// Memory-only store (tests, redis-less deployments)
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Whether the store has fallen back to in-process storage
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn redis_key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, token)
    }

    fn degrade(&self, op: &str, err: &dyn std::fmt::Display) {
        error!(op = op, error = %err, "redis operation failed, falling back to memory store");
        self.degraded.store(true, Ordering::Relaxed);
    }

    /// Resolve the active redis connection, probing on first use
    async fn backend(&self) -> Option<MultiplexedConnection> {
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        let client = self.client.as_ref()?;

        let conn = self
            .conn
            .get_or_init(|| async {
                let mut conn = match timeout(OP_TIMEOUT, client.get_multiplexed_async_connection())
                    .await
                {
                    Ok(Ok(conn)) => conn,
                    Ok(Err(e)) => {
                        warn!(error = %e, "redis connection failed, using memory store");
                        return None;
                    }
                    Err(_) => {
                        warn!("redis connection timed out, using memory store");
                        return None;
                    }
                };

                let pong: Result<redis::RedisResult<String>, _> =
                    timeout(OP_TIMEOUT, redis::cmd("PING").query_async(&mut conn)).await;
                match pong {
                    Ok(Ok(_)) => {
                        info!("token store using redis backend");
                        Some(conn)
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "redis ping failed, using memory store");
                        None
                    }
                    Err(_) => {
                        warn!("redis ping timed out, using memory store");
                        None
                    }
                }
            })
            .await;

        match conn {
            Some(conn) => Some(conn.clone()),
            None => {
                self.degraded.store(true, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a token for an owner
    ///
    /// Never fails the caller: a redis error degrades the store and the
    /// entry lands in the in-process map instead.
    pub async fn set(&self, token: &str, owner: &str, ttl_secs: Option<u64>) {
        let ttl = ttl_secs.unwrap_or(self.default_ttl);

        if let Some(mut conn) = self.backend().await {
            match timeout(
                OP_TIMEOUT,
                conn.set_ex::<_, _, ()>(Self::redis_key(token), owner, ttl),
            )
            .await
            {
                Ok(Ok(())) => return,
                Ok(Err(e)) => self.degrade("set", &e),
                Err(e) => self.degrade("set", &e),
            }
        }

        self.fallback
            .write()
            .unwrap()
            .insert(token.to_string(), owner.to_string());
    }

    /// Resolve a token to its owner
    pub async fn get(&self, token: &str) -> Option<String> {
        if let Some(mut conn) = self.backend().await {
            match timeout(
                OP_TIMEOUT,
                conn.get::<_, Option<String>>(Self::redis_key(token)),
            )
            .await
            {
                Ok(Ok(owner)) => return owner,
                Ok(Err(e)) => self.degrade("get", &e),
                Err(e) => self.degrade("get", &e),
            }
        }

        self.fallback.read().unwrap().get(token).cloned()
    }

    pub async fn has(&self, token: &str) -> bool {
        if let Some(mut conn) = self.backend().await {
            match timeout(OP_TIMEOUT, conn.exists::<_, bool>(Self::redis_key(token))).await {
                Ok(Ok(exists)) => return exists,
                Ok(Err(e)) => self.degrade("exists", &e),
                Err(e) => self.degrade("exists", &e),
            }
        }

        self.fallback.read().unwrap().contains_key(token)
    }

    /// Remove a token; true iff a record existed
    pub async fn delete(&self, token: &str) -> bool {
        if let Some(mut conn) = self.backend().await {
            match timeout(OP_TIMEOUT, conn.del::<_, i64>(Self::redis_key(token))).await {
                Ok(Ok(removed)) => return removed > 0,
                Ok(Err(e)) => self.degrade("del", &e),
                Err(e) => self.degrade("del", &e),
            }
        }

        self.fallback.write().unwrap().remove(token).is_some()
    }

    /// Remove every token from the active backend only
    pub async fn clear(&self) {
        if let Some(mut conn) = self.backend().await {
            let keys: Result<redis::RedisResult<Vec<String>>, _> = timeout(
                OP_TIMEOUT,
                conn.keys(format!("{}*", KEY_PREFIX)),
            )
            .await;
            match keys {
                Ok(Ok(keys)) => {
                    if keys.is_empty() {
                        return;
                    }
                    match timeout(OP_TIMEOUT, conn.del::<_, i64>(keys)).await {
                        Ok(Ok(_)) => return,
                        Ok(Err(e)) => self.degrade("clear", &e),
                        Err(e) => self.degrade("clear", &e),
                    }
                }
                Ok(Err(e)) => self.degrade("clear", &e),
                Err(e) => self.degrade("clear", &e),
            }
        }

        self.fallback.write().unwrap().clear();
    }

    /// Best-effort TTL refresh; no-op under the in-memory fallback
    pub async fn expire(&self, token: &str, ttl_secs: Option<u64>) {
        let ttl = ttl_secs.unwrap_or(self.default_ttl);

        if let Some(mut conn) = self.backend().await {
            match timeout(
                OP_TIMEOUT,
                conn.expire::<_, i64>(Self::redis_key(token), ttl as i64),
            )
            .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => self.degrade("expire", &e),
                Err(e) => self.degrade("expire", &e),
            }
        }
    }
}
