//! Redis-backed cache store.
//!
//! The connection is established lazily. After a failed attempt further
//! attempts are suppressed for a short backoff so an absent server does not
//! add a connect timeout to every request. Once established, the connection
//! manager reconnects on its own.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::store::{CacheStore, CacheStoreError, StoreInfo};

const SCAN_BATCH: usize = 100;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Default)]
struct ConnectionSlot {
    manager: Option<ConnectionManager>,
    last_failure: Option<Instant>,
    connecting_since: Option<Instant>,
}

pub struct RedisStore {
    client: Client,
    slot: Mutex<ConnectionSlot>,
    connect_timeout: Duration,
}

impl RedisStore {
    /// Parse the connection URL. No network traffic happens here.
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, CacheStoreError> {
        let client = Client::open(url).map_err(CacheStoreError::unavailable)?;
        Ok(Self {
            client,
            slot: Mutex::new(ConnectionSlot::default()),
            connect_timeout,
        })
    }

    /// Only one caller connects at a time and it does so without holding the
    /// slot lock; everyone else fails fast until the attempt settles.
    async fn connection(&self) -> Result<ConnectionManager, CacheStoreError> {
        {
            let mut slot = self.slot.lock().await;
            if let Some(manager) = slot.manager.as_ref() {
                return Ok(manager.clone());
            }

            if let Some(failed_at) = slot.last_failure
                && failed_at.elapsed() < RECONNECT_BACKOFF
            {
                return Err(CacheStoreError::Unavailable(
                    "redis connection backing off after failure".to_string(),
                ));
            }

            // a cancelled attempt never clears the marker, so it expires instead
            if let Some(started) = slot.connecting_since
                && started.elapsed() < self.connect_timeout
            {
                return Err(CacheStoreError::Unavailable(
                    "redis connection attempt in progress".to_string(),
                ));
            }
            slot.connecting_since = Some(Instant::now());
        }

        let attempt = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await;

        let mut slot = self.slot.lock().await;
        slot.connecting_since = None;
        let manager = match attempt {
            Ok(Ok(manager)) => manager,
            Ok(Err(err)) => {
                slot.last_failure = Some(Instant::now());
                warn!(target = "scorecast::cache", error = %err, "redis connection failed");
                return Err(CacheStoreError::unavailable(err));
            }
            Err(_) => {
                slot.last_failure = Some(Instant::now());
                warn!(
                    target = "scorecast::cache",
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "redis connection timed out"
                );
                return Err(CacheStoreError::Timeout(self.connect_timeout));
            }
        };

        info!(target = "scorecast::cache", "redis connection established");
        slot.last_failure = None;
        slot.manager = Some(manager.clone());
        Ok(manager)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(CacheStoreError::command)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheStoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds(ttl))
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(CacheStoreError::command)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheStoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key);
        }
        pipe.query_async(&mut conn)
            .await
            .map_err(CacheStoreError::command)
    }

    async fn set_many(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let seconds = ttl_seconds(ttl);
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set_ex(key, value, seconds).ignore();
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(CacheStoreError::command)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheStoreError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(CacheStoreError::command)?;

            if !batch.is_empty() {
                let removed: u64 = redis::cmd("DEL")
                    .arg(&batch)
                    .query_async(&mut conn)
                    .await
                    .map_err(CacheStoreError::command)?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(deleted)
    }

    async fn info(&self) -> Result<StoreInfo, CacheStoreError> {
        let mut conn = self.connection().await?;
        let raw: String = redis::cmd("INFO")
            .query_async(&mut conn)
            .await
            .map_err(CacheStoreError::command)?;
        Ok(parse_info(&raw))
    }

    async fn ping(&self) -> Result<(), CacheStoreError> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheStoreError::command)?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheStoreError::Command(format!(
                "unexpected PING reply `{reply}`"
            )))
        }
    }
}

/// SETEX rejects zero; sub-second TTLs round up to one second.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Extract the fields we report from an `INFO` reply.
pub(crate) fn parse_info(raw: &str) -> StoreInfo {
    let fields: HashMap<&str, &str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .collect();

    let number = |name: &str| fields.get(name).and_then(|v| v.trim().parse::<u64>().ok());
    let text = |name: &str| fields.get(name).map(|v| v.trim().to_string());

    StoreInfo {
        keyspace_hits: number("keyspace_hits").unwrap_or(0),
        keyspace_misses: number("keyspace_misses").unwrap_or(0),
        used_memory_bytes: number("used_memory").unwrap_or(0),
        used_memory_human: text("used_memory_human"),
        evicted_keys: number("evicted_keys").unwrap_or(0),
        connected_clients: number("connected_clients"),
        server_version: text("redis_version"),
        uptime_seconds: number("uptime_in_seconds"),
    }
}
