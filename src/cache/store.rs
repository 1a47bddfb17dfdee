//! Key-value store backends behind the prediction cache.
//!
//! The client in `client.rs` owns timeouts, metrics and degradation; a
//! backend only moves strings in and out of its store.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl CacheStoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn command(err: impl std::fmt::Display) -> Self {
        Self::Command(err.to_string())
    }
}

/// Statistics reported by the store itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreInfo {
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub used_memory_bytes: u64,
    pub used_memory_human: Option<String>,
    pub evicted_keys: u64,
    pub connected_clients: Option<u64>,
    pub server_version: Option<String>,
    pub uptime_seconds: Option<u64>,
}

/// A TTL-capable key-value store.
///
/// `get_many` results are index-aligned with the requested keys. Patterns
/// use Redis glob syntax (`*`, `?`, `[...]` classes, `\` escapes) and are
/// matched against full store keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut values = self.get_many(&[key.to_string()]).await?;
        Ok(values.pop().flatten())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheStoreError> {
        self.set_many(&[(key.to_string(), value.to_string())], ttl)
            .await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheStoreError>;

    async fn set_many(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheStoreError>;

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheStoreError>;

    async fn info(&self) -> Result<StoreInfo, CacheStoreError>;

    async fn ping(&self) -> Result<(), CacheStoreError>;
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process LRU store for development and tests.
///
/// Expired entries are dropped lazily on access.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, MemoryEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    started_at: Instant,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "memory_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, entries: &mut LruCache<String, MemoryEntry>, key: &str) -> Option<String> {
        let now = Instant::now();
        let found = match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheStoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "memory_get_many");
        Ok(keys
            .iter()
            .map(|key| self.lookup(&mut entries, key))
            .collect())
    }

    async fn set_many(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let expires_at = Instant::now() + ttl;
        let mut store = rw_write(&self.entries, SOURCE, "memory_set_many");
        for (key, value) in entries {
            let displaced = store.push(
                key.clone(),
                MemoryEntry {
                    value: value.clone(),
                    expires_at,
                },
            );
            if let Some((displaced_key, _)) = displaced
                && displaced_key != *key
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheStoreError> {
        let pattern = GlobPattern::new(pattern);
        let mut store = rw_write(&self.entries, SOURCE, "memory_delete_matching");
        let doomed: Vec<String> = store
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            store.pop(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn info(&self) -> Result<StoreInfo, CacheStoreError> {
        let store = rw_read(&self.entries, SOURCE, "memory_info");
        let used_memory_bytes = store
            .iter()
            .map(|(key, entry)| (key.len() + entry.value.len()) as u64)
            .sum();

        Ok(StoreInfo {
            keyspace_hits: self.hits.load(Ordering::Relaxed),
            keyspace_misses: self.misses.load(Ordering::Relaxed),
            used_memory_bytes,
            used_memory_human: None,
            evicted_keys: self.evictions.load(Ordering::Relaxed),
            connected_clients: None,
            server_version: None,
            uptime_seconds: Some(self.started_at.elapsed().as_secs()),
        })
    }

    async fn ping(&self) -> Result<(), CacheStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobToken {
    Any,
    One,
    Literal(char),
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
}

impl GlobToken {
    fn accepts(&self, c: char) -> bool {
        match self {
            Self::Any | Self::One => true,
            Self::Literal(literal) => *literal == c,
            Self::Class { negated, ranges } => {
                ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c)) != *negated
            }
        }
    }
}

/// A key pattern with the same syntax Redis `SCAN MATCH` accepts: `*`, `?`,
/// `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.
///
/// An unterminated class runs to the end of the pattern and reversed ranges
/// are swapped, as Redis does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GlobPattern {
    tokens: Vec<GlobToken>,
}

impl GlobPattern {
    pub(crate) fn new(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    if tokens.last() != Some(&GlobToken::Any) {
                        tokens.push(GlobToken::Any);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(GlobToken::One);
                    i += 1;
                }
                '\\' if i + 1 < chars.len() => {
                    tokens.push(GlobToken::Literal(chars[i + 1]));
                    i += 2;
                }
                '[' => {
                    i += 1;
                    let negated = chars.get(i) == Some(&'^');
                    if negated {
                        i += 1;
                    }
                    let mut ranges = Vec::new();
                    while i < chars.len() && chars[i] != ']' {
                        if chars[i] == '\\' && i + 1 < chars.len() {
                            ranges.push((chars[i + 1], chars[i + 1]));
                            i += 2;
                        } else if i + 2 < chars.len() && chars[i + 1] == '-' {
                            let (a, b) = (chars[i], chars[i + 2]);
                            ranges.push((a.min(b), a.max(b)));
                            i += 3;
                        } else {
                            ranges.push((chars[i], chars[i]));
                            i += 1;
                        }
                    }
                    // skip the closing bracket when there is one
                    i += 1;
                    tokens.push(GlobToken::Class { negated, ranges });
                }
                literal => {
                    tokens.push(GlobToken::Literal(literal));
                    i += 1;
                }
            }
        }

        Self { tokens }
    }

    pub(crate) fn matches(&self, text: &str) -> bool {
        let tokens = &self.tokens;
        let text: Vec<char> = text.chars().collect();

        let (mut p, mut t) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match tokens.get(p) {
                Some(GlobToken::Any) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(token) if token.accepts(text[t]) => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((star_p, star_t)) => {
                        p = star_p + 1;
                        t = star_t + 1;
                        backtrack = Some((star_p, star_t + 1));
                    }
                    None => return false,
                },
            }
        }

        tokens[p.min(tokens.len())..]
            .iter()
            .all(|token| *token == GlobToken::Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> MemoryStore {
        MemoryStore::new(NonZeroUsize::new(capacity).expect("non-zero capacity"))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = store(8);
        store
            .set("a", "1.5", Duration::from_secs(60))
            .await
            .expect("set");
        assert_eq!(store.get("a").await.expect("get"), Some("1.5".to_string()));
        assert_eq!(store.get("b").await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let store = store(8);
        store
            .set("a", "1", Duration::from_millis(0))
            .await
            .expect("set");
        assert_eq!(store.get("a").await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_many_is_index_aligned() {
        let store = store(8);
        let entries = vec![
            ("k1".to_string(), "1".to_string()),
            ("k3".to_string(), "3".to_string()),
        ];
        store
            .set_many(&entries, Duration::from_secs(60))
            .await
            .expect("set_many");

        let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];
        let values = store.get_many(&keys).await.expect("get_many");
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn capacity_pressure_counts_evictions() {
        let store = store(2);
        let ttl = Duration::from_secs(60);
        store.set("a", "1", ttl).await.expect("set");
        store.set("b", "2", ttl).await.expect("set");
        store.set("b", "3", ttl).await.expect("overwrite is not an eviction");
        store.set("c", "4", ttl).await.expect("set");

        let info = store.info().await.expect("info");
        assert_eq!(info.evicted_keys, 1);
        assert_eq!(store.get("a").await.expect("get"), None);
    }

    #[tokio::test]
    async fn info_reports_hits_and_misses() {
        let store = store(4);
        store
            .set("a", "1", Duration::from_secs(60))
            .await
            .expect("set");
        let _ = store.get("a").await;
        let _ = store.get("a").await;
        let _ = store.get("missing").await;

        let info = store.info().await.expect("info");
        assert_eq!(info.keyspace_hits, 2);
        assert_eq!(info.keyspace_misses, 1);
        assert_eq!(info.used_memory_bytes, 2);
    }

    #[tokio::test]
    async fn delete_matching_respects_pattern() {
        let store = store(8);
        let ttl = Duration::from_secs(60);
        store.set("svc:score:1", "1", ttl).await.expect("set");
        store.set("svc:score:2", "2", ttl).await.expect("set");
        store.set("svc:cluster:1", "3", ttl).await.expect("set");

        let removed = store.delete_matching("svc:score:*").await.expect("delete");
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
    }

    fn glob_match(pattern: &str, text: &str) -> bool {
        GlobPattern::new(pattern).matches(text)
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("svc:*", "svc:score:abc"));
        assert!(glob_match("svc:*:abc", "svc:score:abc"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
        assert!(!glob_match("svc:cluster:*", "svc:score:abc"));
        assert!(glob_match("", ""));
        assert!(!glob_match("", "a"));
        assert!(glob_match("a**b", "axyb"));
    }

    #[test]
    fn glob_classes_follow_redis() {
        assert!(glob_match("h[ae]llo", "hello"));
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[ae]llo", "hillo"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("score:[a-c]*", "score:b9"));
        assert!(!glob_match("score:[a-c]*", "score:d9"));
        assert!(glob_match("[c-a]", "b"));
        assert!(glob_match("[\\]]x", "]x"));
        assert!(!glob_match("[]", "a"));
        assert!(glob_match("ab[cd", "abc"));
    }

    #[test]
    fn glob_escapes_match_literally() {
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
        assert!(glob_match("a\\?", "a?"));
        assert!(!glob_match("a\\?", "ab"));
        assert!(glob_match("a\\", "a\\"));
    }

    #[tokio::test]
    async fn delete_matching_honours_classes() {
        let store = store(8);
        let ttl = Duration::from_secs(60);
        for key in ["svc:score:a1", "svc:score:b2", "svc:score:f3"] {
            store.set(key, "1", ttl).await.expect("set");
        }

        let removed = store
            .delete_matching("svc:score:[a-c]*")
            .await
            .expect("delete");
        assert_eq!(removed, 2);
        assert_eq!(store.get("svc:score:f3").await.expect("get"), Some("1".to_string()));
    }
}
