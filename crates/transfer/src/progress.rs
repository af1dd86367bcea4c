//! Key/set store with expiry that records which chunks have arrived.
//!
//! [`ProgressTracker`] is the contract of the external cache (set members,
//! expiry, and an atomic set-if-absent used for locks). The in-memory
//! [`MemoryProgressTracker`] backs single-process deployments and tests.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Errors produced by a progress tracker backend.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker unavailable: {0}")]
    Unavailable(String),

    #[error("wrong value type for key {0}")]
    WrongType(String),
}

/// A boxed future returned by tracker methods.
pub type TrackerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TrackerError>> + Send + 'a>>;

/// Abstract key/set store with per-key expiry.
pub trait ProgressTracker: Send + Sync {
    /// Adds `member` to the set at `key`, creating the set if needed.
    fn add_member<'a>(&'a self, key: &'a str, member: &'a str) -> TrackerFuture<'a, ()>;

    /// Returns the members of the set at `key` (empty if absent or expired).
    fn members<'a>(&'a self, key: &'a str) -> TrackerFuture<'a, Vec<String>>;

    /// (Re)sets the time-to-live of `key`. Returns `false` if the key is absent.
    fn set_expiry<'a>(&'a self, key: &'a str, ttl: Duration) -> TrackerFuture<'a, bool>;

    /// Removes `key` regardless of its type.
    fn delete_key<'a>(&'a self, key: &'a str) -> TrackerFuture<'a, ()>;

    /// Atomically stores `value` at `key` with `ttl` unless the key exists.
    ///
    /// Returns `true` if the value was stored.
    fn set_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> TrackerFuture<'a, bool>;

    /// Atomically removes `key` only if it currently holds `value`.
    fn delete_if_equals<'a>(&'a self, key: &'a str, value: &'a str) -> TrackerFuture<'a, bool>;
}

#[derive(Debug)]
enum Value {
    Set(BTreeSet<String>),
    Text(String),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process tracker. Expired keys are dropped lazily on access and by
/// [`purge_expired`](MemoryProgressTracker::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryProgressTracker {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Removes `key` if it has expired.
fn evict_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

impl ProgressTracker for MemoryProgressTracker {
    fn add_member<'a>(&'a self, key: &'a str, member: &'a str) -> TrackerFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            evict_expired(&mut entries, key, Instant::now());
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Set(BTreeSet::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Set(set) => {
                    set.insert(member.to_string());
                    Ok(())
                }
                Value::Text(_) => Err(TrackerError::WrongType(key.to_string())),
            }
        })
    }

    fn members<'a>(&'a self, key: &'a str) -> TrackerFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            evict_expired(&mut entries, key, Instant::now());
            match entries.get(key) {
                None => Ok(Vec::new()),
                Some(Entry {
                    value: Value::Set(set),
                    ..
                }) => Ok(set.iter().cloned().collect()),
                Some(_) => Err(TrackerError::WrongType(key.to_string())),
            }
        })
    }

    fn set_expiry<'a>(&'a self, key: &'a str, ttl: Duration) -> TrackerFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            evict_expired(&mut entries, key, now);
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Some(now + ttl);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete_key<'a>(&'a self, key: &'a str) -> TrackerFuture<'a, ()> {
        Box::pin(async move {
            self.entries.lock().await.remove(key);
            Ok(())
        })
    }

    fn set_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> TrackerFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            evict_expired(&mut entries, key, now);
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Text(value.to_string()),
                    expires_at: Some(now + ttl),
                },
            );
            Ok(true)
        })
    }

    fn delete_if_equals<'a>(&'a self, key: &'a str, value: &'a str) -> TrackerFuture<'a, bool> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            evict_expired(&mut entries, key, Instant::now());
            let matches = matches!(
                entries.get(key),
                Some(Entry { value: Value::Text(current), .. }) if current == value
            );
            if matches {
                entries.remove(key);
            }
            Ok(matches)
        })
    }
}
