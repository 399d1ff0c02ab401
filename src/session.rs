//! Session lookup for transport layers.
//!
//! Maps opaque session keys to values (normally [`crate::Player`] handles)
//! and forgets entries that sit idle longer than a time-to-live. The match
//! core never touches this; it exists so a transport can find a player's
//! endpoints from a cookie or token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use derive_more::Display;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Session store failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionError {
    /// The key is already taken.
    #[display("session key already in use: {}", _0)]
    DuplicateKey(String),
    /// The key is not present.
    #[display("unknown session key: {}", _0)]
    UnknownKey(String),
}

impl std::error::Error for SessionError {}

/// Key-value store with idle expiry.
pub trait SessionStore<V>: Send + Sync {
    /// Inserts a new entry. Fails if the key exists.
    fn put(&self, key: String, value: V) -> Result<(), SessionError>;

    /// Returns the value and refreshes its last access.
    fn get(&self, key: &str) -> Option<V>;

    /// Moves an entry to a new key, refreshing its last access.
    fn rekey(&self, old: &str, new: String) -> Result<(), SessionError>;

    /// Removes an entry.
    fn remove(&self, key: &str) -> Option<V>;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    last_access: Instant,
}

type Entries<V> = Mutex<HashMap<String, Entry<V>>>;

/// In-memory [`SessionStore`] with a background sweeper.
#[derive(Debug, Clone)]
pub struct TtlSessionStore<V> {
    entries: Arc<Entries<V>>,
    ttl: Duration,
}

impl<V> TtlSessionStore<V>
where
    V: Clone + Send + 'static,
{
    /// Creates a store and spawns its sweeper on the current runtime.
    ///
    /// The sweeper stops once every handle to the store is dropped.
    #[instrument]
    pub fn new(ttl: Duration, sweep_every: Duration) -> Self {
        info!("Creating session store");
        let store = Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        };
        let entries = Arc::downgrade(&store.entries);
        tokio::spawn(sweep_loop(entries, ttl, sweep_every));
        store
    }

    /// Evicts entries idle longer than the TTL. Returns how many went.
    pub fn sweep(&self) -> usize {
        evict_idle(&self.entries, self.ttl)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn sweep_loop<V>(entries: Weak<Entries<V>>, ttl: Duration, every: Duration) {
    let mut ticks = tokio::time::interval(every);
    ticks.tick().await;
    loop {
        ticks.tick().await;
        let Some(entries) = entries.upgrade() else {
            debug!("Session store dropped; sweeper exiting");
            return;
        };
        evict_idle(&entries, ttl);
    }
}

fn evict_idle<V>(entries: &Entries<V>, ttl: Duration) -> usize {
    let now = Instant::now();
    let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
    let before = entries.len();
    entries.retain(|_, entry| now.duration_since(entry.last_access) <= ttl);
    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, remaining = entries.len(), "Evicted idle sessions");
    }
    evicted
}

impl<V> SessionStore<V> for TtlSessionStore<V>
where
    V: Clone + Send + 'static,
{
    #[instrument(skip(self, value))]
    fn put(&self, key: String, value: V) -> Result<(), SessionError> {
        let mut entries = self.entries();
        if entries.contains_key(&key) {
            warn!("Session key already in use");
            return Err(SessionError::DuplicateKey(key));
        }
        entries.insert(
            key,
            Entry {
                value,
                last_access: Instant::now(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries();
        let entry = entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.value.clone())
    }

    #[instrument(skip(self))]
    fn rekey(&self, old: &str, new: String) -> Result<(), SessionError> {
        let mut entries = self.entries();
        if entries.contains_key(&new) {
            return Err(SessionError::DuplicateKey(new));
        }
        let mut entry = entries
            .remove(old)
            .ok_or_else(|| SessionError::UnknownKey(old.to_string()))?;
        entry.last_access = Instant::now();
        entries.insert(new, entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.entries().remove(key).map(|entry| entry.value)
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}
