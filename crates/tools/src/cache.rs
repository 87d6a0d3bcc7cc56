//! In-memory retrieval cache shared by the fetch and render tools.
//!
//! Entries live for a fixed TTL. Expiry is checked when an entry is read;
//! nothing sweeps in the background. The map sits behind a mutex so the
//! cache can be shared between tasks, though tool calls run one at a time.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::page::PageSnapshot;

/// Which tool produced an entry; fetch and render never share entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Fetch,
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub url: String,
}

impl CacheKey {
    pub fn new(kind: CacheKind, url: impl Into<String>) -> Self {
        Self { kind, url: url.into() }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    inserted_at: Instant,
    page: PageSnapshot,
}

pub struct RetrievalCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl RetrievalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The stored page, unless it is older than the TTL (then it is dropped).
    pub fn get(&self, key: &CacheKey) -> Option<PageSnapshot> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.page.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, page: PageSnapshot) {
        let entry = CacheEntry {
            inserted_at: Instant::now(),
            page,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pretend an entry was stored `age` ago.
    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &CacheKey, age: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            if let Some(earlier) = Instant::now().checked_sub(age) {
                entry.inserted_at = earlier;
            }
        }
    }
}
