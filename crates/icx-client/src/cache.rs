//! Time-bounded response cache owned by a [`crate::TaxApiClient`].
//!
//! Entries expire lazily: an expired entry is removed when it is next
//! looked up, never by a background sweeper. The cached value is the exact
//! `(status, body)` pair first observed, error encodings included.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::types::ApiResponse;

/// Concurrency-safe TTL cache keyed by lookup parameters.
///
/// The lock is held only for map access, never across an `.await`.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, ApiResponse)>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the live entry for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<ApiResponse> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((stored_at, resp)) if stored_at.elapsed() < self.ttl => Some(resp.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, resp: ApiResponse) {
        self.entries.lock().insert(key, (Instant::now(), resp));
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
