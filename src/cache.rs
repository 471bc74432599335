// src/cache.rs
// TTL result cache with lazy expiration: expired entries are evicted on
// lookup, never by a background sweep. Not LRU-bounded; growth is bounded
// in practice by the low cardinality of query keys.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key -> (value, expiry) store. All read-modify-write sequences happen
/// under one mutex so the cache is safe on a multi-threaded runtime.
#[derive(Debug, Default)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key. An entry past its expiry is treated as absent and
    /// evicted as part of the lookup.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: String, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key, entry);
    }

    /// Drop every entry, returning how many were flushed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let n = entries.len();
        entries.clear();
        n
    }

    /// Raw entry count. Expired-but-never-looked-up keys still count,
    /// which is the documented trade-off of lazy eviction.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deterministic cache key from an operation name and its parameters.
/// Parameter order never affects the key: pairs are sorted before joining.
/// Values are free text (already percent-decoded by the HTTP layer), so
/// the separator characters are escaped to keep distinct queries distinct.
pub fn cache_key(operation: &str, params: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<&str, &str> = params.iter().copied().collect();
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", escape_part(k), escape_part(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{operation}|{joined}")
}

fn escape_part(s: &str) -> String {
    s.replace('%', "%25").replace('&', "%26").replace('=', "%3D")
}
