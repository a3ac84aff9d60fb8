use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub text: String,
    pub content_type: String,
    stored_at: Instant,
}

/// Last known-good upstream responses for the proxy hop, keyed by a digest of
/// the incoming request. Bounded, TTL-expired on read, oldest-first eviction.
/// Shared across requests on a warm instance; a read-then-write race stores
/// the same derivation twice, which is harmless.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<CacheState>>,
    ttl: Duration,
}

struct CacheState {
    capacity: usize,
    entries: HashMap<String, CachedResponse>,
    order: Vec<String>,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                capacity: capacity.max(1),
                entries: HashMap::new(),
                order: Vec::new(),
            })),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut state = self.inner.lock().expect("response cache mutex poisoned");
        match state.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.clone()),
            Some(_) => {
                state.entries.remove(key);
                state.order.retain(|k| k != key);
                None
            }
            None => None,
        }
    }

    pub fn store(&self, key: String, text: String, content_type: String) {
        let mut state = self.inner.lock().expect("response cache mutex poisoned");
        if !state.entries.contains_key(&key) {
            while state.entries.len() >= state.capacity {
                if state.order.is_empty() {
                    break;
                }
                let oldest = state.order.remove(0);
                state.entries.remove(&oldest);
            }
            state.order.push(key.clone());
        }
        state.entries.insert(
            key,
            CachedResponse {
                text,
                content_type,
                stored_at: Instant::now(),
            },
        );
    }
}
