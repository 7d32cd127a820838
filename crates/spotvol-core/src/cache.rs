//! Short-lived, single-flight memoization of expensive service calls.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Whether a lookup was served from the cache or computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
    generation: u64,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).and_then(|entry| {
            if Instant::now() < entry.expires_at {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    fn put(&mut self, key: K, value: V) {
        if self.ttl.is_zero() || self.capacity == 0 {
            return;
        }

        if !self.map.contains_key(&key) && self.map.len() >= self.capacity {
            self.clear_expired();
            if self.map.len() >= self.capacity {
                self.evict_soonest_expiring();
            }
        }

        let expires_at = Instant::now() + self.ttl;
        self.map.insert(key, CacheEntry { value, expires_at });
    }

    fn evict_soonest_expiring(&mut self) {
        let victim = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            self.map.remove(&victim);
        }
    }

    fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
    }
}

type Gates<K> = std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>;

/// Bounded TTL cache with at most one computation in flight per key.
///
/// Entries expire `ttl` after the computation that produced them finished.
/// Failed computations are never stored.
pub struct ResultCache<K, V> {
    inner: Arc<RwLock<CacheInner<K, V>>>,
    gates: Arc<Gates<K>>,
}

impl<K, V> Clone for ResultCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gates: Arc::clone(&self.gates),
        }
    }
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                map: HashMap::new(),
                ttl,
                capacity,
                generation: 0,
            })),
            gates: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.read().await.get(key)
    }

    pub async fn put(&self, key: K, value: V) {
        self.inner.write().await.put(key, value);
    }

    /// Return the live entry for `key`, or run `compute` and store its result.
    ///
    /// Concurrent callers for the same key wait for the running computation
    /// and then read its entry. A result whose computation overlapped an
    /// invalidation is returned but not stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: K,
        compute: F,
    ) -> Result<(V, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            debug!(key = ?key, "cache hit");
            return Ok((value, CacheStatus::Hit));
        }

        let gate = self.gate_for(&key);
        let guard = gate.lock().await;

        let outcome = match self.get(&key).await {
            Some(value) => {
                debug!(key = ?key, "cache hit after waiting on in-flight computation");
                Ok((value, CacheStatus::Hit))
            }
            None => {
                debug!(key = ?key, "cache miss");
                let generation = self.inner.read().await.generation;
                match compute().await {
                    Ok(value) => {
                        let mut inner = self.inner.write().await;
                        if inner.generation == generation {
                            inner.put(key.clone(), value.clone());
                        }
                        Ok((value, CacheStatus::Miss))
                    }
                    Err(error) => Err(error),
                }
            }
        };

        drop(guard);
        self.release_gate(&key, &gate);
        outcome
    }

    fn gate_for(&self, key: &K) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            gates
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn release_gate(&self, key: &K, gate: &Arc<Mutex<()>>) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(gate) <= 2 {
            gates.remove(key);
        }
    }

    /// Drop every entry whose key matches `predicate`.
    pub async fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut inner = self.inner.write().await;
        let before = inner.map.len();
        inner.map.retain(|key, _| !predicate(key));
        inner.generation = inner.generation.wrapping_add(1);
        before - inner.map.len()
    }

    pub async fn clear_expired(&self) {
        self.inner.write().await.clear_expired();
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.map.clear();
        inner.generation = inner.generation.wrapping_add(1);
    }

    /// Number of entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live entries with their remaining lifetime, soonest-expiring first.
    pub async fn entries(&self) -> Vec<(K, Duration)> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        let mut entries: Vec<(K, Duration)> = inner
            .map
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, entry)| (key.clone(), entry.expires_at - now))
            .collect();
        entries.sort_by_key(|(_, remaining)| *remaining);
        entries
    }

    pub async fn ttl(&self) -> Duration {
        self.inner.read().await.ttl
    }
}
