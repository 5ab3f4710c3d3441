//! TTL cache for fetched tables with per-key request coalescing.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    in_flight: HashSet<K>,
}

/// Thread-safe cache keyed by `K`.
///
/// Only successful results are stored. While a producer for a key is running,
/// other callers for that key block until it finishes, then read the cached
/// value or, if the producer failed, run their own.
pub struct FetchCache<K, V> {
    ttl: Duration,
    state: Mutex<State<K, V>>,
    ready: Condvar,
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashSet::new(),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(state: &State<K, V>, key: &K) -> Option<V> {
        state
            .entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut state = self.lock();
        state.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Return the cached value for `key`, or run `producer` and cache its
    /// success.
    ///
    /// The boolean is `true` on a cache hit.
    pub fn get_or_fetch<E, F>(&self, key: K, producer: F) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        {
            let mut state = self.lock();
            loop {
                if let Some(value) = Self::fresh(&state, &key) {
                    return Ok((value, true));
                }
                if !state.in_flight.contains(&key) {
                    // expired entries only go away on a miss
                    let now = Instant::now();
                    state.entries.retain(|_, e| e.expires_at > now);
                    state.in_flight.insert(key.clone());
                    break;
                }
                state = self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        let guard = InFlightGuard { cache: self, key };
        let value = producer()?;
        self.insert(guard.key.clone(), value.clone());
        drop(guard);
        Ok((value, false))
    }
}

#[cfg(test)]
impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        let state = self.lock();
        Self::fresh(&state, key)
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears the in-flight marker and wakes waiters, including on unwind.
struct InFlightGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    cache: &'a FetchCache<K, V>,
    key: K,
}

impl<K, V> Drop for InFlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        let mut state = self.cache.lock();
        state.in_flight.remove(&self.key);
        drop(state);
        self.cache.ready.notify_all();
    }
}
