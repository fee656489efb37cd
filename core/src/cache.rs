//! Tick-based expiring cache
//!
//! Time is an integer tick counter advanced by [`TickCache::tick`]. Entries
//! record the tick they were last touched; every `sweep_interval` ticks the
//! cache drops entries idle for longer than `lifetime`.

use std::fmt;
use std::hash::Hash;

use hashbrown::HashMap;

/// Default idle lifetime in ticks
pub const DEFAULT_LIFETIME_TICKS: u64 = 300;
/// Default sweep interval in ticks
pub const DEFAULT_SWEEP_INTERVAL_TICKS: u64 = 60;

struct Entry<V> {
    value: V,
    last_touched: u64,
    invalidated: bool,
}

impl<V> Entry<V> {
    #[inline]
    fn expired_at(&self, now: u64, lifetime: u64) -> bool {
        self.invalidated || self.last_touched.saturating_add(lifetime) < now
    }
}

type EvictFn<V> = Box<dyn FnMut(V) + Send>;

/// Cache whose entries expire after a number of idle ticks.
pub struct TickCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    now: u64,
    lifetime: u64,
    sweep_interval: u64,
    on_evict: Option<EvictFn<V>>,
}

impl<K, V> fmt::Debug for TickCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickCache")
            .field("len", &self.entries.len())
            .field("now", &self.now)
            .field("lifetime", &self.lifetime)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl<K: Hash + Eq, V> Default for TickCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_LIFETIME_TICKS, DEFAULT_SWEEP_INTERVAL_TICKS)
    }
}

impl<K: Hash + Eq, V> TickCache<K, V> {
    /// A `sweep_interval` of 0 is treated as 1.
    pub fn new(lifetime: u64, sweep_interval: u64) -> Self {
        Self {
            entries: HashMap::new(),
            now: 0,
            lifetime,
            sweep_interval: sweep_interval.max(1),
            on_evict: None,
        }
    }

    /// Install a callback that receives every evicted or cleared value
    pub fn with_eviction(mut self, on_evict: impl FnMut(V) + Send + 'static) -> Self {
        self.on_evict = Some(Box::new(on_evict));
        self
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// A hit refreshes the entry's lifetime.
    pub fn get_or_insert_with(&mut self, key: K, factory: impl FnOnce() -> V) -> V
    where
        V: Clone,
    {
        let now = self.now;
        let entry = self.entries.entry(key).or_insert_with(|| Entry {
            value: factory(),
            last_touched: now,
            invalidated: false,
        });
        entry.last_touched = now;
        entry.value.clone()
    }

    /// Cached value for `key`, refreshing its lifetime on a hit
    pub fn get(&mut self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let now = self.now;
        self.entries.get_mut(key).map(|entry| {
            entry.last_touched = now;
            entry.value.clone()
        })
    }

    /// Refresh an entry's lifetime. Returns whether the key was present.
    pub fn touch(&mut self, key: &K) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_touched = self.now;
                true
            }
            None => false,
        }
    }

    /// Mark an entry expired; the next sweep evicts it.
    pub fn invalidate(&mut self, key: &K) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.invalidated = true;
        }
    }

    /// Remove an entry without running the eviction callback
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Advance the clock one tick, sweeping expired entries on interval boundaries.
    ///
    /// Returns the number of evicted entries.
    pub fn tick(&mut self) -> usize {
        self.now += 1;
        if self.now % self.sweep_interval != 0 {
            return 0;
        }

        let (now, lifetime) = (self.now, self.lifetime);
        let mut evicted = 0;
        for (_, entry) in self
            .entries
            .extract_if(|_, entry| entry.expired_at(now, lifetime))
        {
            evicted += 1;
            if let Some(on_evict) = self.on_evict.as_mut() {
                on_evict(entry.value);
            }
        }
        if evicted > 0 {
            tracing::trace!(evicted, remaining = self.entries.len(), now, "cache sweep");
        }
        evicted
    }

    /// Evict everything, running the eviction callback on each value
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            if let Some(on_evict) = self.on_evict.as_mut() {
                on_evict(entry.value);
            }
        }
    }
}

impl<K, V> Drop for TickCache<K, V> {
    fn drop(&mut self) {
        if let Some(on_evict) = self.on_evict.as_mut() {
            for (_, entry) in self.entries.drain() {
                on_evict(entry.value);
            }
        }
    }
}
