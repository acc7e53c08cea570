use std::hash::Hash;

use log::debug;

use crate::config::PerfectConfig;
use crate::error::{Result, TableError};
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::map::Map;
use crate::table::empty_options;

/// Maximum number of consecutive full-bucket rebuilds attempted for a
/// single insert before giving up (§7, "pathological collision during
/// rebuild").
const MAX_REBUILD_RETRIES: usize = 8;

/// One bucket's open-addressed, quadratically-sized sub-table.
struct Secondary<K, V> {
    slots: Vec<Option<(K, V)>>,
    count: usize,
}

impl<K, V> Secondary<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new(live_hint: usize) -> Self {
        let cap = quadratic_capacity(live_hint);
        Self {
            slots: empty_options(cap),
            count: 0,
        }
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash as usize) % self.slots.len()
    }

    /// Linear-probes for `key`'s slot or the first empty one. Returns
    /// `true` if the key was placed or overwritten, `false` if the whole
    /// bucket was scanned without finding either (the bucket must be
    /// rebuilt before this can succeed).
    fn try_insert(&mut self, key: &K, value: &V, hash: u64) -> bool {
        let width = self.slots.len();
        let start = self.index(hash);
        for step in 0..width {
            let idx = (start + step) % width;
            match &self.slots[idx] {
                Some((k, _)) if k == key => {
                    self.slots[idx] = Some((key.clone(), value.clone()));
                    return true;
                }
                None => {
                    self.slots[idx] = Some((key.clone(), value.clone()));
                    self.count += 1;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    fn find(&self, key: &K, hash: u64) -> Option<&V> {
        let width = self.slots.len();
        let start = self.index(hash);
        for step in 0..width {
            let idx = (start + step) % width;
            match &self.slots[idx] {
                None => return None,
                Some((k, v)) if k == key => return Some(v),
                _ => {}
            }
        }
        None
    }

    fn remove(&mut self, key: &K, hash: u64) -> bool {
        let width = self.slots.len();
        let start = self.index(hash);
        for step in 0..width {
            let idx = (start + step) % width;
            match &self.slots[idx] {
                None => return false,
                Some((k, _)) if k == key => {
                    self.slots[idx] = None;
                    self.count -= 1;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Collects the live entries and rebuilds the sub-table sized for the
    /// new occupancy (§4.5).
    fn rebuild(&mut self, hash_builder: &DefaultHashBuilder) {
        let entries: Vec<(K, V)> = self.slots.drain(..).flatten().collect();
        self.slots = empty_options(quadratic_capacity(entries.len()));
        self.count = 0;
        for (k, v) in entries {
            let hash = make_hash(hash_builder, &k);
            self.try_insert(&k, &v, hash);
        }
    }

    fn overloaded(&self) -> bool {
        self.count * 2 > self.slots.len()
    }
}

/// `max(2n^2, 4)` slots for `n` live entries (§4.5, "quadratic secondary
/// sizing").
fn quadratic_capacity(n: usize) -> usize {
    (2 * n * n).max(4)
}

/// Top-level bucket array, each routing to a quadratically-sized
/// open-addressed secondary table (§4.5).
pub struct PerfectHashTable<K, V> {
    buckets: Vec<Secondary<K, V>>,
    size: usize,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> PerfectHashTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: PerfectConfig) -> Self {
        let buckets = config.buckets.max(1);
        Self {
            buckets: (0..buckets).map(|_| Secondary::new(0)).collect(),
            size: 0,
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    pub fn with_buckets(buckets: usize) -> Self {
        Self::new(PerfectConfig { buckets })
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) % self.buckets.len()
    }
}

impl<K, V> Map<K, V> for PerfectHashTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        let hash = make_hash(&self.hash_builder, &key);
        let b = self.bucket_index(hash);
        let already_live = self.buckets[b].find(&key, hash).is_some();

        let mut placed = self.buckets[b].try_insert(&key, &value, hash);
        let mut retries = 0;
        while !placed {
            if retries >= MAX_REBUILD_RETRIES {
                return Err(TableError::RebuildExhausted {
                    bucket: b,
                    attempts: retries,
                });
            }
            debug!("perfect-hash bucket {} rebuilding on full probe", b);
            self.buckets[b].rebuild(&self.hash_builder);
            placed = self.buckets[b].try_insert(&key, &value, hash);
            retries += 1;
        }

        if !already_live {
            self.size += 1;
        }
        if self.buckets[b].overloaded() {
            self.buckets[b].rebuild(&self.hash_builder);
        }
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.bucket_index(hash);
        self.buckets[b].find(key, hash).cloned()
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.bucket_index(hash);
        if self.buckets[b].find(key, hash).is_some() {
            self.buckets[b].try_insert(key, &value, hash)
        } else {
            false
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.bucket_index(hash);
        if self.buckets[b].remove(key, hash) {
            self.size -= 1;
            true
        } else {
            false
        }
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Secondary::new(0);
        }
        self.size = 0;
    }

    fn load_factor(&self) -> f64 {
        self.size as f64 / self.buckets.len() as f64
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }
}
