use std::hash::Hash;

use log::debug;

use crate::config::CuckooConfig;
use crate::error::Result;
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::map::Map;
use crate::table::empty_options;

/// Two equally sized slot arrays, two hashes, displacement-kick insertion
/// (§4.4).
///
/// The `h1`/`h2` pair is kept bit-exact to the distilled specification
/// (`h2` derived from the same 64-bit hash as `h1` via a shift-xor, not an
/// independently seeded hash family) for reproducible test traces. See
/// DESIGN.md for the adversarial-workload caveat this implies.
pub struct CuckooTable<K, V> {
    t1: Vec<Option<(K, V)>>,
    t2: Vec<Option<(K, V)>>,
    capacity: usize,
    size: usize,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> CuckooTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: CuckooConfig) -> Self {
        let capacity = config.initial_capacity.max(1);
        Self {
            t1: empty_options(capacity),
            t2: empty_options(capacity),
            capacity,
            size: 0,
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::new(CuckooConfig { initial_capacity })
    }

    #[inline]
    fn h1(&self, hash: u64) -> usize {
        (hash % self.capacity as u64) as usize
    }

    #[inline]
    fn h2(&self, hash: u64) -> usize {
        (((hash >> 16) ^ hash) % self.capacity as u64) as usize
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        debug!(
            "cuckoo table growing {} -> {} per-table capacity",
            self.capacity, new_capacity
        );
        let old_t1 = std::mem::replace(&mut self.t1, empty_options(new_capacity));
        let old_t2 = std::mem::replace(&mut self.t2, empty_options(new_capacity));
        self.capacity = new_capacity;
        for (k, v) in old_t1.into_iter().chain(old_t2).flatten() {
            self.place(k, v);
        }
    }

    /// Runs the displacement chain for a key known to not already be
    /// present anywhere in the table, alternating `T1`/`T2` and capping at
    /// `capacity` displacements before growing and retrying (§4.4).
    fn place(&mut self, key: K, value: V) {
        let mut current = (key, value);
        let mut use_t1 = true;
        for _ in 0..self.capacity {
            let hash = make_hash(&self.hash_builder, &current.0);
            let idx = if use_t1 { self.h1(hash) } else { self.h2(hash) };
            let slot = if use_t1 { &mut self.t1[idx] } else { &mut self.t2[idx] };
            match slot.replace(current) {
                None => return,
                Some(evicted) => current = evicted,
            }
            use_t1 = !use_t1;
        }
        self.grow();
        self.place(current.0, current.1);
    }
}

impl<K, V> Map<K, V> for CuckooTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        let hash = make_hash(&self.hash_builder, &key);
        let i1 = self.h1(hash);
        if matches!(&self.t1[i1], Some((k, _)) if *k == key) {
            self.t1[i1] = Some((key, value));
            return Ok(());
        }
        let i2 = self.h2(hash);
        if matches!(&self.t2[i2], Some((k, _)) if *k == key) {
            self.t2[i2] = Some((key, value));
            return Ok(());
        }
        self.size += 1;
        self.place(key, value);
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let hash = make_hash(&self.hash_builder, key);
        if let Some((k, v)) = &self.t1[self.h1(hash)] {
            if k == key {
                return Some(v.clone());
            }
        }
        if let Some((k, v)) = &self.t2[self.h2(hash)] {
            if k == key {
                return Some(v.clone());
            }
        }
        None
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let i1 = self.h1(hash);
        if matches!(&self.t1[i1], Some((k, _)) if k == key) {
            self.t1[i1] = Some((key.clone(), value));
            return true;
        }
        let i2 = self.h2(hash);
        if matches!(&self.t2[i2], Some((k, _)) if k == key) {
            self.t2[i2] = Some((key.clone(), value));
            return true;
        }
        false
    }

    fn remove(&mut self, key: &K) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let i1 = self.h1(hash);
        if matches!(&self.t1[i1], Some((k, _)) if k == key) {
            self.t1[i1] = None;
            self.size -= 1;
            return true;
        }
        let i2 = self.h2(hash);
        if matches!(&self.t2[i2], Some((k, _)) if k == key) {
            self.t2[i2] = None;
            self.size -= 1;
            return true;
        }
        false
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        self.t1 = empty_options(self.capacity);
        self.t2 = empty_options(self.capacity);
        self.size = 0;
    }

    fn load_factor(&self) -> f64 {
        self.size as f64 / (2 * self.capacity) as f64
    }

    fn capacity(&self) -> usize {
        2 * self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_invariant_holds_under_growth() {
        let mut t: CuckooTable<u64, u64> = CuckooTable::with_capacity(2);
        for i in 1..=1000u64 {
            t.insert(i, 10 * i).unwrap();
        }
        for i in 1..=1000u64 {
            assert_eq!(t.lookup(&i), Some(10 * i));
            let hash = make_hash(&t.hash_builder, &i);
            let in_t1 = matches!(&t.t1[t.h1(hash)], Some((k, _)) if *k == i);
            let in_t2 = matches!(&t.t2[t.h2(hash)], Some((k, _)) if *k == i);
            assert!(in_t1 || in_t2);
        }
        assert_eq!(t.size(), 1000);
    }

    #[test]
    fn overwrite_does_not_change_size() {
        let mut t: CuckooTable<u64, u64> = CuckooTable::with_capacity(16);
        t.insert(1, 10).unwrap();
        t.insert(1, 20).unwrap();
        assert_eq!(t.size(), 1);
        assert_eq!(t.lookup(&1), Some(20));
    }

    #[test]
    fn remove_absent_key() {
        let mut t: CuckooTable<u64, u64> = CuckooTable::with_capacity(16);
        assert!(!t.remove(&99));
        assert!(!t.update(&99, 1));
    }
}
