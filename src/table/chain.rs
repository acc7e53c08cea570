use std::hash::Hash;

use crate::config::ChainConfig;
use crate::error::Result;
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::map::Map;

/// Fixed-size array of buckets, each an ordered list of entries. Never
/// resizes (§4.3).
pub struct ChainingTable<K, V> {
    buckets: Vec<Vec<(K, V)>>,
    size: usize,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> ChainingTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: ChainConfig) -> Self {
        let buckets = config.buckets.max(1);
        Self {
            buckets: (0..buckets).map(|_| Vec::new()).collect(),
            size: 0,
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    pub fn with_buckets(buckets: usize) -> Self {
        Self::new(ChainConfig { buckets })
    }

    #[inline]
    fn bucket_index(&self, key: &K) -> usize {
        (make_hash(&self.hash_builder, key) as usize) % self.buckets.len()
    }
}

impl<K, V> Map<K, V> for ChainingTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        let idx = self.bucket_index(&key);
        let bucket = &mut self.buckets[idx];
        if let Some(entry) = bucket.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            bucket.push((key, value));
            self.size += 1;
        }
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let idx = self.bucket_index(key);
        self.buckets[idx]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let idx = self.bucket_index(key);
        match self.buckets[idx].iter_mut().find(|(k, _)| k == key) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        let idx = self.bucket_index(key);
        let bucket = &mut self.buckets[idx];
        match bucket.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                bucket.remove(pos);
                self.size -= 1;
                true
            }
            None => false,
        }
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_preserves_neighbors() {
        let mut t: ChainingTable<u64, u64> = ChainingTable::with_buckets(4);
        t.insert(1, 10).unwrap();
        t.insert(2, 20).unwrap();
        t.insert(3, 30).unwrap();
        assert!(t.remove(&2));
        assert_eq!(t.lookup(&1), Some(10));
        assert_eq!(t.lookup(&3), Some(30));
        assert_eq!(t.lookup(&2), None);
        assert!(!t.remove(&2));
        assert_eq!(t.size(), 2);
    }

    #[test]
    fn no_duplicate_keys_within_a_bucket() {
        let mut t: ChainingTable<u64, u64> = ChainingTable::with_buckets(1);
        for i in 0..20u64 {
            t.insert(i % 5, i).unwrap();
        }
        assert_eq!(t.size(), 5);
        assert_eq!(t.buckets[0].len(), 5);
    }

    #[test]
    fn capacity_never_changes() {
        let mut t: ChainingTable<u64, u64> = ChainingTable::with_buckets(4);
        for i in 0..1000u64 {
            t.insert(i, i).unwrap();
        }
        assert_eq!(t.capacity(), 4);
        assert_eq!(t.size(), 1000);
    }
}
