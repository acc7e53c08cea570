use std::collections::BTreeMap;
use std::hash::Hash;

use log::debug;

use crate::config::IpbtConfig;
use crate::error::{Result, TableError};
use crate::hash::{make_hash, mix64, DefaultHashBuilder};
use crate::map::Map;

/// Bounded retries for a bucket's fingerprint-collision salt search before
/// giving up (§4.9, "rebuild on fingerprint collision").
const MAX_SALT_RETRIES: usize = 16;
/// Growth trigger (resolved Open Question: grow rather than fail outright
/// when a bucket would overflow its fingerprint-index budget — see
/// DESIGN.md).
const GROW_LOAD_FACTOR: f64 = 0.7;

/// Dense, left-justified entry list plus a salted fingerprint index for
/// O(log w) membership checks without a linear scan (§4.9).
struct Bucket<K, V> {
    entries: Vec<(K, V)>,
    salt: u64,
    index: BTreeMap<u32, usize>,
}

impl<K, V> Bucket<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new(salt: u64) -> Self {
        Self {
            entries: Vec::new(),
            salt,
            index: BTreeMap::new(),
        }
    }

    #[inline]
    fn fingerprint(&self, hash: u64) -> u32 {
        mix64(hash ^ self.salt) as u32
    }

    fn find(&self, key: &K, hash: u64) -> Option<usize> {
        let fp = self.fingerprint(hash);
        match self.index.get(&fp) {
            Some(&pos) if self.entries[pos].0 == *key => Some(pos),
            _ => None,
        }
    }

    /// `Ok(true)` inserted a new entry, `Ok(false)` overwrote an existing
    /// one, `Err(())` means a different key already occupies this
    /// fingerprint under the current salt and the bucket must be rebuilt.
    fn try_insert(&mut self, key: &K, value: &V, hash: u64) -> std::result::Result<bool, ()> {
        let fp = self.fingerprint(hash);
        match self.index.get(&fp) {
            Some(&pos) if self.entries[pos].0 == *key => {
                self.entries[pos].1 = value.clone();
                Ok(false)
            }
            Some(_) => Err(()),
            None => {
                let pos = self.entries.len();
                self.entries.push((key.clone(), value.clone()));
                self.index.insert(fp, pos);
                Ok(true)
            }
        }
    }

    /// Recomputes the fingerprint index under `new_salt`. Fails (without
    /// mutating `self`) if two existing entries would collide under the new
    /// salt.
    fn rebuild(&mut self, hash_builder: &DefaultHashBuilder, new_salt: u64) -> bool {
        let mut new_index = BTreeMap::new();
        for (pos, (k, _)) in self.entries.iter().enumerate() {
            let h = make_hash(hash_builder, k);
            let fp = mix64(h ^ new_salt) as u32;
            if new_index.insert(fp, pos).is_some() {
                return false;
            }
        }
        self.salt = new_salt;
        self.index = new_index;
        true
    }

    /// Removes `key`, then swaps the last entry into the freed slot to keep
    /// `entries` dense and left-justified, fixing up the moved entry's
    /// index record (§4.9).
    fn remove(&mut self, key: &K, hash: u64, hash_builder: &DefaultHashBuilder) -> bool {
        let fp = self.fingerprint(hash);
        let pos = match self.index.get(&fp) {
            Some(&pos) if self.entries[pos].0 == *key => pos,
            _ => return false,
        };
        self.index.remove(&fp);
        let last = self.entries.len() - 1;
        if pos != last {
            self.entries.swap(pos, last);
            let moved_hash = make_hash(hash_builder, &self.entries[pos].0);
            let moved_fp = self.fingerprint(moved_hash);
            self.index.insert(moved_fp, pos);
        }
        self.entries.pop();
        true
    }
}

/// Fixed bucket array, each a densely packed entry list backed by a salted
/// fingerprint index rather than a per-entry hash table (§4.9).
pub struct PartitionedFingerprintTable<K, V> {
    buckets: Vec<Bucket<K, V>>,
    size: usize,
    capacity: usize,
    shape_constant: f64,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> PartitionedFingerprintTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: IpbtConfig) -> Result<Self> {
        config.validate()?;
        let bucket_count = derive_bucket_count(config.capacity, config.shape_constant);
        Ok(Self {
            buckets: (0..bucket_count).map(|i| Bucket::new(i as u64)).collect(),
            size: 0,
            capacity: config.capacity,
            shape_constant: config.shape_constant,
            hash_builder: DefaultHashBuilder::default(),
        })
    }

    pub fn with_capacity(capacity: usize, shape_constant: f64) -> Result<Self> {
        Self::new(IpbtConfig {
            capacity,
            shape_constant,
        })
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) % self.buckets.len()
    }

    /// Inserts into its bucket, retrying with freshly derived salts on
    /// fingerprint collision up to [`MAX_SALT_RETRIES`].
    fn insert_into_bucket(&mut self, key: K, value: V, hash: u64) -> Result<bool> {
        let b = self.bucket_index(hash);
        let mut attempt = 0;
        loop {
            match self.buckets[b].try_insert(&key, &value, hash) {
                Ok(is_new) => return Ok(is_new),
                Err(()) => {
                    if attempt >= MAX_SALT_RETRIES {
                        return Err(TableError::RebuildExhausted {
                            bucket: b,
                            attempts: attempt,
                        });
                    }
                    let new_salt = mix64(self.buckets[b].salt.wrapping_add(attempt as u64 + 1));
                    debug!("ipbt bucket {} rebuilding with new salt (attempt {})", b, attempt);
                    if !self.buckets[b].rebuild(&self.hash_builder, new_salt) {
                        attempt += 1;
                        continue;
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        let new_bucket_count = derive_bucket_count(new_capacity, self.shape_constant);
        debug!(
            "ipbt table growing {} -> {} buckets at {} live entries",
            self.buckets.len(),
            new_bucket_count,
            self.size
        );
        let mut entries = Vec::with_capacity(self.size);
        for bucket in &mut self.buckets {
            entries.extend(bucket.entries.drain(..));
        }
        self.buckets = (0..new_bucket_count).map(|i| Bucket::new(i as u64)).collect();
        self.capacity = new_capacity;
        for (k, v) in entries {
            let hash = make_hash(&self.hash_builder, &k);
            self.insert_into_bucket(k, v, hash)
                .expect("post-growth reinsertion into a freshly salted bucket should not collide");
        }
    }
}

/// `capacity / (shape_constant * ln(capacity))`, so wider buckets form when
/// `shape_constant` is larger (§4.9).
fn derive_bucket_count(capacity: usize, shape_constant: f64) -> usize {
    let n = (capacity.max(2)) as f64;
    let avg_width = (shape_constant * n.ln()).max(1.0);
    ((n / avg_width).ceil() as usize).max(1)
}

impl<K, V> Map<K, V> for PartitionedFingerprintTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        if self.load_factor() >= GROW_LOAD_FACTOR {
            self.grow();
        }
        let hash = make_hash(&self.hash_builder, &key);
        let is_new = self.insert_into_bucket(key, value, hash)?;
        if is_new {
            self.size += 1;
        }
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.bucket_index(hash);
        self.buckets[b]
            .find(key, hash)
            .map(|pos| self.buckets[b].entries[pos].1.clone())
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.bucket_index(hash);
        match self.buckets[b].find(key, hash) {
            Some(pos) => {
                self.buckets[b].entries[pos].1 = value;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.bucket_index(hash);
        if self.buckets[b].remove(key, hash, &self.hash_builder) {
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
        for (i, bucket) in self.buckets.iter_mut().enumerate() {
            *bucket = Bucket::new(i as u64);
        }
        self.size = 0;
    }

    fn load_factor(&self) -> f64 {
        self.size as f64 / self.capacity as f64
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_update_remove() {
        let mut t: PartitionedFingerprintTable<u64, u64> = PartitionedFingerprintTable::with_capacity(64, 2.0).unwrap();
        for i in 0..40u64 {
            t.insert(i, i * 5).unwrap();
        }
        for i in 0..40u64 {
            assert_eq!(t.lookup(&i), Some(i * 5));
        }
        assert!(t.update(&1, 999));
        assert_eq!(t.lookup(&1), Some(999));
        assert!(t.remove(&1));
        assert_eq!(t.lookup(&1), None);
        assert_eq!(t.size(), 39);
    }

    #[test]
    fn remove_preserves_left_justification() {
        let mut t: PartitionedFingerprintTable<u64, u64> = PartitionedFingerprintTable::with_capacity(64, 4.0).unwrap();
        for i in 0..8u64 {
            t.insert(i, i).unwrap();
        }
        for bucket in &t.buckets {
            assert_eq!(bucket.entries.len(), bucket.index.len());
        }
        assert!(t.remove(&2));
        for bucket in &t.buckets {
            assert_eq!(bucket.entries.len(), bucket.index.len());
            for (pos, (k, _)) in bucket.entries.iter().enumerate() {
                let hash = make_hash(&t.hash_builder, k);
                assert_eq!(bucket.find(k, hash), Some(pos));
            }
        }
    }

    #[test]
    fn growth_preserves_contents() {
        let mut t: PartitionedFingerprintTable<u64, u64> = PartitionedFingerprintTable::with_capacity(8, 2.0).unwrap();
        for i in 0..500u64 {
            t.insert(i, i).unwrap();
        }
        for i in 0..500u64 {
            assert_eq!(t.lookup(&i), Some(i));
        }
        assert_eq!(t.size(), 500);
    }
}
