use std::hash::Hash;

use log::debug;

use crate::config::LpConfig;
use crate::error::Result;
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::map::Map;
use crate::table::{empty_slots, Slot};

/// Maximum occupancy, as live entries over slot count, before an insert
/// triggers a resize (§4.2).
const MAX_LOAD_FACTOR: f64 = 0.6;

/// Single contiguous array, linear probing, tombstones, geometric growth —
/// the baseline open-addressing table (§4.2).
pub struct LinearProbingTable<K, V> {
    slots: Vec<Slot<K, V>>,
    size: usize,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> LinearProbingTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: LpConfig) -> Self {
        let capacity = config.initial_capacity.max(1).next_power_of_two();
        Self {
            slots: empty_slots(capacity),
            size: 0,
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::new(LpConfig { initial_capacity })
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash as usize) % self.slots.len()
    }

    fn grow(&mut self) {
        let new_capacity = self.slots.len() * 2;
        debug!(
            "linear probing table growing {} -> {} slots at {} live entries",
            self.slots.len(),
            new_capacity,
            self.size
        );
        let old = std::mem::replace(&mut self.slots, empty_slots(new_capacity));
        self.size = 0;
        for slot in old {
            if let Slot::Occupied(k, v) = slot {
                self.place(k, v);
            }
        }
    }

    /// Places a key known not to already collide with a stale tombstone of
    /// itself (used during resize, where every surviving entry is unique
    /// and growth cannot recurse because the table has just been emptied
    /// into a doubled array sized for the exact same occupancy).
    fn place(&mut self, key: K, value: V) {
        let hash = make_hash(&self.hash_builder, &key);
        let mut idx = self.index(hash);
        loop {
            match &self.slots[idx] {
                Slot::Empty | Slot::Deleted => {
                    self.slots[idx] = Slot::Occupied(key, value);
                    self.size += 1;
                    return;
                }
                _ => idx = (idx + 1) % self.slots.len(),
            }
        }
    }
}

impl<K, V> Map<K, V> for LinearProbingTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        if (self.size + 1) as f64 / self.slots.len() as f64 > MAX_LOAD_FACTOR {
            self.grow();
        }

        let hash = make_hash(&self.hash_builder, &key);
        let start = self.index(hash);
        let mut idx = start;
        let mut steps = 0;
        // Remember the first tombstone seen so a later live match still
        // takes priority over it: placing at an earlier tombstone before
        // confirming the key isn't live further down the chain would
        // create a duplicate (see DESIGN.md).
        let mut first_tombstone: Option<usize> = None;
        loop {
            match &self.slots[idx] {
                Slot::Occupied(k, _) if *k == key => {
                    self.slots[idx] = Slot::Occupied(key, value);
                    return Ok(());
                }
                Slot::Deleted if first_tombstone.is_none() => {
                    first_tombstone = Some(idx);
                }
                Slot::Empty => {
                    let target = first_tombstone.unwrap_or(idx);
                    self.slots[target] = Slot::Occupied(key, value);
                    self.size += 1;
                    return Ok(());
                }
                _ => {}
            }
            idx = (idx + 1) % self.slots.len();
            steps += 1;
            if idx == start || steps >= self.slots.len() {
                // The whole table was scanned without a match or a true
                // empty slot. A tombstone seen along the way is still safe
                // to reuse now that every slot has been checked for a live
                // match. Otherwise grow first, then retry from scratch.
                if let Some(target) = first_tombstone {
                    self.slots[target] = Slot::Occupied(key, value);
                    self.size += 1;
                    return Ok(());
                }
                self.grow();
                self.place(key, value);
                return Ok(());
            }
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let hash = make_hash(&self.hash_builder, key);
        let start = self.index(hash);
        let mut idx = start;
        loop {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied(k, v) if k == key => return Some(v.clone()),
                _ => {}
            }
            idx = (idx + 1) % self.slots.len();
            if idx == start {
                return None;
            }
        }
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let start = self.index(hash);
        let mut idx = start;
        loop {
            match &mut self.slots[idx] {
                Slot::Empty => return false,
                Slot::Occupied(k, v) if k == key => {
                    *v = value;
                    return true;
                }
                _ => {}
            }
            idx = (idx + 1) % self.slots.len();
            if idx == start {
                return false;
            }
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        let start = self.index(hash);
        let mut idx = start;
        loop {
            match &self.slots[idx] {
                Slot::Empty => return false,
                Slot::Occupied(k, _) if k == key => {
                    self.slots[idx] = Slot::Deleted;
                    self.size -= 1;
                    return true;
                }
                _ => {}
            }
            idx = (idx + 1) % self.slots.len();
            if idx == start {
                return false;
            }
        }
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        let capacity = self.slots.len();
        self.slots = empty_slots(capacity);
        self.size = 0;
    }

    fn load_factor(&self) -> f64 {
        self.size as f64 / self.slots.len() as f64
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_update() {
        let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(8);
        t.insert(42, 100).unwrap();
        t.insert(84, 200).unwrap();
        t.insert(42, 300).unwrap();
        assert_eq!(t.lookup(&42), Some(300));
        assert_eq!(t.lookup(&84), Some(200));
        assert_eq!(t.size(), 2);
    }

    #[test]
    fn remove_then_reinsert() {
        let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(8);
        t.insert(1, 10).unwrap();
        assert!(t.remove(&1));
        assert_eq!(t.lookup(&1), None);
        assert!(!t.remove(&1));
        t.insert(1, 20).unwrap();
        assert_eq!(t.lookup(&1), Some(20));
    }

    #[test]
    fn growth_preserves_contents() {
        let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(4);
        for i in 0..500u64 {
            t.insert(i, i * 10).unwrap();
        }
        for i in 0..500u64 {
            assert_eq!(t.lookup(&i), Some(i * 10));
        }
        assert_eq!(t.size(), 500);
    }

    #[test]
    fn update_and_remove_absent() {
        let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(8);
        assert!(!t.update(&1, 1));
        assert!(!t.remove(&1));
        assert_eq!(t.size(), 0);
    }

    #[test]
    fn tombstone_does_not_shadow_a_live_duplicate() {
        // Find three keys that land on the same starting probe index, then
        // reproduce: insert all three, remove the first (leaving a
        // tombstone before the other two), then reinsert the second. The
        // reinsert must find and overwrite the live copy past the
        // tombstone rather than placing a second copy at the tombstone.
        let probe: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(8);
        let mut keys = Vec::new();
        let mut target_index = None;
        for candidate in 0u64..100_000 {
            let hash = make_hash(&probe.hash_builder, &candidate);
            let idx = probe.index(hash);
            match target_index {
                None => {
                    target_index = Some(idx);
                    keys.push(candidate);
                }
                Some(target) if idx == target => {
                    keys.push(candidate);
                    if keys.len() == 3 {
                        break;
                    }
                }
                _ => {}
            }
        }
        assert_eq!(keys.len(), 3, "expected three colliding keys within the search range");

        let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(8);
        t.insert(keys[0], 1).unwrap();
        t.insert(keys[1], 2).unwrap();
        t.insert(keys[2], 3).unwrap();
        assert!(t.remove(&keys[0]));
        t.insert(keys[1], 99).unwrap();

        assert_eq!(t.lookup(&keys[1]), Some(99));
        assert_eq!(t.lookup(&keys[2]), Some(3));
        assert_eq!(t.size(), 2);
        let occurrences = t
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(k, _) if *k == keys[1]))
            .count();
        assert_eq!(occurrences, 1, "key must not be duplicated across slots");
    }

    #[test]
    fn clear_resets_size() {
        let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(8);
        for i in 0..5u64 {
            t.insert(i, i).unwrap();
        }
        t.clear();
        assert_eq!(t.size(), 0);
        for i in 0..5u64 {
            assert_eq!(t.lookup(&i), None);
        }
    }
}
