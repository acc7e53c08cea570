use std::hash::Hash;

use log::debug;

use crate::config::IcebergConfig;
use crate::error::Result;
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::map::Map;
use crate::table::empty_options;

/// Slots per block in the primary (L1) tier.
const S1: usize = 64;
/// Slots per block in the secondary (L2) tier.
const S2: usize = 8;
/// Growth trigger: total occupancy over total L1+L2 capacity (§4.6).
const GROW_LOAD_FACTOR: f64 = 0.85;
/// Divisor used to derive `hB` from the primary hash so it lands on a block
/// distinct from `hA`'s in the common case (§4.6: `hB(k) = (hash/37) mod B`).
const HB_DIVISOR: u64 = 37;

/// One block's L1/L2 arrays, each scanned in full rather than addressed by a
/// fixed two-choice pair (§4.6).
struct Block<K, V> {
    l1: Vec<Option<(K, V)>>,
    l2: Vec<Option<(K, V)>>,
}

impl<K, V> Block<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new() -> Self {
        Self {
            l1: empty_options(S1),
            l2: empty_options(S2),
        }
    }

    fn len(&self) -> usize {
        self.l1.iter().filter(|s| s.is_some()).count() + self.l2.iter().filter(|s| s.is_some()).count()
    }
}

/// Three coordinated structures keyed on block count `B`: a Level-1 array of
/// `B` blocks with `S1` slots each, a Level-2 array of `B` blocks with `S2`
/// slots each, and `B` Level-3 overflow lists, one per Level-1 index (§4.6).
pub struct IcebergTable<K, V> {
    l1_blocks: Vec<Block<K, V>>,
    l2_blocks: Vec<Vec<Option<(K, V)>>>,
    overflow: Vec<Vec<(K, V)>>,
    size: usize,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> IcebergTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: IcebergConfig) -> Self {
        let blocks = config.blocks.max(1);
        Self {
            l1_blocks: (0..blocks).map(|_| Block::new()).collect(),
            l2_blocks: (0..blocks).map(|_| empty_options(S2)).collect(),
            overflow: (0..blocks).map(|_| Vec::new()).collect(),
            size: 0,
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    pub fn with_blocks(blocks: usize) -> Self {
        Self::new(IcebergConfig { blocks })
    }

    fn block_count(&self) -> usize {
        self.l1_blocks.len()
    }

    /// `hA(k) = hash(k) mod B` selects the Level-1 (and Level-3) block;
    /// `hB(k) = (hash(k) / 37) mod B` selects a distinct Level-2 block
    /// (§4.6).
    fn addresses(&self, key: &K) -> (usize, usize) {
        let hash = make_hash(&self.hash_builder, key);
        let b = self.block_count() as u64;
        let h_a = (hash % b) as usize;
        let h_b = ((hash / HB_DIVISOR) % b) as usize;
        (h_a, h_b)
    }

    /// Scans every tier in spec order for an existing live copy of `key`,
    /// overwriting it in place if found. Checking all three tiers before
    /// ever placing a new entry preserves uniqueness: a literal
    /// probe-current-tier-then-fall-through insert could otherwise leave a
    /// stale duplicate if `remove` frees an earlier-tier slot while the key
    /// still lives in a later tier (see DESIGN.md, the LP tombstone lesson).
    fn overwrite_if_present(&mut self, key: &K, value: &V, h_a: usize, h_b: usize) -> bool {
        for slot in self.l1_blocks[h_a].l1.iter_mut() {
            if matches!(slot, Some((k, _)) if k == key) {
                *slot = Some((key.clone(), value.clone()));
                return true;
            }
        }
        for slot in self.l2_blocks[h_b].iter_mut() {
            if matches!(slot, Some((k, _)) if k == key) {
                *slot = Some((key.clone(), value.clone()));
                return true;
            }
        }
        if let Some(entry) = self.overflow[h_a].iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.clone();
            return true;
        }
        false
    }

    fn place_new(&mut self, key: K, value: V, h_a: usize, h_b: usize) {
        if let Some(slot) = self.l1_blocks[h_a].l1.iter_mut().find(|s| s.is_none()) {
            *slot = Some((key, value));
            return;
        }
        if let Some(slot) = self.l2_blocks[h_b].iter_mut().find(|s| s.is_none()) {
            *slot = Some((key, value));
            return;
        }
        self.overflow[h_a].push((key, value));
    }

    fn find(&self, key: &K, h_a: usize, h_b: usize) -> Option<&V> {
        for slot in &self.l1_blocks[h_a].l1 {
            if let Some((k, v)) = slot {
                if k == key {
                    return Some(v);
                }
            }
        }
        for slot in &self.l2_blocks[h_b] {
            if let Some((k, v)) = slot {
                if k == key {
                    return Some(v);
                }
            }
        }
        self.overflow[h_a].iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove_at(&mut self, key: &K, h_a: usize, h_b: usize) -> bool {
        if let Some(slot) = self.l1_blocks[h_a]
            .l1
            .iter_mut()
            .find(|s| matches!(s, Some((k, _)) if k == key))
        {
            *slot = None;
            return true;
        }
        if let Some(slot) = self.l2_blocks[h_b]
            .iter_mut()
            .find(|s| matches!(s, Some((k, _)) if k == key))
        {
            *slot = None;
            return true;
        }
        if let Some(pos) = self.overflow[h_a].iter().position(|(k, _)| k == key) {
            self.overflow[h_a].remove(pos);
            return true;
        }
        false
    }

    fn load_fraction(&self) -> f64 {
        let l1_l2: usize = self.l1_blocks.iter().map(|b| b.len()).sum();
        l1_l2 as f64 / (self.block_count() * (S1 + S2)) as f64
    }

    fn drain_all(&mut self) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.size);
        for block in &mut self.l1_blocks {
            out.extend(block.l1.iter_mut().filter_map(|s| s.take()));
        }
        for block in &mut self.l2_blocks {
            out.extend(block.iter_mut().filter_map(|s| s.take()));
        }
        for list in &mut self.overflow {
            out.extend(list.drain(..));
        }
        out
    }

    fn grow(&mut self) {
        let new_count = self.block_count() * 2;
        debug!(
            "iceberg table growing {} -> {} blocks at {} live entries",
            self.block_count(),
            new_count,
            self.size
        );
        let entries = self.drain_all();
        self.l1_blocks = (0..new_count).map(|_| Block::new()).collect();
        self.l2_blocks = (0..new_count).map(|_| empty_options(S2)).collect();
        self.overflow = (0..new_count).map(|_| Vec::new()).collect();
        for (k, v) in entries {
            let (h_a, h_b) = self.addresses(&k);
            self.place_new(k, v, h_a, h_b);
        }
    }
}

impl<K, V> Map<K, V> for IcebergTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        if self.load_fraction() >= GROW_LOAD_FACTOR {
            self.grow();
        }
        let (h_a, h_b) = self.addresses(&key);
        if self.overwrite_if_present(&key, &value, h_a, h_b) {
            return Ok(());
        }
        self.place_new(key, value, h_a, h_b);
        self.size += 1;
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let (h_a, h_b) = self.addresses(key);
        self.find(key, h_a, h_b).cloned()
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let (h_a, h_b) = self.addresses(key);
        self.overwrite_if_present(key, &value, h_a, h_b)
    }

    fn remove(&mut self, key: &K) -> bool {
        let (h_a, h_b) = self.addresses(key);
        if self.remove_at(key, h_a, h_b) {
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
        let blocks = self.block_count();
        self.l1_blocks = (0..blocks).map(|_| Block::new()).collect();
        self.l2_blocks = (0..blocks).map(|_| empty_options(S2)).collect();
        self.overflow = (0..blocks).map(|_| Vec::new()).collect();
        self.size = 0;
    }

    fn load_factor(&self) -> f64 {
        self.load_fraction()
    }

    fn capacity(&self) -> usize {
        self.block_count() * (S1 + S2)
    }
}
