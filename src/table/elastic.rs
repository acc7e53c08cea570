use std::hash::Hash;

use log::debug;

use crate::config::ElasticConfig;
use crate::error::Result;
use crate::hash::{make_hash, mix64, DefaultHashBuilder};
use crate::map::Map;
use crate::table::{empty_slots, Slot};

/// `C₀ = N`; level `i` takes `⌈C_i / 2⌉` slots, `C_{i+1} = C_i − |A_i|`,
/// until the remaining budget is exhausted (§4.8). Sums to exactly
/// `capacity`, unlike a fixed-floor halving sequence.
fn level_sizes(capacity: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut remaining = capacity;
    while remaining > 0 {
        let take = (remaining + 1) / 2;
        sizes.push(take);
        remaining -= take;
    }
    sizes
}

fn level_hash(hash: u64, level: usize) -> u64 {
    mix64(hash ^ (level as u64).wrapping_mul(0x2545_F491_4F6C_DD1D))
}

/// `ε_i = (|A_i| − occupied_i) / |A_i|`, the free fraction of level `i`.
fn epsilon(level_len: usize, occupied: usize) -> f64 {
    (level_len - occupied) as f64 / level_len as f64
}

/// `⌈min(log₂(1/ε_i), log₂(1/δ))⌉`, clamped into `[1, level_len]` (§4.8).
/// `log₂(1/δ)` is always finite since `δ` is validated into `(0, 1)`, so the
/// `min` is finite even when the level is full and `ε_i = 0`.
fn probe_budget(level_len: usize, occupied: usize, delta: f64) -> usize {
    let eps = epsilon(level_len, occupied);
    let by_eps = (1.0 / eps).log2();
    let by_delta = (1.0 / delta).log2();
    let bound = by_eps.min(by_delta).ceil() as usize;
    bound.clamp(1, level_len.max(1))
}

/// Geometrically halving levels with the spec's ε-driven "current level"
/// placement rule: the smallest level still short of its full or partial
/// occupancy target gets a bounded probe first, with progressively wider
/// fallbacks (next level unbounded, then growth) chosen by how close that
/// level and its successor are to full (§4.8).
///
/// `lookup`/`update`/`remove` always scan each level's full deterministic
/// probe order rather than stopping at the probe budget: several insert
/// branches place an entry in an "unbounded" phase that can land past what
/// a budget-bound scan computed at read time would cover (the same class
/// of hazard as the LP tombstone bug — a reader that stops early can miss
/// a live entry). See DESIGN.md.
pub struct ElasticTable<K, V> {
    levels: Vec<Vec<Slot<K, V>>>,
    occupied: Vec<usize>,
    size: usize,
    capacity: usize,
    delta: f64,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> ElasticTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: ElasticConfig) -> Result<Self> {
        config.validate()?;
        let sizes = level_sizes(config.capacity);
        let occupied = vec![0; sizes.len()];
        Ok(Self {
            levels: sizes.into_iter().map(empty_slots).collect(),
            occupied,
            size: 0,
            capacity: config.capacity,
            delta: config.delta,
            hash_builder: DefaultHashBuilder::default(),
        })
    }

    pub fn with_capacity(capacity: usize, delta: f64) -> Result<Self> {
        Self::new(ElasticConfig { capacity, delta })
    }

    /// Unbounded deterministic probe scan of `level`, stopping at the first
    /// true `Slot::Empty` (tombstones are skipped, not terminal).
    fn scan_for_key(level: &[Slot<K, V>], key: &K, hash: u64, level_idx: usize) -> Option<usize> {
        let len = level.len();
        let start = (level_hash(hash, level_idx) as usize) % len;
        for step in 0..len {
            let idx = (start + step) % len;
            match &level[idx] {
                Slot::Empty => return None,
                Slot::Occupied(k, _) if k == key => return Some(idx),
                _ => {}
            }
        }
        None
    }

    fn find_slot(&self, key: &K, hash: u64) -> Option<(usize, usize)> {
        for (level_idx, level) in self.levels.iter().enumerate() {
            if let Some(idx) = Self::scan_for_key(level, key, hash, level_idx) {
                return Some((level_idx, idx));
            }
        }
        None
    }

    fn scan_vacancy(level: &[Slot<K, V>], hash: u64, level_idx: usize, width: usize) -> Option<usize> {
        let len = level.len();
        let start = (level_hash(hash, level_idx) as usize) % len;
        for step in 0..width.min(len) {
            let idx = (start + step) % len;
            if level[idx].is_vacant() {
                return Some(idx);
            }
        }
        None
    }

    fn try_place_bounded(&mut self, level_idx: usize, hash: u64, key: &K, value: &V) -> bool {
        let budget = probe_budget(self.levels[level_idx].len(), self.occupied[level_idx], self.delta);
        match Self::scan_vacancy(&self.levels[level_idx], hash, level_idx, budget) {
            Some(idx) => {
                self.levels[level_idx][idx] = Slot::Occupied(key.clone(), value.clone());
                self.occupied[level_idx] += 1;
                true
            }
            None => false,
        }
    }

    fn try_place_full(&mut self, level_idx: usize, hash: u64, key: &K, value: &V) -> bool {
        let width = self.levels[level_idx].len();
        match Self::scan_vacancy(&self.levels[level_idx], hash, level_idx, width) {
            Some(idx) => {
                self.levels[level_idx][idx] = Slot::Occupied(key.clone(), value.clone());
                self.occupied[level_idx] += 1;
                true
            }
            None => false,
        }
    }

    /// The smallest level `i` whose occupancy is still below its full
    /// target, or whose successor is still below its partial target
    /// (§4.8). Falls back to the last level if every level has met both
    /// targets, leaving growth to the placement rule.
    fn current_level(&self) -> usize {
        let n = self.levels.len();
        for i in 0..n {
            let len_i = self.levels[i].len();
            let full_target = len_i.saturating_sub(((self.delta * len_i as f64) / 2.0).floor() as usize);
            let below_full = self.occupied[i] < full_target;
            let below_partial = if i + 1 < n {
                let len_next = self.levels[i + 1].len();
                let partial_target = (0.75 * len_next as f64).ceil() as usize;
                self.occupied[i + 1] < partial_target
            } else {
                false
            };
            if below_full || below_partial {
                return i;
            }
        }
        n - 1
    }

    fn place_new(&mut self, key: K, value: V) {
        loop {
            let hash = make_hash(&self.hash_builder, &key);
            let last = self.levels.len() - 1;
            let level = self.current_level();

            let placed = if level == 0 {
                self.try_place_bounded(0, hash, &key, &value) || self.try_place_full(0, hash, &key, &value)
            } else if level == last {
                self.try_place_full(level, hash, &key, &value)
            } else {
                let eps_l = epsilon(self.levels[level].len(), self.occupied[level]);
                let eps_l1 = epsilon(self.levels[level + 1].len(), self.occupied[level + 1]);
                if eps_l > self.delta / 2.0 && eps_l1 > 0.25 {
                    self.try_place_bounded(level, hash, &key, &value)
                        || self.try_place_full(level + 1, hash, &key, &value)
                } else if eps_l <= self.delta / 2.0 {
                    self.try_place_full(level + 1, hash, &key, &value)
                } else {
                    self.try_place_full(level, hash, &key, &value)
                }
            };

            if placed {
                return;
            }
            self.grow();
        }
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        debug!(
            "elastic table growing budget {} -> {} at {} live entries",
            self.capacity, new_capacity, self.size
        );
        let mut entries = Vec::with_capacity(self.size);
        for level in &mut self.levels {
            for slot in level.drain(..) {
                if let Slot::Occupied(k, v) = slot {
                    entries.push((k, v));
                }
            }
        }
        let sizes = level_sizes(new_capacity);
        self.occupied = vec![0; sizes.len()];
        self.levels = sizes.into_iter().map(empty_slots).collect();
        self.capacity = new_capacity;
        for (k, v) in entries {
            self.place_new(k, v);
        }
    }
}

impl<K, V> Map<K, V> for ElasticTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        let hash = make_hash(&self.hash_builder, &key);
        if let Some((level_idx, idx)) = self.find_slot(&key, hash) {
            self.levels[level_idx][idx] = Slot::Occupied(key, value);
            return Ok(());
        }
        self.size += 1;
        self.place_new(key, value);
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let hash = make_hash(&self.hash_builder, key);
        self.find_slot(key, hash).map(|(level_idx, idx)| match &self.levels[level_idx][idx] {
            Slot::Occupied(_, v) => v.clone(),
            _ => unreachable!(),
        })
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        match self.find_slot(key, hash) {
            Some((level_idx, idx)) => {
                self.levels[level_idx][idx] = Slot::Occupied(key.clone(), value);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        match self.find_slot(key, hash) {
            Some((level_idx, idx)) => {
                self.levels[level_idx][idx] = Slot::Deleted;
                self.occupied[level_idx] -= 1;
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
        let sizes = level_sizes(self.capacity);
        self.occupied = vec![0; sizes.len()];
        self.levels = sizes.into_iter().map(empty_slots).collect();
        self.size = 0;
    }

    fn load_factor(&self) -> f64 {
        self.size as f64 / self.capacity() as f64
    }

    fn capacity(&self) -> usize {
        self.levels.iter().map(|l| l.len()).sum()
    }
}
