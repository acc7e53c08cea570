use std::hash::Hash;

use log::debug;

use crate::config::FunnelConfig;
use crate::error::Result;
use crate::hash::{make_hash, mix64, DefaultHashBuilder};
use crate::map::Map;
use crate::table::{empty_slots, Slot};

/// Constant XORed into a key's hash to derive the second overflow
/// two-choice candidate (§4.7).
const SECOND_CHOICE_SALT: u64 = 0x9E3779B97F4A7C15;
/// Independent per-probe mixing constant for the overflow first half's `L`
/// probe sequence.
const FIRST_HALF_PROBE_SALT: u64 = 0xD1B5_4A32_D192_ED03;
/// Per-level mixing constant distinguishing `H(i, k)` across levels.
const LEVEL_SALT: u64 = 0x2545_F491_4F6C_DD1D;

fn level_hash(hash: u64, level: usize) -> u64 {
    mix64(hash ^ (level as u64).wrapping_mul(LEVEL_SALT))
}

fn first_half_probe(hash: u64, step: usize) -> u64 {
    mix64(hash ^ (step as u64 + 1).wrapping_mul(FIRST_HALF_PROBE_SALT))
}

/// `α = ⌈4·log₂(1/δ) + 10⌉`, the number of primary levels (§4.7).
fn alpha(delta: f64) -> usize {
    (4.0 * (1.0 / delta).log2() + 10.0).ceil().max(1.0) as usize
}

/// `β = ⌈log₂(1/δ)⌉`, the slot width of a primary-level bucket (§4.7).
fn beta(delta: f64) -> usize {
    (1.0 / delta).log2().ceil().max(1.0) as usize
}

/// `L = ⌈log₂(log₂(N+2))⌉`, the first-half overflow probe count (§4.7).
fn overflow_probe_count(capacity: usize) -> usize {
    let inner = ((capacity as f64) + 2.0).log2();
    inner.log2().ceil().max(1.0) as usize
}

struct Layout {
    level_sizes: Vec<usize>,
    beta: usize,
    overflow_first_len: usize,
    overflow_second_len: usize,
    second_bucket_width: usize,
    l_overflow: usize,
}

/// Derives every size named in §4.7 from the capacity budget `N` and free
/// fraction `δ`. `delta` is assumed already validated to lie in `(0, 1)` —
/// see [`FunnelConfig::validate`].
fn compute_layout(capacity: usize, delta: f64) -> Layout {
    let beta = beta(delta);
    let alpha = alpha(delta);
    let delta_half = ((delta * capacity as f64) / 2.0).ceil();
    let primary_budget = (capacity as f64 - delta_half).max(beta as f64);

    let mut level_sizes = Vec::with_capacity(alpha);
    for i in 0..alpha {
        let raw = primary_budget * 0.75f64.powi(i as i32);
        let buckets = (raw / beta as f64).floor().max(1.0) as usize;
        level_sizes.push(buckets * beta);
    }

    let total_primary: usize = level_sizes.iter().sum();
    let overflow_total = (delta_half as usize)
        .max(2)
        .max(capacity.saturating_sub(total_primary));

    let l_overflow = overflow_probe_count(capacity);
    let second_bucket_width = 2 * l_overflow;
    let overflow_first_len = (overflow_total / 2).max(1);
    let second_budget = overflow_total - overflow_first_len.min(overflow_total);
    let second_buckets = (second_budget / second_bucket_width).max(1);
    let overflow_second_len = second_buckets * second_bucket_width;

    Layout {
        level_sizes,
        beta,
        overflow_first_len,
        overflow_second_len,
        second_bucket_width,
        l_overflow,
    }
}

/// `α` geometrically shrinking primary levels of fixed-width buckets,
/// followed by a two-section overflow level: an `L`-probe flat array, then
/// a two-choice array of `2L`-wide buckets (§4.7).
pub struct FunnelTable<K, V> {
    levels: Vec<Vec<Slot<K, V>>>,
    overflow_first: Vec<Slot<K, V>>,
    overflow_second: Vec<Slot<K, V>>,
    beta: usize,
    l_overflow: usize,
    second_bucket_width: usize,
    size: usize,
    capacity: usize,
    delta: f64,
    hash_builder: DefaultHashBuilder,
}

impl<K, V> FunnelTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: FunnelConfig) -> Result<Self> {
        config.validate()?;
        let layout = compute_layout(config.capacity, config.delta);
        Ok(Self {
            levels: layout.level_sizes.into_iter().map(empty_slots).collect(),
            overflow_first: empty_slots(layout.overflow_first_len),
            overflow_second: empty_slots(layout.overflow_second_len),
            beta: layout.beta,
            l_overflow: layout.l_overflow,
            second_bucket_width: layout.second_bucket_width,
            size: 0,
            capacity: config.capacity,
            delta: config.delta,
            hash_builder: DefaultHashBuilder::default(),
        })
    }

    pub fn with_capacity(capacity: usize, delta: f64) -> Result<Self> {
        Self::new(FunnelConfig { capacity, delta })
    }

    /// Scans a fixed-width window for a live match, stopping at the first
    /// true `Slot::Empty` per the "terminates early at an empty slot"
    /// lookup rule — valid because every fill path below always places at
    /// the earliest vacant position along this same deterministic order,
    /// so nothing ever lands past a true empty (§4.7, DESIGN.md).
    fn scan_match(level: &[Slot<K, V>], start: usize, width: usize, key: &K) -> Option<usize> {
        let len = level.len();
        for step in 0..width {
            let idx = (start + step) % len;
            match &level[idx] {
                Slot::Empty => return None,
                Slot::Occupied(k, _) if k == key => return Some(idx),
                _ => {}
            }
        }
        None
    }

    fn scan_vacant(level: &[Slot<K, V>], start: usize, width: usize) -> Option<usize> {
        let len = level.len();
        for step in 0..width {
            let idx = (start + step) % len;
            if level[idx].is_vacant() {
                return Some(idx);
            }
        }
        None
    }

    fn level_bucket_start(&self, level_idx: usize, hash: u64) -> usize {
        let level_len = self.levels[level_idx].len();
        let buckets = level_len / self.beta;
        ((level_hash(hash, level_idx) as usize) % buckets) * self.beta
    }

    fn overflow_first_positions(&self, hash: u64) -> Vec<usize> {
        let len = self.overflow_first.len();
        (0..self.l_overflow)
            .map(|t| (first_half_probe(hash, t) as usize) % len)
            .collect()
    }

    fn overflow_second_starts(&self, hash: u64) -> (usize, usize) {
        let buckets = self.overflow_second.len() / self.second_bucket_width;
        let b1 = (hash as usize % buckets) * self.second_bucket_width;
        let b2 = (mix64(hash ^ SECOND_CHOICE_SALT) as usize % buckets) * self.second_bucket_width;
        (b1, b2)
    }

    /// Scans the two overflow sections in probe order for a match,
    /// stopping each at the first true empty exactly as `scan_match` does
    /// for a primary-level bucket.
    fn find_in_overflow(&self, key: &K, hash: u64) -> Option<(bool, usize)> {
        for idx in self.overflow_first_positions(hash) {
            match &self.overflow_first[idx] {
                Slot::Empty => break,
                Slot::Occupied(k, _) if k == key => return Some((true, idx)),
                _ => {}
            }
        }
        let (b1, b2) = self.overflow_second_starts(hash);
        let width = self.second_bucket_width;
        for step in 0..width {
            for start in [b1, b2] {
                let idx = start + step;
                match &self.overflow_second[idx] {
                    Slot::Occupied(k, _) if k == key => return Some((false, idx)),
                    Slot::Empty => {}
                    _ => {}
                }
            }
        }
        None
    }

    fn find_slot(&self, key: &K, hash: u64) -> Option<(usize, usize)> {
        for level_idx in 0..self.levels.len() {
            let start = self.level_bucket_start(level_idx, hash);
            if let Some(idx) = Self::scan_match(&self.levels[level_idx], start, self.beta, key) {
                return Some((level_idx, idx));
            }
        }
        None
    }

    /// Tries every §4.7 placement strategy in order for a key already
    /// confirmed absent everywhere, returning where it landed.
    fn place_new(&mut self, hash: u64) -> Option<PlacedAt> {
        for level_idx in 0..self.levels.len() {
            let start = self.level_bucket_start(level_idx, hash);
            if let Some(idx) = Self::scan_vacant(&self.levels[level_idx], start, self.beta) {
                return Some(PlacedAt::Level(level_idx, idx));
            }
        }

        for idx in self.overflow_first_positions(hash) {
            if self.overflow_first[idx].is_vacant() {
                return Some(PlacedAt::OverflowFirst(idx));
            }
        }

        let (b1, b2) = self.overflow_second_starts(hash);
        let width = self.second_bucket_width;
        for step in 0..width {
            for start in [b1, b2] {
                let idx = start + step;
                if self.overflow_second[idx].is_vacant() {
                    return Some(PlacedAt::OverflowSecond(idx));
                }
            }
        }

        None
    }

    fn drain_all(&mut self) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.size);
        for level in &mut self.levels {
            for slot in level.drain(..) {
                if let Slot::Occupied(k, v) = slot {
                    out.push((k, v));
                }
            }
        }
        for slot in self.overflow_first.drain(..) {
            if let Slot::Occupied(k, v) = slot {
                out.push((k, v));
            }
        }
        for slot in self.overflow_second.drain(..) {
            if let Slot::Occupied(k, v) = slot {
                out.push((k, v));
            }
        }
        out
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        debug!(
            "funnel table growing budget {} -> {} at {} live entries",
            self.capacity, new_capacity, self.size
        );
        let entries = self.drain_all();
        let layout = compute_layout(new_capacity, self.delta);
        self.levels = layout.level_sizes.into_iter().map(empty_slots).collect();
        self.overflow_first = empty_slots(layout.overflow_first_len);
        self.overflow_second = empty_slots(layout.overflow_second_len);
        self.beta = layout.beta;
        self.l_overflow = layout.l_overflow;
        self.second_bucket_width = layout.second_bucket_width;
        self.capacity = new_capacity;
        for (k, v) in entries {
            let hash = make_hash(&self.hash_builder, &k);
            self.place_new_or_grow(k, v, hash);
        }
    }

    fn place_new_or_grow(&mut self, key: K, value: V, mut hash: u64) {
        loop {
            if let Some(location) = self.place_new(hash) {
                self.commit(location, key, value);
                return;
            }
            self.grow();
            hash = make_hash(&self.hash_builder, &key);
        }
    }

    fn commit(&mut self, location: PlacedAt, key: K, value: V) {
        match location {
            PlacedAt::Level(level_idx, idx) => self.levels[level_idx][idx] = Slot::Occupied(key, value),
            PlacedAt::OverflowFirst(idx) => self.overflow_first[idx] = Slot::Occupied(key, value),
            PlacedAt::OverflowSecond(idx) => self.overflow_second[idx] = Slot::Occupied(key, value),
        }
    }
}

enum PlacedAt {
    Level(usize, usize),
    OverflowFirst(usize),
    OverflowSecond(usize),
}

impl<K, V> Map<K, V> for FunnelTable<K, V>
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
        if let Some((is_first_half, idx)) = self.find_in_overflow(&key, hash) {
            if is_first_half {
                self.overflow_first[idx] = Slot::Occupied(key, value);
            } else {
                self.overflow_second[idx] = Slot::Occupied(key, value);
            }
            return Ok(());
        }
        self.size += 1;
        self.place_new_or_grow(key, value, hash);
        Ok(())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let hash = make_hash(&self.hash_builder, key);
        if let Some((level_idx, idx)) = self.find_slot(key, hash) {
            return match &self.levels[level_idx][idx] {
                Slot::Occupied(_, v) => Some(v.clone()),
                _ => unreachable!(),
            };
        }
        match self.find_in_overflow(key, hash) {
            Some((true, idx)) => match &self.overflow_first[idx] {
                Slot::Occupied(_, v) => Some(v.clone()),
                _ => unreachable!(),
            },
            Some((false, idx)) => match &self.overflow_second[idx] {
                Slot::Occupied(_, v) => Some(v.clone()),
                _ => unreachable!(),
            },
            None => None,
        }
    }

    fn update(&mut self, key: &K, value: V) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        if let Some((level_idx, idx)) = self.find_slot(key, hash) {
            self.levels[level_idx][idx] = Slot::Occupied(key.clone(), value);
            return true;
        }
        match self.find_in_overflow(key, hash) {
            Some((true, idx)) => {
                self.overflow_first[idx] = Slot::Occupied(key.clone(), value);
                true
            }
            Some((false, idx)) => {
                self.overflow_second[idx] = Slot::Occupied(key.clone(), value);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        let hash = make_hash(&self.hash_builder, key);
        if let Some((level_idx, idx)) = self.find_slot(key, hash) {
            self.levels[level_idx][idx] = Slot::Deleted;
            self.size -= 1;
            return true;
        }
        match self.find_in_overflow(key, hash) {
            Some((true, idx)) => {
                self.overflow_first[idx] = Slot::Deleted;
                self.size -= 1;
                true
            }
            Some((false, idx)) => {
                self.overflow_second[idx] = Slot::Deleted;
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
        let layout = compute_layout(self.capacity, self.delta);
        self.levels = layout.level_sizes.into_iter().map(empty_slots).collect();
        self.overflow_first = empty_slots(layout.overflow_first_len);
        self.overflow_second = empty_slots(layout.overflow_second_len);
        self.beta = layout.beta;
        self.l_overflow = layout.l_overflow;
        self.second_bucket_width = layout.second_bucket_width;
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
        let mut t: FunnelTable<u64, u64> = FunnelTable::with_capacity(256, 0.1).unwrap();
        for i in 0..150u64 {
            t.insert(i, i * 3).unwrap();
        }
        for i in 0..150u64 {
            assert_eq!(t.lookup(&i), Some(i * 3));
        }
        assert!(t.update(&7, 777));
        assert_eq!(t.lookup(&7), Some(777));
        assert!(t.remove(&7));
        assert_eq!(t.lookup(&7), None);
        assert_eq!(t.size(), 149);
    }

    #[test]
    fn forced_collisions_still_resolve() {
        let mut t: FunnelTable<u64, u64> = FunnelTable::with_capacity(64, 0.2).unwrap();
        for i in 0..48u64 {
            t.insert(i, i).unwrap();
        }
        for i in 0..48u64 {
            assert_eq!(t.lookup(&i), Some(i));
        }
        assert_eq!(t.size(), 48);
    }

    #[test]
    fn growth_preserves_contents() {
        let mut t: FunnelTable<u64, u64> = FunnelTable::with_capacity(32, 0.1).unwrap();
        for i in 0..400u64 {
            t.insert(i, i).unwrap();
        }
        for i in 0..400u64 {
            assert_eq!(t.lookup(&i), Some(i));
        }
        assert_eq!(t.size(), 400);
    }

    #[test]
    fn invalid_delta_is_rejected() {
        assert!(FunnelTable::<u64, u64>::with_capacity(64, 0.0).is_err());
        assert!(FunnelTable::<u64, u64>::with_capacity(64, 1.0).is_err());
    }

    #[test]
    fn remove_then_reinsert_does_not_duplicate() {
        let mut t: FunnelTable<u64, u64> = FunnelTable::with_capacity(64, 0.15).unwrap();
        for i in 0..40u64 {
            t.insert(i, i).unwrap();
        }
        assert!(t.remove(&3));
        t.insert(3, 999).unwrap();
        assert_eq!(t.lookup(&3), Some(999));
        assert_eq!(t.size(), 40);
    }
}
