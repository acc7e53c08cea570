use std::hash::Hash;

use crate::error::Result;

/// The abstract mapping contract every table variant implements.
///
/// This mirrors the capability set the teacher crate split across
/// `OrderedOps`/`RandomOps`: a small trait naming exactly the operations
/// callers need, with variants differing only in how they satisfy it
/// internally. Unlike `RandomOps`, `insert` here is fallible — some
/// variants (`PerfectHashTable`, `PartitionedFingerprintTable`) can exhaust
/// a bounded retry budget during collision repair and must surface that.
pub trait Map<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Inserts `value` under `key`. Overwrites the value if `key` is
    /// already live; otherwise adds a new live entry, growing the table's
    /// backing storage if needed.
    fn insert(&mut self, key: K, value: V) -> Result<()>;

    /// Returns a copy of the value stored under `key`, if any.
    fn lookup(&self, key: &K) -> Option<V>;

    /// Replaces the value stored under `key` if it is live. Returns `false`
    /// without inserting if `key` is absent.
    fn update(&mut self, key: &K, value: V) -> bool;

    /// Removes `key` if it is live. Returns whether anything was removed.
    fn remove(&mut self, key: &K) -> bool;

    /// Number of live entries.
    fn size(&self) -> usize;

    /// Removes every entry. Capacity is preserved unless documented
    /// otherwise by the variant.
    fn clear(&mut self);

    /// Live entries divided by the variant's capacity denominator.
    fn load_factor(&self) -> f64;

    /// The variant-specific capacity measure (§6 of the design doc).
    fn capacity(&self) -> usize;
}
