//! The seven table variants, each implementing [`crate::map::Map`].

pub mod chain;
pub mod cuckoo;
pub mod elastic;
pub mod funnel;
pub mod iceberg;
pub mod ipbt;
pub mod lp;
pub mod perfect;

/// Per-slot occupancy state shared by the three-state variants (LP,
/// Elastic, Funnel). A `Deleted` slot may be reused for insertion but must
/// never terminate a probe scan for lookups (§3).
#[derive(Clone, Debug)]
pub(crate) enum Slot<K, V> {
    Empty,
    Occupied(K, V),
    Deleted,
}

impl<K, V> Slot<K, V> {
    #[inline]
    pub(crate) fn is_vacant(&self) -> bool {
        matches!(self, Slot::Empty | Slot::Deleted)
    }

    #[inline]
    pub(crate) fn key(&self) -> Option<&K> {
        match self {
            Slot::Occupied(k, _) => Some(k),
            _ => None,
        }
    }
}

impl<K, V> Default for Slot<K, V> {
    fn default() -> Self {
        Slot::Empty
    }
}

#[inline]
pub(crate) fn empty_slots<K, V>(n: usize) -> Vec<Slot<K, V>> {
    (0..n).map(|_| Slot::Empty).collect()
}

#[inline]
pub(crate) fn empty_options<K, V>(n: usize) -> Vec<Option<(K, V)>> {
    (0..n).map(|_| None).collect()
}
