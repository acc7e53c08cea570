use std::hash::{BuildHasher, Hash, Hasher};

/// Default hash builder for all table variants.
///
/// `FxHash` is kept from the teacher crate's `index::hash` module: keys in
/// these tables tend to be small, fixed-size values (integers, short
/// strings) where FxHash's speed matters more than DoS resistance.
pub type DefaultHashBuilder = fxhash::FxBuildHasher;

#[inline]
pub(crate) fn make_hash<K: Hash + ?Sized>(hash_builder: &impl BuildHasher, val: &K) -> u64 {
    let mut state = hash_builder.build_hasher();
    val.hash(&mut state);
    state.finish()
}

/// SplitMix64 finalizer, used wherever a table needs a second hash that is
/// not simply a shifted view of the primary one (Elastic/Funnel probe
/// sequences, IPBT fingerprints, Iceberg's secondary index).
#[inline]
pub(crate) fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}
