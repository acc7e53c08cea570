use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hashkit::{
    ChainingTable, CuckooTable, ElasticTable, FunnelTable, IcebergTable, LinearProbingTable, Map,
    PartitionedFingerprintTable, PerfectHashTable,
};

/// Runs the universal properties (§8, properties 1-9) against any `Map`
/// implementation for a modest key range.
fn check_universal_properties<M: Map<u64, u64>>(mut table: M) {
    assert_eq!(table.size(), 0);
    assert_eq!(table.load_factor(), 0.0);

    for i in 0..64u64 {
        table.insert(i, i * 7).unwrap();
    }
    assert_eq!(table.size(), 64);
    for i in 0..64u64 {
        assert_eq!(table.lookup(&i), Some(i * 7));
    }

    // insert-then-lookup always succeeds for the same key.
    table.insert(1000, 1).unwrap();
    assert_eq!(table.lookup(&1000), Some(1));

    // overwrite does not change size.
    let before = table.size();
    table.insert(1000, 2).unwrap();
    assert_eq!(table.size(), before);
    assert_eq!(table.lookup(&1000), Some(2));

    // update on an absent key is a no-op reported as failure.
    assert!(!table.update(&999_999, 0));
    assert_eq!(table.lookup(&999_999), None);

    // remove on a present key shrinks size and makes it unreachable.
    assert!(table.remove(&1000));
    assert_eq!(table.lookup(&1000), None);
    assert_eq!(table.size(), before - 1);

    // remove on an absent key reports failure and does not undershoot.
    assert!(!table.remove(&1000));
    assert_eq!(table.size(), before - 1);

    // clear empties the table but capacity is unaffected.
    let capacity_before_clear = table.capacity();
    table.clear();
    assert_eq!(table.size(), 0);
    assert_eq!(table.capacity(), capacity_before_clear);
    assert_eq!(table.lookup(&0), None);
}

#[test]
fn universal_properties_linear_probing() {
    check_universal_properties(LinearProbingTable::<u64, u64>::with_capacity(8));
}

#[test]
fn universal_properties_chaining() {
    check_universal_properties(ChainingTable::<u64, u64>::with_buckets(17));
}

#[test]
fn universal_properties_cuckoo() {
    check_universal_properties(CuckooTable::<u64, u64>::with_capacity(16));
}

#[test]
fn universal_properties_perfect() {
    check_universal_properties(PerfectHashTable::<u64, u64>::with_buckets(16));
}

#[test]
fn universal_properties_iceberg() {
    check_universal_properties(IcebergTable::<u64, u64>::with_blocks(8));
}

#[test]
fn universal_properties_funnel() {
    check_universal_properties(FunnelTable::<u64, u64>::with_capacity(256, 0.1).unwrap());
}

#[test]
fn universal_properties_elastic() {
    check_universal_properties(ElasticTable::<u64, u64>::with_capacity(128, 0.15).unwrap());
}

#[test]
fn universal_properties_ipbt() {
    check_universal_properties(PartitionedFingerprintTable::<u64, u64>::with_capacity(128, 2.0).unwrap());
}

/// Scenario S4 (§8): forcing a funnel table into heavy bucket contention by
/// inserting keys that collide on the first level's bucket hash, then
/// confirming every key is still reachable afterward.
#[test]
fn scenario_funnel_forced_collisions() {
    let mut t: FunnelTable<u64, u64> = FunnelTable::with_capacity(64, 0.2).unwrap();
    for i in 0..48u64 {
        t.insert(i * 97, i).unwrap();
    }
    for i in 0..48u64 {
        assert_eq!(t.lookup(&(i * 97)), Some(i));
    }
    assert_eq!(t.size(), 48);
}

/// Scenario S5 (§8): remove every even key from a densely filled elastic
/// table, confirm the odd keys survive untouched, then reinsert the evens
/// with new values and confirm no stale duplicate resurfaces.
#[test]
fn scenario_elastic_remove_even_keys() {
    let mut t: ElasticTable<u64, u64> = ElasticTable::with_capacity(256, 0.1).unwrap();
    for i in 0..400u64 {
        t.insert(i, i).unwrap();
    }
    for i in (0..400u64).step_by(2) {
        assert!(t.remove(&i));
    }
    assert_eq!(t.size(), 200);
    for i in (1..400u64).step_by(2) {
        assert_eq!(t.lookup(&i), Some(i));
    }
    for i in (0..400u64).step_by(2) {
        t.insert(i, i + 1).unwrap();
    }
    assert_eq!(t.size(), 400);
    for i in (0..400u64).step_by(2) {
        assert_eq!(t.lookup(&i), Some(i + 1));
    }
}

/// Scenario S6 (§8): a seeded randomized mixed-operation stress run against
/// a plain `std::collections::HashMap` oracle, checked after every
/// operation, across all eight variants.
#[test]
fn scenario_randomized_stress_against_oracle() {
    fn run<M: Map<u64, u64>>(mut table: M, seed: u64) {
        let mut oracle = std::collections::HashMap::new();
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..10_000u32 {
            let key = rng.gen_range(0, 500u64);
            match rng.gen_range(0, 4u8) {
                0 => {
                    let value = rng.gen::<u64>();
                    table.insert(key, value).unwrap();
                    oracle.insert(key, value);
                }
                1 => {
                    assert_eq!(table.lookup(&key), oracle.get(&key).copied());
                }
                2 => {
                    let value = rng.gen::<u64>();
                    let did_update = table.update(&key, value);
                    assert_eq!(did_update, oracle.contains_key(&key));
                    if did_update {
                        oracle.insert(key, value);
                    }
                }
                _ => {
                    let did_remove = table.remove(&key);
                    assert_eq!(did_remove, oracle.contains_key(&key));
                    oracle.remove(&key);
                }
            }
        }

        assert_eq!(table.size(), oracle.len());
        for (key, value) in &oracle {
            assert_eq!(table.lookup(key), Some(*value));
        }
    }

    run(LinearProbingTable::<u64, u64>::with_capacity(8), 1);
    run(ChainingTable::<u64, u64>::with_buckets(17), 2);
    run(CuckooTable::<u64, u64>::with_capacity(16), 3);
    run(PerfectHashTable::<u64, u64>::with_buckets(16), 4);
    run(IcebergTable::<u64, u64>::with_blocks(8), 5);
    run(FunnelTable::<u64, u64>::with_capacity(512, 0.1).unwrap(), 6);
    run(ElasticTable::<u64, u64>::with_capacity(512, 0.1).unwrap(), 7);
    run(
        PartitionedFingerprintTable::<u64, u64>::with_capacity(512, 2.0).unwrap(),
        8,
    );
}
