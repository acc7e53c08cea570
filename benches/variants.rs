use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use hashkit::{
    ChainingTable, CuckooTable, ElasticTable, FunnelTable, IcebergTable, LinearProbingTable, Map,
    PartitionedFingerprintTable, PerfectHashTable,
};

const N: u64 = 10_000;

fn fill<M: Map<u64, u64>>(table: &mut M) {
    for i in 0..N {
        table.insert(i, i).unwrap();
    }
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.bench_function(BenchmarkId::new("variant", "lp"), |b| {
        b.iter(|| {
            let mut t: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(16);
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "chain"), |b| {
        b.iter(|| {
            let mut t: ChainingTable<u64, u64> = ChainingTable::with_buckets(1024);
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "cuckoo"), |b| {
        b.iter(|| {
            let mut t: CuckooTable<u64, u64> = CuckooTable::with_capacity(16);
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "perfect"), |b| {
        b.iter(|| {
            let mut t: PerfectHashTable<u64, u64> = PerfectHashTable::with_buckets(64);
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "iceberg"), |b| {
        b.iter(|| {
            let mut t: IcebergTable<u64, u64> = IcebergTable::with_blocks(16);
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "funnel"), |b| {
        b.iter(|| {
            let mut t: FunnelTable<u64, u64> = FunnelTable::with_capacity(16_384, 0.1).unwrap();
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "elastic"), |b| {
        b.iter(|| {
            let mut t: ElasticTable<u64, u64> = ElasticTable::with_capacity(16_384, 0.1).unwrap();
            fill(&mut t);
        })
    });
    group.bench_function(BenchmarkId::new("variant", "ipbt"), |b| {
        b.iter(|| {
            let mut t: PartitionedFingerprintTable<u64, u64> =
                PartitionedFingerprintTable::with_capacity(16_384, 2.0).unwrap();
            fill(&mut t);
        })
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let mut lp: LinearProbingTable<u64, u64> = LinearProbingTable::with_capacity(16);
    fill(&mut lp);
    group.bench_function(BenchmarkId::new("variant", "lp"), |b| {
        b.iter(|| {
            for i in 0..N {
                criterion::black_box(lp.lookup(&i));
            }
        })
    });

    let mut chain: ChainingTable<u64, u64> = ChainingTable::with_buckets(1024);
    fill(&mut chain);
    group.bench_function(BenchmarkId::new("variant", "chain"), |b| {
        b.iter(|| {
            for i in 0..N {
                criterion::black_box(chain.lookup(&i));
            }
        })
    });

    let mut cuckoo: CuckooTable<u64, u64> = CuckooTable::with_capacity(16);
    fill(&mut cuckoo);
    group.bench_function(BenchmarkId::new("variant", "cuckoo"), |b| {
        b.iter(|| {
            for i in 0..N {
                criterion::black_box(cuckoo.lookup(&i));
            }
        })
    });

    let mut funnel: FunnelTable<u64, u64> = FunnelTable::with_capacity(16_384, 0.1).unwrap();
    fill(&mut funnel);
    group.bench_function(BenchmarkId::new("variant", "funnel"), |b| {
        b.iter(|| {
            for i in 0..N {
                criterion::black_box(funnel.lookup(&i));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup);
criterion_main!(benches);
