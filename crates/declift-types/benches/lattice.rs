//! Benchmarks for type lattice operations and interval maps.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use declift_types::{CompoundType, DataIntervalMap, SharedType, UnionType};

/// A struct of `fields` members alternating between ints and pointers.
fn create_struct(fields: usize) -> SharedType {
    let mut c = CompoundType::new();
    for i in 0..fields {
        let ty = if i % 2 == 0 {
            SharedType::size_only(32)
        } else {
            SharedType::pointer(SharedType::void())
        };
        c.add_field(ty, format!("f{}", i));
    }
    SharedType::compound(c)
}

fn bench_scalar_meet(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalar_meet");

    let size = SharedType::size_only(32);
    let int = SharedType::integer(0, -1);
    group.bench_function("size_int", |b| {
        b.iter(|| {
            let mut changed = false;
            black_box(size.meet_with(black_box(&int), &mut changed, false))
        })
    });

    let float = SharedType::float(64);
    group.bench_function("int_float_union", |b| {
        b.iter(|| {
            let mut changed = false;
            black_box(int.meet_with(black_box(&float), &mut changed, false))
        })
    });

    let pv = SharedType::pointer(SharedType::void());
    let pi = SharedType::pointer(SharedType::integer(32, 1));
    group.bench_function("pointer_pointer", |b| {
        b.iter(|| {
            let mut changed = false;
            black_box(pv.meet_with(black_box(&pi), &mut changed, false))
        })
    });

    group.finish();
}

fn bench_aggregate_meet(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_meet");

    for fields in [4, 16, 64] {
        let s = create_struct(fields);
        let wider = create_struct(fields + 1);
        group.bench_with_input(BenchmarkId::new("struct_prefix", fields), &fields, |b, _| {
            b.iter(|| {
                let mut changed = false;
                black_box(s.meet_with(black_box(&wider), &mut changed, false))
            })
        });
    }

    let mut u = UnionType::new();
    for size in [8, 16, 32, 64] {
        u.add_alternative(SharedType::float(size * 2));
        u.add_alternative(SharedType::pointer(SharedType::integer(size, 1)));
    }
    let u = SharedType::union(u);
    let member = SharedType::integer(32, -1);
    group.bench_function("union_add", |b| {
        b.iter(|| {
            let mut changed = false;
            black_box(u.meet_with(black_box(&member), &mut changed, false))
        })
    });

    group.finish();
}

fn bench_interval_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("interval_map");

    for count in [100u64, 1000] {
        group.bench_with_input(BenchmarkId::new("add_items", count), &count, |b, &count| {
            b.iter(|| {
                let mut map = DataIntervalMap::new();
                for i in 0..count {
                    let _ = map.add_item(i * 8, format!("v{}", i), SharedType::integer(32, 1), false);
                    let _ = map.add_item(i * 8, format!("w{}", i), SharedType::size_only(32), false);
                }
                black_box(map.len())
            })
        });
    }

    let mut map = DataIntervalMap::new();
    for i in 0..1000u64 {
        let _ = map.add_item(i * 16, format!("s{}", i), create_struct(4), false);
    }
    group.bench_function("find", |b| b.iter(|| black_box(map.find(black_box(8004)))));

    group.finish();
}

criterion_group!(benches, bench_scalar_meet, bench_aggregate_meet, bench_interval_map);
criterion_main!(benches);
