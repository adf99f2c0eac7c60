//! Benchmarks for tether
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tether::{Observable, ObservableVec, bind_one_way, bind_two_way, cloned, property};

// =============================================================================
// OBSERVABLE BENCHMARKS
// =============================================================================

fn bench_observable_set(c: &mut Criterion) {
    let obs = Observable::new(0i32);
    let mut n = 0;
    c.bench_function("observable_set", |b| {
        b.iter(|| {
            n += 1;
            obs.set(black_box(n))
        })
    });
}

fn bench_observable_set_same_value(c: &mut Criterion) {
    let obs = Observable::new(42i32);
    c.bench_function("observable_set_same_value", |b| b.iter(|| obs.set(black_box(42))));
}

// =============================================================================
// PROPERTY BENCHMARKS
// =============================================================================

fn bench_property_cached_get(c: &mut Criterion) {
    let a = Observable::new(2i32);
    let doubled = property(cloned!(a => move || a.get() * 2));
    doubled.get();
    c.bench_function("property_cached_get", |b| b.iter(|| black_box(doubled.get())));
}

fn bench_property_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_chain");
    for depth in [1usize, 10, 100] {
        let root = Observable::new(0i64);
        let mut tail = property(cloned!(root => move || root.get()));
        for _ in 1..depth {
            let prev = tail.clone();
            tail = property(move || prev.get() + 1);
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut n = 0;
            b.iter(|| {
                n += 1;
                root.set(n);
                black_box(tail.get())
            })
        });
    }
    group.finish();
}

// =============================================================================
// BINDING BENCHMARKS
// =============================================================================

fn bench_one_way_propagation(c: &mut Criterion) {
    let source = Observable::new(0i32);
    let target = Observable::new(0i32);
    let _binding = bind_one_way(&source, &target).unwrap();
    let mut n = 0;
    c.bench_function("one_way_propagation", |b| {
        b.iter(|| {
            n += 1;
            source.set(black_box(n))
        })
    });
}

fn bench_two_way_propagation(c: &mut Criterion) {
    let a = Observable::new(0i32);
    let b_side = Observable::new(0i32);
    let _binding = bind_two_way(&a, &b_side).unwrap();
    let mut n = 0;
    c.bench_function("two_way_propagation", |b| {
        b.iter(|| {
            n += 1;
            if n % 2 == 0 {
                a.set(black_box(n))
            } else {
                b_side.set(black_box(n))
            }
        })
    });
}

// =============================================================================
// COLLECTION BENCHMARKS
// =============================================================================

fn bench_vec_batch(c: &mut Criterion) {
    c.bench_function("vec_batch_100_pushes", |b| {
        b.iter(|| {
            let items = ObservableVec::<i32>::new();
            let _sub = items.subscribe(|set| {
                black_box(set.len());
            });
            items.batch(|items| {
                for i in 0..100 {
                    items.push(i);
                }
            });
            black_box(items.len())
        })
    });
}

criterion_group!(
    benches,
    bench_observable_set,
    bench_observable_set_same_value,
    bench_property_cached_get,
    bench_property_chain,
    bench_one_way_propagation,
    bench_two_way_propagation,
    bench_vec_batch,
);
criterion_main!(benches);
