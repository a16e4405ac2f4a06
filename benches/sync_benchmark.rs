/*!
 * Coordination Primitives Benchmarks
 *
 * Counter contention and quorum wait strategies
 */

use coordkit::core::sync::{
    run_indexed, CompletionBarrier, GuardedCounter, StrategyType, SyncConfig, VoteCoordinator,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_counter_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_contention");

    for workers in [1usize, 4, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    let counter = Arc::new(GuardedCounter::new());
                    let shared = counter.clone();
                    run_indexed(workers, move |_| {
                        for _ in 0..1000 {
                            shared.increment();
                        }
                    })
                    .unwrap();
                    black_box(counter.read());
                });
            },
        );
    }

    group.finish();
}

fn bench_quorum_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("quorum_strategy");

    for strategy in [StrategyType::SpinWait, StrategyType::Condvar] {
        let coordinator = VoteCoordinator::new(SyncConfig::default().with_strategy(strategy));

        group.bench_with_input(
            BenchmarkId::from_parameter(strategy.name()),
            &coordinator,
            |b, coordinator| {
                b.iter(|| {
                    black_box(coordinator.run(10, 5, |i| {
                        thread::sleep(Duration::from_micros(50 * i as u64));
                        i % 2 == 0
                    }))
                });
            },
        );
    }

    group.finish();
}

fn bench_barrier_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("barrier_release");

    for units in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(units), &units, |b, &units| {
            b.iter(|| {
                let barrier = Arc::new(CompletionBarrier::new());
                let handles: Vec<_> = (0..units)
                    .map(|_| {
                        let token = barrier.register_token();
                        thread::spawn(move || drop(token))
                    })
                    .collect();

                barrier.await_all();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_uncontended_increment(c: &mut Criterion) {
    c.bench_function("increment_uncontended", |b| {
        let counter = GuardedCounter::new();

        b.iter(|| {
            black_box(counter.increment());
        });
    });
}

criterion_group!(
    benches,
    bench_counter_contention,
    bench_quorum_strategy,
    bench_barrier_release,
    bench_uncontended_increment
);

criterion_main!(benches);
