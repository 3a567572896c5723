//! Benchmarks for the task scheduler.
//!
//! Benchmarks cover:
//! - Priority queue operations (push/pop, mixed priorities, retain)
//! - Scheduler throughput for independent tasks
//! - Dependency chains and fan-in
//! - Event delivery overhead

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prometheus_task_scheduler::{
    EventKind, PriorityQueue, Scheduler, SchedulerBuilder, TaskId, TaskOptions,
};
use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn random_priorities(count: u64, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(-100..100)).collect()
}

fn build_scheduler(max_concurrent: usize) -> Scheduler<u64> {
    SchedulerBuilder::new()
        .max_concurrent(max_concurrent)
        .build()
        .expect("scheduler")
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_pop");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q = PriorityQueue::new();
                for i in 0..size {
                    q.push(i);
                }
                while let Some(item) = q.pop() {
                    black_box(item);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_mixed_priorities(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_mixed_priorities");

    for size in [100, 1_000, 5_000] {
        let priorities = random_priorities(size, 7);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &priorities, |b, priorities| {
            b.iter(|| {
                let mut q = PriorityQueue::with_comparator(|a: &(i32, usize), b: &(i32, usize)| {
                    a.0.cmp(&b.0).then(a.1.cmp(&b.1))
                });
                for (seq, &p) in priorities.iter().enumerate() {
                    q.push((p, seq));
                }
                let mut count = 0;
                while q.pop().is_some() {
                    count += 1;
                }
                black_box(count);
            });
        });
    }
    group.finish();
}

fn bench_queue_retain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_retain");

    for size in [100, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q: PriorityQueue<u64> = (0..size).collect();
                // Drop every other entry, as a cancellation sweep would.
                let removed = q.retain(|v| v % 2 == 0);
                black_box(removed);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_scheduler_independent_tasks(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_independent_tasks");

    for concurrency in [1_usize, 4, 16] {
        group.throughput(Throughput::Elements(500));
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, &concurrency| {
                b.to_async(Runtime::new().unwrap()).iter(|| async move {
                    let scheduler = build_scheduler(concurrency);
                    for i in 0..500_u64 {
                        scheduler.add_task(
                            format!("task-{i}"),
                            move || async move { Ok(i) },
                            TaskOptions::new().with_priority((i % 7) as i32),
                        );
                    }
                    black_box(scheduler.wait_for_completion().await);
                });
            },
        );
    }
    group.finish();
}

fn bench_scheduler_dependency_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_dependency_chain");

    for length in [10_u64, 100, 500] {
        group.throughput(Throughput::Elements(length));
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let scheduler = build_scheduler(4);
                let mut previous: Option<TaskId> = None;
                for i in 0..length {
                    let options = TaskOptions::new().with_dependencies(previous);
                    previous = Some(scheduler.add_task("link", move || async move { Ok(i) }, options));
                }
                black_box(scheduler.wait_for_completion().await);
            });
        });
    }
    group.finish();
}

fn bench_scheduler_fan_in(c: &mut Criterion) {
    c.bench_function("scheduler_fan_in_200", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| async {
            let scheduler = build_scheduler(8);
            let roots: Vec<TaskId> = (0..200_u64)
                .map(|i| scheduler.add_task("root", move || async move { Ok(i) }, TaskOptions::new()))
                .collect();
            scheduler.add_task(
                "sink",
                || async { Ok(0) },
                TaskOptions::new().with_dependencies(roots),
            );
            black_box(scheduler.wait_for_completion().await);
        });
    });
}

fn bench_event_delivery(c: &mut Criterion) {
    c.bench_function("scheduler_events_4_handlers", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| async {
            let scheduler = build_scheduler(4);
            let seen = Arc::new(AtomicU64::new(0));
            for kind in [
                EventKind::TaskAdded,
                EventKind::TaskStarted,
                EventKind::TaskCompleted,
                EventKind::AllTasksCompleted,
            ] {
                let seen = Arc::clone(&seen);
                scheduler.subscribe(kind, move |_| {
                    seen.fetch_add(1, Ordering::Relaxed);
                });
            }
            for i in 0..200_u64 {
                scheduler.add_task("evented", move || async move { Ok(i) }, TaskOptions::new());
            }
            scheduler.wait_for_completion().await;
            black_box(seen.load(Ordering::Relaxed));
        });
    });
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    queue_benches,
    bench_queue_push_pop,
    bench_queue_mixed_priorities,
    bench_queue_retain
);

criterion_group!(
    scheduler_benches,
    bench_scheduler_independent_tasks,
    bench_scheduler_dependency_chain,
    bench_scheduler_fan_in,
    bench_event_delivery
);

criterion_main!(queue_benches, scheduler_benches);
