//! Performance benchmarks for the event store.

use chronolog::{
    Boundary, EventId, EventInput, EventStore, OrderTotals, Position, ProjectionManager,
    StoreConfig, SubscriptionFilter, TemporalQueryEngine, Timestamp,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn order_event(id: u64) -> EventInput {
    EventInput::new(
        EventId(id),
        "order_created",
        json!({"order": "A", "amount": 1.0}),
    )
    .with_timestamp(Timestamp(id as i64))
}

fn populated_store(events: u64) -> Arc<EventStore> {
    let store = Arc::new(EventStore::in_memory());
    for i in 0..events {
        store.append(order_event(i)).unwrap();
    }
    store
}

/// Benchmark the hot path: append with a varying number of observers
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for observers in [0, 1, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("observers", observers),
            &observers,
            |b, &observers| {
                let store = EventStore::in_memory();
                for _ in 0..observers {
                    store.subscribe(SubscriptionFilter::all(), |_, event| {
                        black_box(&event.id);
                    });
                }
                let mut next_id = 0u64;
                b.iter(|| {
                    store.append(order_event(next_id)).unwrap();
                    next_id += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_durable_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("durable_append");

    for sync_interval in [1, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("sync_interval", sync_interval),
            &sync_interval,
            |b, &sync_interval| {
                let dir = TempDir::new().unwrap();
                let store = EventStore::open_or_create(StoreConfig {
                    path: dir.path().join("store"),
                    sync_interval,
                    create_if_missing: true,
                })
                .unwrap();
                let mut next_id = 0u64;
                b.iter(|| {
                    store.append(order_event(next_id)).unwrap();
                    next_id += 1;
                });
            },
        );
    }

    group.finish();
}

/// Benchmark projection rebuild with varying log sizes
fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");

    for events in [100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("events", events), &events, |b, &events| {
            let store = populated_store(events);
            let projections = ProjectionManager::new(Arc::clone(&store));
            projections.register(Box::new(OrderTotals::new())).unwrap();

            b.iter(|| projections.rebuild("order_totals").unwrap());
        });
    }

    group.finish();
}

/// Benchmark temporal reconstruction at a mid-log boundary
fn bench_temporal_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("temporal_query");

    for events in [100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("events", events), &events, |b, &events| {
            let store = populated_store(events);
            let engine = TemporalQueryEngine::new(Arc::clone(&store));
            let boundary = Boundary::Timestamp(Timestamp(events as i64 / 2));

            b.iter(|| {
                let state = engine
                    .as_of(boundary, || Box::new(OrderTotals::new()))
                    .unwrap();
                black_box(state);
            });
        });
    }

    group.finish();
}

fn bench_point_lookups(c: &mut Criterion) {
    let store = populated_store(10_000);

    c.bench_function("get_by_id", |b| {
        b.iter(|| store.get(black_box(EventId(5_000))).unwrap());
    });

    c.bench_function("slice_1000", |b| {
        b.iter(|| black_box(store.slice(Position(4_000), Position(5_000))));
    });
}

criterion_group!(
    benches,
    bench_append,
    bench_durable_append,
    bench_rebuild,
    bench_temporal_query,
    bench_point_lookups
);
criterion_main!(benches);
