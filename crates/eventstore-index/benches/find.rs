//! Range query benchmarks
//!
//! Compares the flat and clustered strategies on the same data set:
//! - Small limit inside a large window (clustered reads a bounded slice)
//! - Reverse pagination from the newest event
//! - Multi-source merge
//!
//! Run with: cargo bench -p eventstore-index

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use eventstore_core::{Event, IndexDimension, TimeWindow};
use eventstore_index::{
    ClusterConfig, ClusteredTimeIndex, FlatRangeIndex, RangeIndex, find_many,
};
use eventstore_storage::InMemoryOrderedStore;

const EVENTS_PER_SOURCE: i64 = 5_000;
const SOURCES: [&str; 3] = ["press", "oven", "lathe"];

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 2, 12, 34, 56).unwrap()
}

async fn populate(index: &dyn RangeIndex) {
    for i in 0..EVENTS_PER_SOURCE {
        for source in SOURCES {
            let event = Event::from_pairs(
                start() + Duration::seconds(i * 5),
                source,
                [("seq", i.to_string())],
            )
            .unwrap();
            index.store(&event).await.unwrap();
        }
    }
}

fn indexes(rt: &Runtime) -> Vec<(&'static str, Arc<dyn RangeIndex>)> {
    let flat: Arc<dyn RangeIndex> = Arc::new(FlatRangeIndex::new(InMemoryOrderedStore::new()));
    let clustered: Arc<dyn RangeIndex> = Arc::new(ClusteredTimeIndex::new(
        InMemoryOrderedStore::new(),
        ClusterConfig::default(),
    ));
    rt.block_on(async {
        populate(flat.as_ref()).await;
        populate(clustered.as_ref()).await;
    });
    vec![("flat", flat), ("clustered", clustered)]
}

fn bench_find(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let indexes = indexes(&rt);
    let dimension = &IndexDimension::source("press");
    let end = start() + Duration::seconds(EVENTS_PER_SOURCE * 5);

    let mut group = c.benchmark_group("find_first_10");
    for (name, index) in &indexes {
        let window = &TimeWindow::new(Some(start()), Some(end));
        group.bench_with_input(BenchmarkId::from_parameter(name), index, |b, index| {
            b.to_async(&rt).iter(move || async move {
                black_box(index.find(dimension, window, 10).await.unwrap())
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("find_latest_10_reverse");
    for (name, index) in &indexes {
        let window = &TimeWindow::new(Some(end), Some(start()));
        group.bench_with_input(BenchmarkId::from_parameter(name), index, |b, index| {
            b.to_async(&rt).iter(move || async move {
                black_box(index.find(dimension, window, 10).await.unwrap())
            });
        });
    }
    group.finish();
}

fn bench_find_many(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let indexes = indexes(&rt);
    let sources: &[String] = &SOURCES.map(String::from);
    let window = &TimeWindow::new(Some(start() + Duration::hours(1)), None);

    let mut group = c.benchmark_group("find_many_100");
    for (name, index) in &indexes {
        group.bench_with_input(BenchmarkId::from_parameter(name), index, |b, index| {
            b.to_async(&rt).iter(move || async move {
                black_box(
                    find_many(index.as_ref(), sources, window, 100)
                        .await
                        .unwrap(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find, bench_find_many);
criterion_main!(benches);
