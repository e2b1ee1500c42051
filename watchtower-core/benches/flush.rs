use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use watchtower_core::scheduler;
use watchtower_core::{Getter, Record, Scope, Value, Watcher, WatcherOptions};

fn counter_scope() -> (Scope, Record) {
    let scope = Scope::new("bench", Value::from_json(json!({"n": 0})));
    let record = scope.data().as_record().cloned().unwrap_or_default();
    (scope, record)
}

fn watchers_on_n(scope: &Scope, count: usize, sync: bool) -> Vec<Watcher> {
    (0..count)
        .map(|_| {
            Watcher::new(
                scope,
                Getter::path("n"),
                None,
                WatcherOptions {
                    sync,
                    ..WatcherOptions::default()
                },
            )
            .unwrap()
        })
        .collect()
}

fn bench_notify_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_fanout");
    for count in [1usize, 10, 100, 1000] {
        let (scope, record) = counter_scope();
        let _watchers = watchers_on_n(&scope, count, true);
        let mut n = 0;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                n += 1;
                record.set("n", black_box(n));
            })
        });
    }
    group.finish();
}

fn bench_batched_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_flush");
    for count in [10usize, 100, 1000] {
        let (scope, record) = counter_scope();
        let _watchers = watchers_on_n(&scope, count, false);
        let mut n = 0;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                // Several writes per tick, one flush.
                for _ in 0..4 {
                    n += 1;
                    record.set("n", black_box(n));
                }
                scheduler::run_until_idle()
            })
        });
    }
    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let (scope, record) = counter_scope();
    let mut last = scope.computed("link 0", |scope| {
        Ok(scope.data().as_record().map(|r| r.get("n")).unwrap_or_default())
    });
    for i in 1..50 {
        let prev = last.clone();
        last = scope.computed(format!("link {i}"), move |_| prev.get());
    }
    let mut n = 0;
    c.bench_function("computed_chain_50", |b| {
        b.iter(|| {
            n += 1;
            record.set("n", n);
            black_box(last.get().unwrap_or_default())
        })
    });
}

criterion_group!(benches, bench_notify_fanout, bench_batched_flush, bench_computed_chain);
criterion_main!(benches);
