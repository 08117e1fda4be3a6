//! Aggregation throughput benchmarks.
//!
//! Run with: `cargo bench --package ohlcflow-bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ohlcflow_bench::{WorkloadConfig, generate_raw, generate_trades};
use ohlcflow_lib::{
    EmissionMode, Emitter, Engine, EngineConfig, ManualClock, UpsertSink, WindowLifecycle,
    WindowResolver, WindowSpec, WindowStore, reduce,
};
use std::sync::Arc;
use std::time::Duration;

fn workloads() -> Vec<(&'static str, WorkloadConfig)> {
    vec![
        (
            "1-symbol",
            WorkloadConfig {
                symbols: 1,
                trades_per_symbol: 50_000,
                step_ms: 10,
            },
        ),
        (
            "32-symbols",
            WorkloadConfig {
                symbols: 32,
                trades_per_symbol: 2_000,
                step_ms: 100,
            },
        ),
    ]
}

fn reduce_benchmark(c: &mut Criterion) {
    let resolver = WindowResolver::new(WindowSpec::MINUTE);
    let config = WorkloadConfig {
        symbols: 1,
        trades_per_symbol: 6_000,
        step_ms: 10,
    };
    let trades = generate_trades(&config);

    let mut group = c.benchmark_group("reduce");
    group.throughput(Throughput::Elements(trades.len() as u64));
    group.bench_function("single-window", |b| {
        b.iter(|| {
            let mut candle = None;
            for trade in &trades {
                candle = Some(reduce(candle, trade, &resolver));
            }
            candle
        });
    });
    group.finish();
}

fn lifecycle_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    for (name, config) in workloads() {
        let trades = generate_trades(&config);
        group.throughput(Throughput::Elements(trades.len() as u64));

        for mode in [EmissionMode::Continuous, EmissionMode::CloseOnly] {
            group.bench_with_input(
                BenchmarkId::new(mode.as_str(), name),
                &trades,
                |b, trades| {
                    b.iter(|| {
                        let store = Arc::new(WindowStore::new(WindowResolver::new(
                            WindowSpec::MINUTE,
                        )));
                        let (emitter, mut queue) = Emitter::bounded(1024, mode);
                        let lifecycle =
                            WindowLifecycle::new(store, emitter, Arc::new(ManualClock::new(0)), 0);
                        for trade in trades {
                            let _ = lifecycle.on_trade(trade);
                            while queue.try_recv().is_some() {}
                        }
                        lifecycle.flush_all()
                    });
                },
            );
        }
    }

    group.finish();
}

fn engine_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");

    let mut group = c.benchmark_group("engine");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for (name, config) in workloads() {
        let raw = generate_raw(&config);
        let names = config.symbol_names();
        group.throughput(Throughput::Elements(raw.len() as u64));

        for workers in [1usize, 4] {
            group.bench_with_input(
                BenchmarkId::new(format!("{workers}-workers"), name),
                &raw,
                |b, raw| {
                    b.to_async(&runtime).iter(|| {
                        let engine_config = EngineConfig::new(WindowSpec::MINUTE, names.clone())
                            .with_workers(workers)
                            .without_idle_sweep();
                        let trades = raw.clone();
                        async move {
                            let handle = Engine::start(engine_config, UpsertSink::new()).unwrap();
                            for trade in trades {
                                handle.submit_raw(trade).await.unwrap();
                            }
                            handle.shutdown().await.unwrap().stats
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, reduce_benchmark, lifecycle_benchmark, engine_benchmark);
criterion_main!(benches);
