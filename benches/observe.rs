//! Benchmarks for Delta rule observation and evaluation passes

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use delta_rule::{
    AveragingKind, DeltaRule, DeviationPolicy, Direction, EvaluationMode, Reading, RuleConfig,
    ValueTracker,
};
use serde_json::{json, Value};

fn generate_readings(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| 20.0 + (i as f64 % 10.0) * 0.1)
        .collect()
}

fn bench_numeric(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric");

    let readings = generate_readings(1000);
    let policy = DeviationPolicy {
        threshold: 10.0,
        direction: Direction::Both,
        averaging: AveragingKind::Exponential,
        factor: 10,
    };

    group.throughput(Throughput::Elements(1000));

    group.bench_function("observe_1000_readings", |b| {
        b.iter(|| {
            let mut tracker = ValueTracker::new(EvaluationMode::NumericDeviation);
            for &v in &readings {
                let decision = tracker.observe("temp", Reading::Numeric(v), &policy);
                black_box(decision.ok());
            }
        })
    });

    group.finish();
}

fn bench_structured(c: &mut Criterion) {
    let mut group = c.benchmark_group("structured");

    let readings: Vec<Value> = generate_readings(1000)
        .into_iter()
        .map(|v| json!({"temp": v, "unit": "C", "flags": [1, 2, 3]}))
        .collect();
    let policy = DeviationPolicy {
        threshold: 0.0,
        direction: Direction::Both,
        averaging: AveragingKind::Simple,
        factor: 1,
    };

    group.throughput(Throughput::Elements(1000));

    group.bench_function("observe_1000_snapshots", |b| {
        b.iter(|| {
            let mut tracker = ValueTracker::new(EvaluationMode::StructuralEquality);
            for v in &readings {
                let decision = tracker.observe("probe", Reading::Structured(v), &policy);
                black_box(decision.ok());
            }
        })
    });

    group.finish();
}

fn bench_eval_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");

    let batches: Vec<String> = (0..100)
        .map(|i| {
            let mut datapoints = serde_json::Map::new();
            for d in 0..10 {
                datapoints.insert(format!("dp{}", d), json!((i + d) % 4));
            }
            json!({ "boiler": datapoints, "timestamp_boiler": 1_700_000_000.0 + i as f64 })
                .to_string()
        })
        .collect();

    group.throughput(Throughput::Elements(100));

    group.bench_function("eval_100_batches", |b| {
        b.iter(|| {
            let rule = DeltaRule::new(RuleConfig::new("boiler", EvaluationMode::StructuralEquality));
            for batch in &batches {
                black_box(rule.eval(batch));
            }
            black_box(rule.reason());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_numeric, bench_structured, bench_eval_pass);
criterion_main!(benches);
