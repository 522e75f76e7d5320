//! Benchmarks for visit fund and streak recomputation
//!
//! Both run over the full history on every recompute, so they are measured
//! against histories of one to five years.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;
use totem_core::{streak, visit_fund, DayKey, DayLog};

fn history(days: u32, today: DayKey) -> BTreeMap<DayKey, DayLog> {
    (1..=days)
        .filter_map(|i| today.days_before(i).map(|day| (i, day)))
        .map(|(i, day)| {
            // Every seventh day misses a habit so the streak is short and the fund non-zero.
            let log = if i % 7 == 0 {
                [true, true, false, true, true]
            } else {
                [true; 5]
            };
            (day, log)
        })
        .collect()
}

fn bench_visit_fund(c: &mut Criterion) {
    let mut group = c.benchmark_group("visit_fund");
    let today = DayKey::from_ymd(2025, 1, 1).expect("valid date");

    for &days in &[365u32, 730, 1825] {
        let history = history(days, today);
        group.throughput(Throughput::Elements(u64::from(days)));
        group.bench_with_input(BenchmarkId::from_parameter(days), &history, |b, h| {
            b.iter(|| visit_fund(black_box(h), black_box(today)))
        });
    }
    group.finish();
}

fn bench_streak(c: &mut Criterion) {
    let mut group = c.benchmark_group("streak");
    let today = DayKey::from_ymd(2025, 1, 1).expect("valid date");

    for &days in &[30u32, 365] {
        let mut history = history(days, today);
        // Unbroken run, so the walk goes the full lookback.
        history.values_mut().for_each(|log| *log = [true; 5]);
        group.bench_with_input(BenchmarkId::from_parameter(days), &history, |b, h| {
            b.iter(|| streak(black_box(h), black_box(today)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_visit_fund, bench_streak);
criterion_main!(benches);
