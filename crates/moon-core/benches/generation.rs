use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use moon_core::{
    Calendar, DateRange, DayStore, EngineConfig, Location, MeanEphemeris, Scope, shift,
};

fn expected() -> DateRange {
    let start = NaiveDate::from_ymd_opt(2016, 9, 3).unwrap_or_default();
    DateRange::new(start, shift(start, 30))
}

fn generation_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.sample_size(20);
    for scope in [Scope::Phase, Scope::Cycle] {
        group.bench_function(format!("{scope}_31_days"), |b| {
            b.iter(|| {
                let mut cal = Calendar::new(
                    black_box(expected()),
                    scope,
                    Arc::new(MeanEphemeris),
                    Location::default(),
                    EngineConfig::default().with_workers(4),
                );
                cal.start_generation().unwrap()
            })
        });
    }
    group.finish();
}

fn derivation_bench(c: &mut Criterion) {
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
        NaiveDate::from_ymd_opt(2009, 12, 31).unwrap_or_default(),
    );
    let mut cal = Calendar::new(
        range,
        Scope::Day,
        Arc::new(MeanEphemeris),
        Location::default(),
        EngineConfig::default(),
    );
    cal.start_generation().unwrap();
    let days: Vec<_> = cal.all_days().unwrap().into_iter().cloned().collect();

    let mut group = c.benchmark_group("derivation");
    group.bench_function("phases_and_counts_10y", |b| {
        b.iter(|| {
            let mut store: DayStore = days.iter().cloned().collect();
            store.update_lunar_phases();
            store.count_days_to_extremes();
            black_box(store.len())
        })
    });
    group.bench_function("missing_dates_10y", |b| {
        let store: DayStore = days.iter().cloned().collect();
        b.iter(|| store.missing_dates(black_box(&range)).len())
    });
    group.finish();
}

criterion_group!(benches, generation_bench, derivation_bench);
criterion_main!(benches);
