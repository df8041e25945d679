//! Criterion benchmarks for the detection hot paths.
//!
//! Benchmarks:
//! 1. Pivot extraction across the default window set
//! 2. Sinc smoothing of a histogram curve
//! 3. Full detection pass (levels only, no repository)
//! 4. Per-bar interaction classification against active zones

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use srzone_core::config::{DetectorConfig, LifecycleConfig};
use srzone_core::domain::{Bar, NewZone, ParamsHash, Qualifier, Timeframe, Zone, ZoneId};
use srzone_core::engine::{InteractionDetector, ZoneDetector};
use srzone_core::pivots::PivotExtractor;
use srzone_core::signal::SignalSmoother;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let t0 = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + (x * 0.1).sin() * 10.0 + (x * 0.013).sin() * 25.0;
            Bar::new(
                t0 + Duration::days(i as i64),
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000.0 + (i % 5000) as f64,
            )
        })
        .collect()
}

fn make_zones(n: usize) -> Vec<Zone> {
    let t0 = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            NewZone {
                level: 70.0 + i as f64 * 6.0,
                tolerance: 1.0,
                qualifier: Qualifier::Linear,
                timeframe: Timeframe::D1,
                strength: 10.0,
                first_detected: t0,
                last_confirmed: t0,
                params_hash: ParamsHash::from_bytes(b"bench"),
                parameters_json: "{}".into(),
            }
            .into_zone(ZoneId(i as u64))
        })
        .collect()
}

// ── 1. Pivots ────────────────────────────────────────────────────────

fn bench_pivots(c: &mut Criterion) {
    let mut group = c.benchmark_group("pivot_extraction");
    let extractor = PivotExtractor::from_config(&DetectorConfig::default());
    for bar_count in [1000, 4000] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("default_windows", bar_count), &bars, |b, bars| {
            b.iter(|| extractor.extract(black_box(bars)).count());
        });
    }
    group.finish();
}

// ── 2. Smoothing ─────────────────────────────────────────────────────

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sinc_smoothing");
    let curve: Vec<f64> = (0..100).map(|i| ((i * 37) % 11) as f64).collect();
    for length in [3, 10] {
        let smoother = SignalSmoother::new(length);
        group.bench_with_input(BenchmarkId::new("100_bins", length), &curve, |b, curve| {
            b.iter(|| smoother.smooth(black_box(curve)));
        });
    }
    group.finish();
}

// ── 3. Detection ─────────────────────────────────────────────────────

fn bench_detect_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_levels");
    let bars = make_bars(4000);
    for qualifier in Qualifier::ALL {
        let detector = ZoneDetector::new(DetectorConfig::default().with_qualifier(qualifier))
            .expect("default config is valid");
        group.bench_function(qualifier.as_str(), |b| {
            b.iter(|| detector.detect_levels(black_box(&bars)));
        });
    }
    group.finish();
}

// ── 4. Interactions ──────────────────────────────────────────────────

fn bench_interactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("interaction_detector");
    let bars = make_bars(1000);
    let zones = make_zones(20);
    group.bench_function("1000_bars_20_zones", |b| {
        b.iter(|| {
            let mut detector = InteractionDetector::new(LifecycleConfig::default());
            for bar in &bars {
                black_box(detector.observe(bar, &zones).ok());
            }
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_pivots,
    bench_smoothing,
    bench_detect_levels,
    bench_interactions
);
criterion_main!(benches);
