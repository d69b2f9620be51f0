use criterion::{black_box, criterion_group, criterion_main, Criterion};

use loghistogram::{Histogram, Locked, WindowedHistogram};

fn accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");

    let h: Histogram = Histogram::new(0., 10_000_000., 1000).unwrap();
    let mut i = 0u32;
    group.bench_function("lock_free", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            h.accumulate(black_box(i))
        })
    });

    let h: Histogram<Locked> = Histogram::new(0., 10_000_000., 1000).unwrap();
    group.bench_function("locked", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            h.accumulate(black_box(i))
        })
    });

    let mut h: Histogram = Histogram::new(0., 10_000_000., 1000).unwrap();
    group.bench_function("unsynchronized", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            h.accumulate_mut(black_box(i))
        })
    });

    let h: WindowedHistogram = WindowedHistogram::new(0., 10_000_000., 1000).unwrap();
    group.bench_function("windowed", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            h.accumulate(black_box(i))
        })
    });

    group.finish();
}

fn percentiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentiles");

    let h: WindowedHistogram = WindowedHistogram::new(0., 10_000., 1000).unwrap();
    for i in (0..10_000).step_by(10) {
        h.accumulate(i);
    }

    for p in &[10., 25., 50., 75., 99.] {
        group.bench_function(format!("p{}", p), |b| b.iter(|| h.percentile(black_box(*p))));
    }
    group.bench_function("p25_p50_p75", |b| {
        b.iter(|| h.percentiles(black_box(&[25., 50., 75.])))
    });
    group.bench_function("p10_p25_p33_p50", |b| {
        b.iter(|| h.percentiles(black_box(&[10., 25., 33., 50.])))
    });

    group.finish();
}

criterion_group!(benches, accumulate, percentiles);
criterion_main!(benches);
