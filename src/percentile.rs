use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

/// Best-effort guess of what percentage of all samples sit at or below the
/// middle bucket, refreshed whenever a scan walks past it. Negative means
/// nothing is known yet. Only used to pick a scan direction, so lost updates
/// between racing readers are harmless.
pub(crate) struct Hint(AtomicU64);

impl Default for Hint {
    fn default() -> Hint {
        Hint(AtomicU64::new((-1f64).to_bits()))
    }
}

impl Hint {
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, percentile: f64) {
        self.0.store(percentile.to_bits(), Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn force(&self, percentile: f64) {
        self.set(percentile)
    }
}

// number of samples a percentile needs at or below its answer, truncated
#[inline]
fn target(percentile: f64, n: u64) -> u64 {
    (percentile * n as f64 / 100.) as u64
}

// top edge of the last of the first `i` buckets
#[inline]
fn edge(mapping: &Mapping, i: usize) -> f64 {
    mapping.bucket_to_value(i.saturating_sub(1))
}

/// Estimate `pers` (ascending percentages) from `counts`.
///
/// Each answer is the upper edge of the first run of buckets, counted from
/// the low outliers, that holds at least `floor(p * n / 100)` samples. The
/// scan starts from whichever end the hint says is closer to the lowest
/// request; both ends give the same answers.
pub(crate) fn percentiles<C: Counts>(
    counts: &C,
    mapping: &Mapping,
    hint: &Hint,
    pers: &[f64],
) -> Vec<f64> {
    if pers.is_empty() {
        return vec![];
    }

    let n = counts.total();
    if n == 0 {
        return vec![std::f64::NAN; pers.len()];
    }

    let middle = counts.len() / 2;
    let known = hint.get();

    if known >= 0. && pers[0] > known {
        descending(counts, mapping, hint, pers, n, middle)
    } else {
        ascending(counts, mapping, hint, pers, n, middle)
    }
}

fn ascending<C: Counts>(
    counts: &C,
    mapping: &Mapping,
    hint: &Hint,
    pers: &[f64],
    n: u64,
    middle: usize,
) -> Vec<f64> {
    let len = counts.len();
    let mut values = Vec::with_capacity(pers.len());

    // `a` is the number of samples in the first `i` buckets
    let mut a = 0;
    let mut i = 0;

    for p in pers {
        let goal = target(*p, n);
        while a < goal && i < len {
            a += counts.get(i);
            if i == middle {
                hint.set(100. * a as f64 / n as f64);
            }
            i += 1;
        }
        values.push(edge(mapping, i));
    }

    values
}

fn descending<C: Counts>(
    counts: &C,
    mapping: &Mapping,
    hint: &Hint,
    pers: &[f64],
    n: u64,
    middle: usize,
) -> Vec<f64> {
    let mut values = vec![0.; pers.len()];

    // `a` is the number of samples in the first `i` buckets. The total may
    // lag the buckets under lock-free writers, so step down with saturation.
    let mut a = n;
    let mut i = counts.len();

    for (j, p) in pers.iter().enumerate().rev() {
        let goal = target(*p, n);
        while i > 0 {
            let count = counts.get(i - 1);
            let below = a.saturating_sub(count);
            if below < goal {
                break;
            }
            if i - 1 == middle {
                hint.set(100. * a as f64 / n as f64);
            }
            a = below;
            i -= 1;
        }
        values[j] = edge(mapping, i);
    }

    values
}

#[cfg(test)]
fn loaded(values: &[f64]) -> (Mapping, LockFree) {
    let mapping = Mapping::new(&Config::new(0., 100., 1000));
    let store = LockFree::with_buffers(mapping.len(), 1);
    for v in values {
        store.record(mapping.value_to_bucket(*v));
    }
    (mapping, store)
}

#[test]
fn empty_request() {
    let (mapping, store) = loaded(&[1., 2.]);
    let hint = Hint::default();
    assert!(percentiles(&store.view(), &mapping, &hint, &[]).is_empty());
    assert!(hint.get() < 0.);
}

#[test]
fn empty_histogram_is_nan() {
    let (mapping, store) = loaded(&[]);
    let hint = Hint::default();
    let values = percentiles(&store.view(), &mapping, &hint, &[0., 50., 100.]);
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| v.is_nan()));
}

#[test]
fn both_directions_agree() {
    let samples: Vec<f64> = (0..500).map(|i| (i % 97) as f64 * 1.03).collect();
    let (mapping, store) = loaded(&samples);
    let pers = [1., 10., 25., 50., 50., 75., 90., 99., 99.9, 100., 120.];

    let up = Hint::default();
    let forward = percentiles(&store.view(), &mapping, &up, &pers);

    // a known hint below the lowest request flips the scan around
    let down = Hint::default();
    down.force(0.5);
    let backward = percentiles(&store.view(), &mapping, &down, &pers);
    assert_eq!(forward, backward);
}

#[test]
fn hint_tracks_the_middle_bucket() {
    let samples: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let (mapping, store) = loaded(&samples);
    let middle = mapping.len() / 2;
    let below = (0..=middle).map(|i| store.view().get(i)).sum::<u64>();
    let expected = 100. * below as f64 / 100.;

    let hint = Hint::default();
    percentiles(&store.view(), &mapping, &hint, &[100.]);
    assert_eq!(hint.get(), expected);

    // a descending scan past the middle computes the same figure
    hint.force(1.);
    percentiles(&store.view(), &mapping, &hint, &[2.]);
    assert_eq!(hint.get(), expected);
}

#[test]
fn beyond_the_range_extrapolates() {
    let (mapping, store) = loaded(&[10., 20., 30.]);
    let hint = Hint::default();
    let values = percentiles(&store.view(), &mapping, &hint, &[-50., 0., 100., 150.]);
    assert_eq!(values[0], 0.);
    assert_eq!(values[1], 0.);
    assert!(values[2] >= 30. && values[2] < 31.);
    assert!(values[3] > 100.);
}
