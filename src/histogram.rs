use std::fmt::{self, Debug};

use tracing::{debug, info, warn};

use super::*;
use crate::percentile::{self, Hint};

const PS: [f64; 10] = [0., 50., 75., 90., 95., 97.5, 99., 99.9, 99.99, 100.];

/// A fixed-memory histogram with logarithmic buckets over `[low, high]`.
///
/// Samples outside the range are counted as low or high outliers. The
/// storage strategy `S` decides how concurrent writers are synchronized; see
/// [`LockFree`] and [`Locked`].
pub struct Histogram<S: Store = LockFree> {
    pub(crate) mapping: Mapping,
    pub(crate) store: S,
    pub(crate) hint: Hint,
}

impl<S: Store> Debug for Histogram<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str("Histogram[")?;

        let values = self.percentiles(&PS);
        for (p, v) in PS.iter().zip(values) {
            let line = format!("({} -> {:?}) ", p, v);
            f.write_str(&*line)?;
        }

        f.write_str("]")
    }
}

impl<S: Store> Clone for Histogram<S> {
    fn clone(&self) -> Histogram<S> {
        self.dup()
    }
}

impl<S: Store> Histogram<S> {
    /// Create a histogram of `buckets` logarithmic buckets spanning
    /// `[low, high]`.
    pub fn new(low: f64, high: f64, buckets: usize) -> Result<Histogram<S>, Error> {
        Histogram::with_config(&Config::new(low, high, buckets))
    }

    pub fn with_config(config: &Config) -> Result<Histogram<S>, Error> {
        Histogram::with_buffers(config, 1)
    }

    pub(crate) fn with_buffers(config: &Config, buffers: usize) -> Result<Histogram<S>, Error> {
        if let Err(error) = config.validate() {
            warn!(
                %error,
                low = config.low,
                high = config.high,
                buckets = config.buckets,
                "rejected histogram configuration"
            );
            return Err(error);
        }

        let mapping = Mapping::new(config);
        debug!(
            low = config.low,
            high = config.high,
            buckets = config.buckets,
            buffers,
            "created histogram"
        );

        Ok(Histogram {
            store: S::with_buffers(mapping.len(), buffers),
            mapping,
            hint: Hint::default(),
        })
    }

    fn from_counts(mapping: Mapping, counts: Vec<u64>) -> Histogram<S> {
        Histogram {
            mapping,
            store: S::from_counts(counts),
            hint: Hint::default(),
        }
    }

    pub fn low(&self) -> f64 {
        self.mapping.low()
    }

    pub fn high(&self) -> f64 {
        self.mapping.high()
    }

    /// Number of regular buckets, not counting the outlier buckets.
    pub fn buckets(&self) -> usize {
        self.mapping.len() - 2
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Record a value.
    #[inline]
    pub fn accumulate<T: Into<f64>>(&self, value: T) {
        if cfg!(feature = "bypass") {
            return;
        }
        self.store.record(self.mapping.value_to_bucket(value.into()));
    }

    /// Record a value through exclusive access, skipping synchronization.
    #[inline]
    pub fn accumulate_mut<T: Into<f64>>(&mut self, value: T) {
        if cfg!(feature = "bypass") {
            return;
        }
        let index = self.mapping.value_to_bucket(value.into());
        self.store.record_mut(index);
    }

    /// Total number of samples, outliers included.
    pub fn count(&self) -> u64 {
        self.store.view().total()
    }

    /// Samples below `low` and above `high`, read together.
    pub fn outliers(&self) -> (u64, u64) {
        let view = self.store.view();
        (view.get(0), view.get(self.mapping.last()))
    }

    pub fn low_outliers(&self) -> u64 {
        self.store.view().get(0)
    }

    pub fn high_outliers(&self) -> u64 {
        self.store.view().get(self.mapping.last())
    }

    /// Estimate several percentiles in one pass.
    ///
    /// `pers` must be sorted ascending; it is not re-sorted, and unsorted
    /// input gives meaningless answers. Percentages outside `[0, 100]` are
    /// allowed and resolve toward the outlier buckets. Every answer is NaN
    /// when the histogram is empty.
    pub fn percentiles(&self, pers: &[f64]) -> Vec<f64> {
        let view = self.store.view();
        percentile::percentiles(&view, &self.mapping, &self.hint, pers)
    }

    /// Estimate one percentile, NaN when the histogram is empty.
    pub fn percentile(&self, p: f64) -> f64 {
        self.percentiles(&[p])[0]
    }

    /// An independent point-in-time copy.
    ///
    /// Each bucket is read once and the total is recomputed from those
    /// reads, so the copy is self-consistent even while writers are active.
    pub fn dup(&self) -> Histogram<S> {
        let counts = self.store.view().to_vec();
        Histogram::from_counts(self.mapping, counts)
    }

    /// Subtract `other` bucket by bucket, typically an earlier `dup` of this
    /// histogram, leaving what was accumulated in between.
    ///
    /// Buckets saturate at zero. Only the bucket layout has to match; the
    /// bounds are not compared.
    pub fn sub<T: Store>(&mut self, other: &Histogram<T>) -> Result<(), Error> {
        let (left, right) = (self.mapping.len(), other.mapping.len());
        if left != right {
            let error = Error::ShapeMismatch { left, right };
            warn!(%error, "refusing to subtract histograms");
            return Err(error);
        }

        let counts = other.store.view().to_vec();
        self.store.subtract(&counts);
        Ok(())
    }

    /// Emit the common percentiles as a tracing event.
    pub fn log_percentiles(&self) {
        info!("{:?}", self);
    }
}

#[cfg(test)]
fn accumulate_range<S: Store>() {
    let h = Histogram::<S>::new(0., 100., 1000).unwrap();
    for i in 0..=100 {
        h.accumulate(i);
    }

    assert_eq!(h.count(), 101);
    assert_eq!(h.outliers(), (0, 0));

    let pers = [0., 50., 90., 99., 100.];
    let values = h.percentiles(&pers);
    for (v, e) in values.iter().zip(&pers) {
        assert!((v - e).abs() <= 1., "percentile {} was {}", e, v);
    }
}

#[test]
fn accumulate_range_lock_free() {
    accumulate_range::<LockFree>();
}

#[test]
fn accumulate_range_locked() {
    accumulate_range::<Locked>();
}

#[cfg(test)]
fn outliers<S: Store>() {
    let h = Histogram::<S>::new(-10., 10., 10).unwrap();
    h.accumulate(-10.0001);
    h.accumulate(-99);
    h.accumulate(10.0001);

    assert_eq!(h.count(), 3);
    assert_eq!(h.outliers(), (2, 1));
    assert_eq!(h.low_outliers(), 2);
    assert_eq!(h.high_outliers(), 1);
}

#[test]
fn outliers_lock_free() {
    outliers::<LockFree>();
}

#[test]
fn outliers_locked() {
    outliers::<Locked>();
}

#[test]
fn empty_histogram() {
    let h: Histogram = Histogram::new(0., 1., 10).unwrap();
    assert!(h.percentile(50.).is_nan());
    assert!(h.percentiles(&[0., 100.]).iter().all(|p| p.is_nan()));
    assert!(h.percentiles(&[]).is_empty());
}

#[test]
fn invalid_construction() {
    assert_eq!(
        Histogram::<LockFree>::new(10., 0., 10).unwrap_err(),
        Error::InvalidBounds { low: 10., high: 0. }
    );
    assert_eq!(
        Histogram::<Locked>::new(0., 10., 0).unwrap_err(),
        Error::NoBuckets
    );
}

#[test]
fn degenerate_range() {
    let h: Histogram = Histogram::new(5., 5., 4).unwrap();
    h.accumulate(5);
    h.accumulate(6);
    assert_eq!(h.count(), 2);
    assert_eq!(h.outliers(), (0, 1));
    assert_eq!(h.percentile(50.), 5.);
}

#[test]
fn wide_range_answers_are_finite() {
    let h: Histogram = Histogram::new(-1e300, 1e300, 100).unwrap();
    for v in &[-5., 0., 5., 1e299] {
        h.accumulate(*v);
    }
    assert_eq!(h.outliers(), (0, 0));
    for p in h.percentiles(&[0., 50., 100.]) {
        assert!(p.is_finite(), "percentile was {}", p);
    }

    let err = Histogram::<LockFree>::new(-1e308, 1e308, 100).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidBounds {
            low: -1e308,
            high: 1e308
        }
    );
}

#[cfg(test)]
fn subtract<S: Store>() {
    let mut h = Histogram::<S>::new(0., 10., 100).unwrap();
    h.accumulate(4);
    let before = h.dup();
    h.accumulate(5);
    assert_eq!(h.count(), 2);
    assert_eq!(before.count(), 1);

    h.sub(&before).unwrap();
    assert_eq!(h.count(), 1);
    let max = h.percentile(100.);
    assert!(max >= 5. && max < 5.2, "max was {}", max);

    // a lone sample is not enough to move a truncated median off `low`
    assert_eq!(h.percentile(50.), 0.);
}

#[test]
fn subtract_lock_free() {
    subtract::<LockFree>();
}

#[test]
fn subtract_locked() {
    subtract::<Locked>();
}

#[test]
fn subtract_leaves_later_samples() {
    let mut h: Histogram = Histogram::new(0., 1000., 200).unwrap();
    for v in &[10, 20, 30, 40] {
        h.accumulate(*v);
    }
    let earlier = h.dup();
    for v in &[500, 600, 700] {
        h.accumulate(*v);
    }
    let median = h.percentile(50.);

    h.sub(&earlier).unwrap();
    assert_eq!(h.count(), 3);
    assert_eq!(h.outliers(), (0, 0));
    assert!(h.percentile(50.) >= median);
}

#[test]
fn subtract_across_strategies() {
    let mut h: Histogram<LockFree> = Histogram::new(0., 10., 10).unwrap();
    let other: Histogram<Locked> = Histogram::new(0., 20., 10).unwrap();
    h.accumulate(3);
    other.accumulate(3);
    other.accumulate(3);

    // bounds are not compared, so 3 is subtracted from whichever
    // bucket it occupies under the other histogram's range
    let ours = h.mapping().value_to_bucket(3.);
    let theirs = other.mapping().value_to_bucket(3.);
    assert_ne!(ours, theirs);

    h.sub(&other).unwrap();
    assert_eq!(h.count(), 1);
    assert_eq!(h.percentile(100.), h.mapping().bucket_to_value(ours));
}

#[test]
fn subtract_shape_mismatch() {
    let mut h: Histogram = Histogram::new(0., 10., 10).unwrap();
    let other: Histogram = Histogram::new(0., 10., 11).unwrap();
    h.accumulate(1);
    assert_eq!(
        h.sub(&other),
        Err(Error::ShapeMismatch {
            left: 12,
            right: 13
        })
    );
    assert_eq!(h.count(), 1);
}

#[test]
fn dup_is_independent() {
    let h: Histogram<Locked> = Histogram::new(0., 10., 10).unwrap();
    h.accumulate(1);
    let copy = h.clone();
    h.accumulate(2);
    assert_eq!(copy.count(), 1);
    assert_eq!(h.count(), 2);
    assert_eq!(copy.mapping(), h.mapping());
}

#[test]
fn accumulate_mut_matches_accumulate() {
    let mut a: Histogram = Histogram::new(0., 100., 50).unwrap();
    let b: Histogram = Histogram::new(0., 100., 50).unwrap();
    for i in 0..200 {
        a.accumulate_mut(i as f64 * 0.7);
        b.accumulate(i as f64 * 0.7);
    }
    assert_eq!(a.count(), 200);
    assert_eq!(a.outliers(), b.outliers());
    assert_eq!(
        a.percentiles(&[10., 50., 90.]),
        b.percentiles(&[10., 50., 90.])
    );
}

#[test]
fn debug_lists_percentiles() {
    let h: Histogram = Histogram::new(0., 10., 10).unwrap();
    h.accumulate(2);
    let rendered = format!("{:?}", h);
    assert!(rendered.starts_with("Histogram[(0 -> "));
    assert!(rendered.contains("(99.99 -> "));
    h.log_percentiles();
}
