use std::fmt::{self, Debug};

use tracing::trace;

use super::*;

/// A histogram over a sliding window of time.
///
/// Samples go into a current buffer; `window` retires it to a previous
/// buffer and starts a fresh one, discarding whatever was previous before.
/// Every read sums both buffers, so calling `window` every half period keeps
/// roughly one full period of data with a bias toward recent samples. That
/// works as long as a statistically useful number of samples arrive in half
/// a period.
///
/// Rotation reuses the two buffers, so `window` never allocates.
pub struct WindowedHistogram<S: Store = LockFree> {
    inner: Histogram<S>,
}

impl<S: Store> Debug for WindowedHistogram<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str("Windowed")?;
        Debug::fmt(&self.inner, f)
    }
}

impl<S: Store> WindowedHistogram<S> {
    pub fn new(low: f64, high: f64, buckets: usize) -> Result<WindowedHistogram<S>, Error> {
        WindowedHistogram::with_config(&Config::new(low, high, buckets))
    }

    pub fn with_config(config: &Config) -> Result<WindowedHistogram<S>, Error> {
        let inner = Histogram::with_buffers(config, 2)?;
        Ok(WindowedHistogram { inner })
    }

    /// Rotate: the current window becomes the previous one and a zeroed
    /// buffer takes its place.
    ///
    /// Safe to call while other threads accumulate. A sample racing a single
    /// rotation is counted in exactly one of the two windows. With
    /// [`LockFree`], a writer stalled between picking its buffer and
    /// incrementing it across two back-to-back rotations may have its sample
    /// cleared along with that buffer; [`Locked`] never loses one.
    pub fn window(&self) {
        self.inner.store.rotate();
        trace!(count = self.inner.count(), "rotated histogram window");
    }

    pub fn low(&self) -> f64 {
        self.inner.low()
    }

    pub fn high(&self) -> f64 {
        self.inner.high()
    }

    pub fn buckets(&self) -> usize {
        self.inner.buckets()
    }

    pub fn mapping(&self) -> &Mapping {
        self.inner.mapping()
    }

    /// Record a value in the current window.
    #[inline]
    pub fn accumulate<T: Into<f64>>(&self, value: T) {
        self.inner.accumulate(value)
    }

    #[inline]
    pub fn accumulate_mut<T: Into<f64>>(&mut self, value: T) {
        self.inner.accumulate_mut(value)
    }

    /// Samples in the current and previous windows, outliers included.
    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    pub fn outliers(&self) -> (u64, u64) {
        self.inner.outliers()
    }

    pub fn low_outliers(&self) -> u64 {
        self.inner.low_outliers()
    }

    pub fn high_outliers(&self) -> u64 {
        self.inner.high_outliers()
    }

    /// See [`Histogram::percentiles`]; computed over both windows.
    pub fn percentiles(&self, pers: &[f64]) -> Vec<f64> {
        self.inner.percentiles(pers)
    }

    pub fn percentile(&self, p: f64) -> f64 {
        self.inner.percentile(p)
    }

    /// A plain histogram holding the combined counts of both windows.
    pub fn dup(&self) -> Histogram<S> {
        self.inner.dup()
    }

    /// Emit the common percentiles over both windows as a tracing event.
    pub fn log_percentiles(&self) {
        self.inner.log_percentiles()
    }
}

#[cfg(test)]
fn accumulate_range<S: Store>() {
    let h = WindowedHistogram::<S>::new(0., 100., 1000).unwrap();
    for i in 0..=100 {
        h.accumulate(i);
    }

    assert_eq!(h.outliers(), (0, 0));
    assert_eq!(h.count(), 101);

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

#[test]
fn outliers() {
    let h: WindowedHistogram = WindowedHistogram::new(-10., 10., 10).unwrap();
    h.accumulate(-10.0001);
    h.accumulate(-99);
    h.accumulate(10.0001);
    assert_eq!(h.count(), 3);
    assert_eq!(h.outliers(), (2, 1));
}

#[test]
fn empty_histogram() {
    let h: WindowedHistogram<Locked> = WindowedHistogram::new(0., 1., 10).unwrap();
    assert!(h.percentile(50.).is_nan());
    assert!(h.percentiles(&[0., 100.]).iter().all(|p| p.is_nan()));
}

#[cfg(test)]
fn rotation<S: Store>() {
    let h = WindowedHistogram::<S>::new(0., 100., 100).unwrap();
    for _ in 0..4 {
        h.accumulate(10);
    }
    h.accumulate(200);

    // the first window moves to previous and still counts
    h.window();
    assert_eq!(h.count(), 5);
    assert_eq!(h.outliers(), (0, 1));

    for _ in 0..2 {
        h.accumulate(90);
    }
    assert_eq!(h.count(), 7);

    // now the first window is gone
    h.window();
    assert_eq!(h.count(), 2);
    assert_eq!(h.outliers(), (0, 0));
    let median = h.percentile(50.);
    assert!(median >= 90. && median < 95., "median was {}", median);

    // two quiet windows empty it completely
    h.window();
    assert_eq!(h.count(), 0);
    h.window();
    assert_eq!(h.count(), 0);
    assert!(h.percentile(50.).is_nan());
}

#[test]
fn rotation_lock_free() {
    rotation::<LockFree>();
}

#[test]
fn rotation_locked() {
    rotation::<Locked>();
}

#[test]
fn dup_combines_windows() {
    let h: WindowedHistogram = WindowedHistogram::new(0., 100., 100).unwrap();
    h.accumulate(1);
    h.window();
    h.accumulate(2);

    let mut snapshot = h.dup();
    assert_eq!(snapshot.count(), 2);

    h.accumulate(3);
    let mut later = h.dup();
    later.sub(&snapshot).unwrap();
    assert_eq!(later.count(), 1);

    snapshot.accumulate_mut(4);
    assert_eq!(snapshot.count(), 3);
    assert_eq!(h.count(), 3);
}

#[test]
fn accumulate_mut_lands_in_current_window() {
    let mut h: WindowedHistogram = WindowedHistogram::new(0., 100., 100).unwrap();
    h.accumulate_mut(5);
    h.window();
    h.accumulate_mut(6);
    h.window();
    assert_eq!(h.count(), 1);
}

#[test]
fn invalid_construction() {
    assert_eq!(
        WindowedHistogram::<Locked>::new(1., 0., 10).unwrap_err(),
        Error::InvalidBounds { low: 1., high: 0. }
    );
}
