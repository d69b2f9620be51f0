use super::*;

// keeps `high` itself from rounding up into the high outlier bucket
const EPSILON: f64 = 1e-16;

/// Maps sample values onto logarithmically sized buckets and back.
///
/// Index 0 counts values below `low` and the last index counts values above
/// `high`; everything in between is spread over `buckets` regular buckets
/// whose width grows with the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapping {
    low: f64,
    high: f64,
    shift: f64,
    scale: f64,
    len: usize,
}

impl Mapping {
    pub(crate) fn new(config: &Config) -> Mapping {
        // shifting puts `low` at ln(1) = 0 so every tracked value has a
        // non-negative logarithm
        let shift = config.low - 1.;
        let buckets = config.buckets as f64;
        let scale = buckets * (1. - EPSILON) / (config.high - shift).ln();

        Mapping {
            low: config.low,
            high: config.high,
            shift,
            scale,
            len: config.buckets + 2,
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Number of counters, including the two outlier buckets.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Index of the high outlier bucket.
    pub fn last(&self) -> usize {
        self.len - 1
    }

    /// Bucket index that counts `value`.
    ///
    /// NaN is not inside `[low, high]` and lands with the high outliers.
    #[inline]
    pub fn value_to_bucket(&self, value: f64) -> usize {
        if value < self.low {
            return 0;
        }
        if !(value <= self.high) {
            return self.last();
        }

        let v = value - self.shift;
        // `as` saturates, so rounding just below ln(1) still gives bucket 1
        let index = 1 + (v.ln() * self.scale) as usize;
        index.min(self.len - 2)
    }

    /// The value at the top edge of bucket `index`, which is also the bottom
    /// edge of `index + 1`. For index 0 this is `low`.
    #[inline]
    pub fn bucket_to_value(&self, index: usize) -> f64 {
        (index as f64 / self.scale).exp() + self.shift
    }
}

#[cfg(test)]
fn mapping(low: f64, high: f64, buckets: usize) -> Mapping {
    Mapping::new(&Config::new(low, high, buckets))
}

#[test]
fn bounds_land_in_regular_buckets() {
    let m = mapping(0., 100., 1000);
    assert_eq!(m.len(), 1002);
    assert_eq!(m.value_to_bucket(0.), 1);
    assert_eq!(m.value_to_bucket(100.), 1000);
}

#[test]
fn outliers() {
    let m = mapping(-10., 10., 10);
    assert_eq!(m.value_to_bucket(-10.0001), 0);
    assert_eq!(m.value_to_bucket(-99.), 0);
    assert_eq!(m.value_to_bucket(10.0001), 11);
    assert_eq!(m.value_to_bucket(f64::INFINITY), 11);
    assert_eq!(m.value_to_bucket(f64::NEG_INFINITY), 0);
    assert_eq!(m.value_to_bucket(f64::NAN), 11);
}

#[test]
fn mapping_is_monotonic() {
    let m = mapping(0., 10_000., 1000);
    let mut last = 0;
    for i in 0..=20_000 {
        let b = m.value_to_bucket(i as f64 * 0.5);
        assert!(b >= last, "bucket for {} went backwards", i as f64 * 0.5);
        last = b;
    }
}

#[test]
fn bucket_edges_bracket_their_values() {
    let m = mapping(0., 10_000., 1000);
    for value in &[0.5, 3., 42., 999., 7777.] {
        let b = m.value_to_bucket(*value);
        assert!(m.bucket_to_value(b - 1) <= *value);
        assert!(m.bucket_to_value(b) >= *value);
    }
    assert_eq!(m.bucket_to_value(0), 0.);
}

#[test]
fn degenerate_range() {
    let m = mapping(5., 5., 4);
    assert_eq!(m.value_to_bucket(5.), 1);
    assert_eq!(m.value_to_bucket(4.9), 0);
    assert_eq!(m.value_to_bucket(5.1), 5);
    assert_eq!(m.bucket_to_value(3), 5.);
}
