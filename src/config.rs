use super::*;

/// Shape of a histogram: the tracked range and how finely it is divided.
///
/// The default tracks microsecond latencies up to ten seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Smallest value counted in a regular bucket.
    pub low: f64,
    /// Largest value counted in a regular bucket.
    pub high: f64,
    /// Number of logarithmic buckets between `low` and `high`.
    pub buckets: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            low: 0.,
            high: 10_000_000.,
            buckets: 1000,
        }
    }
}

impl Config {
    pub fn new(low: f64, high: f64, buckets: usize) -> Config {
        Config { low, high, buckets }
    }

    /// Check that the configuration describes a usable histogram.
    ///
    /// Besides ordering, the shifted span `high - (low - 1)` has to be a
    /// finite value of at least one, or the bucket scale degenerates.
    pub fn validate(&self) -> Result<(), Error> {
        let span = self.high - (self.low - 1.);
        if !self.low.is_finite()
            || !self.high.is_finite()
            || self.high < self.low
            || !(span >= 1. && span.is_finite())
        {
            return Err(Error::InvalidBounds {
                low: self.low,
                high: self.high,
            });
        }
        if self.buckets == 0 {
            return Err(Error::NoBuckets);
        }
        Ok(())
    }
}

#[test]
fn rejects_inverted_bounds() {
    assert_eq!(
        Config::new(10., 0., 10).validate(),
        Err(Error::InvalidBounds { low: 10., high: 0. })
    );
}

#[test]
fn rejects_non_finite_bounds() {
    assert!(Config::new(f64::NEG_INFINITY, 0., 10).validate().is_err());
    assert!(Config::new(0., f64::NAN, 10).validate().is_err());
}

#[test]
fn rejects_overflowing_span() {
    assert_eq!(
        Config::new(-1e308, 1e308, 100).validate(),
        Err(Error::InvalidBounds {
            low: -1e308,
            high: 1e308
        })
    );
    // at this magnitude `low - 1` rounds back to `low`
    assert!(Config::new(1e300, 1e300, 10).validate().is_err());
    assert_eq!(Config::new(-1e300, 1e300, 100).validate(), Ok(()));
}

#[test]
fn rejects_zero_buckets() {
    assert_eq!(Config::new(0., 1., 0).validate(), Err(Error::NoBuckets));
}

#[test]
fn accepts_degenerate_range() {
    assert_eq!(Config::new(5., 5., 4).validate(), Ok(()));
    assert_eq!(Config::default().validate(), Ok(()));
}

#[cfg(feature = "serde")]
#[test]
fn deserializes_from_json() {
    let config: Config =
        serde_json::from_str(r#"{"low": 0.0, "high": 250.0, "buckets": 64}"#).unwrap();
    assert_eq!(config, Config::new(0., 250., 64));
}
