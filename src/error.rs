/// Errors produced when building or combining histograms.
///
/// These are configuration mistakes rather than data conditions: samples
/// outside the tracked range are counted as outliers, and an empty histogram
/// answers percentile queries with NaN.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The upper bound is below the lower bound, or a bound is not finite.
    #[error("invalid bounds: [{low}, {high}]")]
    InvalidBounds { low: f64, high: f64 },
    /// A histogram needs at least one bucket.
    #[error("bucket count must be positive")]
    NoBuckets,
    /// Two histograms with different bucket layouts were combined.
    #[error("bucket layout mismatch: {left} counters vs {right}")]
    ShapeMismatch { left: usize, right: usize },
}

#[test]
fn messages_name_the_problem() {
    let err = Error::InvalidBounds { low: 5., high: 1. };
    assert_eq!(err.to_string(), "invalid bounds: [5, 1]");

    let err = Error::ShapeMismatch { left: 12, right: 7 };
    assert_eq!(err.to_string(), "bucket layout mismatch: 12 counters vs 7");
}
