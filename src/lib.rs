//! Fixed-memory, log-scaled histograms for latency-like samples.
//!
//! A [`Histogram`] spreads a fixed number of logarithmically sized buckets
//! over a configured `[low, high]` range and answers percentile queries at
//! bucket resolution. Samples outside the range are only counted, as low or
//! high outliers. Memory use never grows after construction.
//!
//! ```
//! use loghistogram::Histogram;
//!
//! let h: Histogram = Histogram::new(0., 1000., 200).unwrap();
//! for latency in &[12, 15, 15, 18, 250] {
//!     h.accumulate(*latency);
//! }
//! let p = h.percentiles(&[50., 99.]);
//! assert!(p[0] >= 15. && p[0] < 16.);
//! ```
//!
//! Accumulation is safe from any number of threads. The storage strategy is
//! a type parameter: [`LockFree`] (the default) uses one atomic per bucket and
//! never blocks writers, [`Locked`] guards everything with one mutex and
//! gives exact point-in-time reads.
//!
//! [`WindowedHistogram`] keeps a current and a previous window; calling
//! [`WindowedHistogram::window`] on a timer gives a trailing view of recent
//! samples. Rates over an interval come from [`Histogram::dup`] and
//! [`Histogram::sub`] (or the free function [`sub`]).

macro_rules! rep_no_copy {
    ($e:expr; $n:expr) => {
        {
            let mut v = Vec::with_capacity($n);
            for _ in 0..$n {
                v.push($e);
            }
            v
        }
    };
}

mod config;
mod error;
mod histogram;
mod mapping;
mod percentile;
pub mod store;
mod window;

pub use config::Config;
pub use error::Error;
pub use histogram::Histogram;
pub use mapping::Mapping;
pub use store::{Counts, LockFree, Locked, Store};
pub use window::WindowedHistogram;

/// `h1 - h2` as a new histogram, leaving both inputs untouched.
///
/// Fails when the two histograms have different bucket layouts.
pub fn sub<S: Store, T: Store>(
    h1: &Histogram<S>,
    h2: &Histogram<T>,
) -> Result<Histogram<S>, Error> {
    let mut diff = h1.dup();
    diff.sub(h2)?;
    Ok(diff)
}

#[test]
fn sub_leaves_inputs_alone() {
    let h1: Histogram = Histogram::new(0., 10., 10).unwrap();
    let h2: Histogram<Locked> = Histogram::new(0., 10., 10).unwrap();
    h1.accumulate(1);
    h1.accumulate(9);
    h2.accumulate(1);

    let diff = sub(&h1, &h2).unwrap();
    assert_eq!(diff.count(), 1);
    assert_eq!(h1.count(), 2);
    assert_eq!(h2.count(), 1);

    let wide: Histogram = Histogram::new(0., 10., 20).unwrap();
    assert!(sub(&h1, &wide).is_err());
}
