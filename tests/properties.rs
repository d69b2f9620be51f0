use proptest::prelude::*;

use loghistogram::{sub, Histogram, LockFree, Locked, WindowedHistogram};

const LOW: f64 = -50.;
const HIGH: f64 = 5000.;

fn samples() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-200f64..6000., 0..400)
}

fn sorted_percentiles() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-10f64..110., 1..12).prop_map(|mut ps| {
        ps.sort_by(|a, b| a.partial_cmp(b).unwrap());
        ps
    })
}

proptest! {
    #[test]
    fn count_includes_everything(values in samples()) {
        let h: Histogram = Histogram::new(LOW, HIGH, 300).unwrap();
        for v in &values {
            h.accumulate(*v);
        }
        prop_assert_eq!(h.count(), values.len() as u64);
    }

    #[test]
    fn outliers_partition_the_range(values in samples()) {
        let h: Histogram<Locked> = Histogram::new(LOW, HIGH, 300).unwrap();
        for v in &values {
            h.accumulate(*v);
        }
        let low = values.iter().filter(|v| **v < LOW).count() as u64;
        let high = values.iter().filter(|v| **v > HIGH).count() as u64;
        prop_assert_eq!(h.outliers(), (low, high));
    }

    #[test]
    fn percentiles_are_monotonic(values in samples(), ps in sorted_percentiles()) {
        let h: Histogram = Histogram::new(LOW, HIGH, 300).unwrap();
        for v in &values {
            h.accumulate(*v);
        }

        let answers = h.percentiles(&ps);
        prop_assert_eq!(answers.len(), ps.len());
        if values.is_empty() {
            prop_assert!(answers.iter().all(|a| a.is_nan()));
        } else {
            for pair in answers.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            // asking again, after the hint may have flipped direction,
            // gives the same answers
            prop_assert_eq!(h.percentiles(&ps), answers);
        }
    }

    #[test]
    fn single_and_batched_agree(values in samples(), ps in sorted_percentiles()) {
        let h: Histogram = Histogram::new(LOW, HIGH, 300).unwrap();
        for v in &values {
            h.accumulate(*v);
        }
        prop_assume!(!values.is_empty());

        let batched = h.percentiles(&ps);
        for (p, expected) in ps.iter().zip(batched) {
            prop_assert_eq!(h.percentile(*p), expected);
        }
    }

    #[test]
    fn dup_then_sub_is_empty(values in samples()) {
        let mut h: Histogram = Histogram::new(LOW, HIGH, 300).unwrap();
        for v in &values {
            h.accumulate(*v);
        }
        let copy = h.dup();
        prop_assert_eq!(sub(&h, &copy).unwrap().count(), 0);

        h.sub(&copy).unwrap();
        prop_assert_eq!(h.count(), 0);
        prop_assert_eq!(h.outliers(), (0, 0));
    }

    #[test]
    fn sub_counts_the_interval(before in samples(), after in samples()) {
        let h: Histogram<LockFree> = Histogram::new(LOW, HIGH, 300).unwrap();
        for v in &before {
            h.accumulate(*v);
        }
        let start = h.dup();
        for v in &after {
            h.accumulate(*v);
        }
        let diff = sub(&h, &start).unwrap();
        prop_assert_eq!(diff.count(), after.len() as u64);
    }

    #[test]
    fn window_keeps_two_periods(first in samples(), second in samples(), third in samples()) {
        let h: WindowedHistogram = WindowedHistogram::new(LOW, HIGH, 300).unwrap();
        for v in &first {
            h.accumulate(*v);
        }
        h.window();
        for v in &second {
            h.accumulate(*v);
        }
        prop_assert_eq!(h.count(), (first.len() + second.len()) as u64);

        h.window();
        for v in &third {
            h.accumulate(*v);
        }
        prop_assert_eq!(h.count(), (second.len() + third.len()) as u64);
    }
}
