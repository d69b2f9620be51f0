use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use loghistogram::{Histogram, LockFree, Locked, Store, WindowedHistogram};

const THREADS: usize = 8;
const PER_THREAD: usize = 20_000;

fn many_writers<S: Store + 'static>() {
    let h: Arc<Histogram<S>> = Arc::new(Histogram::new(0., 1000., 500).unwrap());

    let threads: Vec<_> = (0..THREADS)
        .map(|t| {
            let h = h.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    // every thread also contributes one outlier on each side
                    let value = match i {
                        0 => -1.,
                        1 => 2000.,
                        _ => ((i * (t + 1)) % 1000) as f64,
                    };
                    h.accumulate(value);
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    let total = (THREADS * PER_THREAD) as u64;
    assert_eq!(h.count(), total);
    assert_eq!(h.outliers(), (THREADS as u64, THREADS as u64));

    // the snapshot total is rebuilt from the buckets
    assert_eq!(h.dup().count(), total);
}

#[test]
fn many_writers_lock_free() {
    many_writers::<LockFree>();
}

#[test]
fn many_writers_locked() {
    many_writers::<Locked>();
}

fn readers_during_writes<S: Store + 'static>() {
    let h: Arc<Histogram<S>> = Arc::new(Histogram::new(0., 10_000., 1000).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            thread::spawn(move || {
                for i in 0..50_000 {
                    h.accumulate((i % 10_000) as f64);
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let h = h.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let ps = h.percentiles(&[10., 50., 90., 99.]);
                    if ps[0].is_nan() {
                        continue;
                    }
                    for pair in ps.windows(2) {
                        assert!(pair[0] <= pair[1], "{:?} not monotonic", ps);
                    }
                }
            })
        })
        .collect();

    for w in writers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    for r in readers {
        r.join().unwrap();
    }

    assert_eq!(h.count(), 200_000);
}

#[test]
fn readers_during_writes_lock_free() {
    readers_during_writes::<LockFree>();
}

#[test]
fn readers_during_writes_locked() {
    readers_during_writes::<Locked>();
}

fn rotation_during_writes<S: Store + 'static>() {
    let h: Arc<WindowedHistogram<S>> = Arc::new(WindowedHistogram::new(0., 100., 100).unwrap());

    let writers: Vec<_> = (0..THREADS)
        .map(|_| {
            let h = h.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    h.accumulate((i % 100) as f64);
                }
            })
        })
        .collect();

    // a single rotation keeps both halves visible, so nothing may go missing
    thread::yield_now();
    h.window();

    for w in writers {
        w.join().unwrap();
    }

    assert_eq!(h.count(), (THREADS * PER_THREAD) as u64);
    assert_eq!(h.dup().count(), (THREADS * PER_THREAD) as u64);
}

#[test]
fn rotation_during_writes_lock_free() {
    rotation_during_writes::<LockFree>();
}

#[test]
fn rotation_during_writes_locked() {
    rotation_during_writes::<Locked>();
}
