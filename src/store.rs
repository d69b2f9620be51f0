//! Counter storage behind a histogram, in two concurrency flavors.
//!
//! A store holds one or more buffers of bucket counters plus a running total
//! per buffer. Exactly one buffer is current and receives new samples; reads
//! always sum across every buffer. Plain histograms use a single buffer,
//! windowed histograms use two and rotate between them.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

/// A consistent-enough read of a store's counters.
pub trait Counts {
    /// Number of counters, including the two outlier buckets.
    fn len(&self) -> usize;

    /// Count held by one bucket, summed across buffers.
    fn get(&self, index: usize) -> u64;

    /// Running total, summed across buffers.
    fn total(&self) -> u64;

    /// Copy every bucket out, reading each one exactly once.
    fn to_vec(&self) -> Vec<u64> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

/// Concurrency strategy for a histogram's counters.
pub trait Store: Send + Sync + Sized {
    type View<'a>: Counts
    where
        Self: 'a;

    /// Zeroed storage with `buffers` buffers of `len` counters each.
    fn with_buffers(len: usize, buffers: usize) -> Self;

    /// Single-buffer storage holding `counts`, with the total set to their sum.
    fn from_counts(counts: Vec<u64>) -> Self;

    /// Count one sample in bucket `index` of the current buffer.
    fn record(&self, index: usize);

    /// Like `record`, through exclusive access and without synchronization.
    fn record_mut(&mut self, index: usize);

    fn view(&self) -> Self::View<'_>;

    /// Zero the next buffer and make it current. With two buffers the old
    /// current one becomes the previous window.
    fn rotate(&self);

    /// Subtract `counts` from the current buffer, saturating at zero, and
    /// recompute its total from the result.
    fn subtract(&mut self, counts: &[u64]);
}

struct Arena {
    counts: Box<[AtomicU64]>,
    total: CachePadded<AtomicU64>,
}

impl Arena {
    fn new(len: usize) -> Arena {
        Arena {
            counts: rep_no_copy!(AtomicU64::new(0); len).into_boxed_slice(),
            total: CachePadded::new(AtomicU64::new(0)),
        }
    }
}

/// Lock-free counters: every bucket and total is its own atomic.
///
/// `record` never blocks. A reader may see a total that momentarily disagrees
/// with the sum of the buckets, since the two are separate atomic updates;
/// they agree again once writers pause. Rotation is serialized by a small
/// mutex that writers never touch, so a writer that picked a buffer before
/// one rotation and increments it only after the following rotation has
/// zeroed that buffer loses its sample.
pub struct LockFree {
    arenas: Box<[Arena]>,
    current: AtomicUsize,
    rotation: Mutex<()>,
}

pub struct LockFreeView<'a> {
    arenas: &'a [Arena],
}

impl<'a> Counts for LockFreeView<'a> {
    fn len(&self) -> usize {
        self.arenas[0].counts.len()
    }

    fn get(&self, index: usize) -> u64 {
        self.arenas
            .iter()
            .map(|a| a.counts[index].load(Ordering::Relaxed))
            .sum()
    }

    fn total(&self) -> u64 {
        self.arenas
            .iter()
            .map(|a| a.total.load(Ordering::Relaxed))
            .sum()
    }
}

impl Store for LockFree {
    type View<'a> = LockFreeView<'a>;

    fn with_buffers(len: usize, buffers: usize) -> LockFree {
        LockFree {
            arenas: rep_no_copy!(Arena::new(len); buffers).into_boxed_slice(),
            current: AtomicUsize::new(0),
            rotation: Mutex::new(()),
        }
    }

    fn from_counts(counts: Vec<u64>) -> LockFree {
        let total = counts.iter().sum();
        let arena = Arena {
            counts: counts.into_iter().map(AtomicU64::new).collect(),
            total: CachePadded::new(AtomicU64::new(total)),
        };
        LockFree {
            arenas: vec![arena].into_boxed_slice(),
            current: AtomicUsize::new(0),
            rotation: Mutex::new(()),
        }
    }

    #[inline]
    fn record(&self, index: usize) {
        let arena = &self.arenas[self.current.load(Ordering::Acquire)];
        arena.counts[index].fetch_add(1, Ordering::Relaxed);
        arena.total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_mut(&mut self, index: usize) {
        let arena = &mut self.arenas[*self.current.get_mut()];
        *arena.counts[index].get_mut() += 1;
        *arena.total.get_mut() += 1;
    }

    fn view(&self) -> LockFreeView<'_> {
        LockFreeView {
            arenas: &self.arenas,
        }
    }

    fn rotate(&self) {
        let _rotation = self.rotation.lock();

        let current = self.current.load(Ordering::Acquire);
        let next = (current + 1) % self.arenas.len();

        let stale = &self.arenas[next];
        for count in stale.counts.iter() {
            count.store(0, Ordering::Relaxed);
        }
        stale.total.store(0, Ordering::Relaxed);

        // writers that loaded the old index before this store still land in
        // the old buffer, which is now the previous window. One that is still
        // pending when the next rotation zeroes that buffer can be lost.
        self.current.store(next, Ordering::Release);
    }

    fn subtract(&mut self, counts: &[u64]) {
        let arena = &mut self.arenas[*self.current.get_mut()];
        let mut total = 0;
        for (count, sub) in arena.counts.iter_mut().zip(counts) {
            let count = count.get_mut();
            *count = count.saturating_sub(*sub);
            total += *count;
        }
        *arena.total.get_mut() = total;
    }
}

struct Buffer {
    counts: Vec<u64>,
    total: u64,
}

struct Buffers {
    buffers: Vec<Buffer>,
    current: usize,
}

impl Buffers {
    fn current(&mut self) -> &mut Buffer {
        &mut self.buffers[self.current]
    }
}

/// Mutex-guarded counters: every operation sees an exact point in time, at
/// the cost of contention between writers.
pub struct Locked {
    inner: Mutex<Buffers>,
}

pub struct LockedView<'a> {
    guard: MutexGuard<'a, Buffers>,
}

impl<'a> Counts for LockedView<'a> {
    fn len(&self) -> usize {
        self.guard.buffers[0].counts.len()
    }

    fn get(&self, index: usize) -> u64 {
        self.guard.buffers.iter().map(|b| b.counts[index]).sum()
    }

    fn total(&self) -> u64 {
        self.guard.buffers.iter().map(|b| b.total).sum()
    }
}

impl Store for Locked {
    type View<'a> = LockedView<'a>;

    fn with_buffers(len: usize, buffers: usize) -> Locked {
        let buffers = (0..buffers)
            .map(|_| Buffer {
                counts: vec![0; len],
                total: 0,
            })
            .collect();
        Locked {
            inner: Mutex::new(Buffers {
                buffers,
                current: 0,
            }),
        }
    }

    fn from_counts(counts: Vec<u64>) -> Locked {
        let total = counts.iter().sum();
        Locked {
            inner: Mutex::new(Buffers {
                buffers: vec![Buffer { counts, total }],
                current: 0,
            }),
        }
    }

    #[inline]
    fn record(&self, index: usize) {
        let mut inner = self.inner.lock();
        let buffer = inner.current();
        buffer.counts[index] += 1;
        buffer.total += 1;
    }

    #[inline]
    fn record_mut(&mut self, index: usize) {
        let buffer = self.inner.get_mut().current();
        buffer.counts[index] += 1;
        buffer.total += 1;
    }

    fn view(&self) -> LockedView<'_> {
        LockedView {
            guard: self.inner.lock(),
        }
    }

    fn rotate(&self) {
        let mut inner = self.inner.lock();
        let next = (inner.current + 1) % inner.buffers.len();

        let stale = &mut inner.buffers[next];
        for count in stale.counts.iter_mut() {
            *count = 0;
        }
        stale.total = 0;

        inner.current = next;
    }

    fn subtract(&mut self, counts: &[u64]) {
        let buffer = self.inner.get_mut().current();
        for (count, sub) in buffer.counts.iter_mut().zip(counts) {
            *count = count.saturating_sub(*sub);
        }
        buffer.total = buffer.counts.iter().sum();
    }
}

#[cfg(test)]
fn exercise<S: Store>() {
    let mut store = S::with_buffers(4, 2);
    store.record(1);
    store.record(1);
    store.record_mut(3);
    {
        let view = store.view();
        assert_eq!(view.len(), 4);
        assert_eq!(view.to_vec(), vec![0, 2, 0, 1]);
        assert_eq!(view.total(), 3);
    }

    // the old buffer is still visible as the previous window
    store.rotate();
    store.record(2);
    assert_eq!(store.view().to_vec(), vec![0, 2, 1, 1]);
    assert_eq!(store.view().total(), 4);

    // and is zeroed when it comes around again
    store.rotate();
    assert_eq!(store.view().to_vec(), vec![0, 0, 1, 0]);
    assert_eq!(store.view().total(), 1);

    let mut single = S::from_counts(vec![1, 5, 0, 2]);
    assert_eq!(single.view().total(), 8);
    single.subtract(&[0, 2, 3, 2]);
    assert_eq!(single.view().to_vec(), vec![1, 3, 0, 0]);
    assert_eq!(single.view().total(), 4);
}

#[test]
fn lock_free_store() {
    exercise::<LockFree>();
}

#[test]
fn locked_store() {
    exercise::<Locked>();
}
