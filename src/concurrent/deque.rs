// Copyright (c) 2025 Sprocket Contributors
//
// Bounded Chase-Lev work-stealing deque.
//
// The owner thread pushes and pops from the bottom (LIFO); any other thread
// may steal from the top (FIFO for thieves). Unlike a growable Chase-Lev
// deque, capacity is fixed at construction and a full push is reported back
// to the caller rather than silently reallocating — the scheduler routes a
// rejected push to its overflow queue instead.
//
// Reference: "Dynamic Circular Work-Stealing Deque" by Chase and Lev (2005).

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicIsize, AtomicU64, Ordering};

/// A slot full of the still-owned item, returned so the caller can reroute it.
#[derive(Debug)]
pub struct PushError<T>(pub T);

/// Result of a steal attempt.
#[derive(Debug)]
pub enum Steal<T> {
    /// Successfully stole a value.
    Success(T),
    /// The deque was empty.
    Empty,
    /// Lost a race with another stealer or the owner; caller should retry.
    Retry,
}

impl<T> Steal<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Steal::Success(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Steal::Empty)
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Steal::Retry)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Steal::Success(v) => Some(v),
            _ => None,
        }
    }
}

/// Bounded, fixed-capacity work-stealing deque.
///
/// `top` and `bottom` are kept in separate cache lines to avoid false
/// sharing between the owner (which only touches `bottom`, except when
/// racing a stealer for the last element) and thieves (which only touch
/// `top`).
#[repr(C, align(64))]
pub struct BoundedDeque<T> {
    bottom: AtomicIsize,
    _pad1: [u8; 64 - std::mem::size_of::<AtomicIsize>()],
    top: AtomicIsize,
    _pad2: [u8; 64 - std::mem::size_of::<AtomicIsize>()],
    mask: isize,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    push_count: AtomicU64,
    pop_count: AtomicU64,
    steal_count: AtomicU64,
    steal_attempt_count: AtomicU64,
}

// Safety: access to `buffer` slots is synchronized by the owner/top-stealer
// protocol implemented below; no two threads ever read or write the same
// slot without the happens-before edge the protocol establishes.
unsafe impl<T: Send> Send for BoundedDeque<T> {}
unsafe impl<T: Send> Sync for BoundedDeque<T> {}

impl<T> BoundedDeque<T> {
    /// Create a new deque. `capacity` must be a power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "deque capacity must be a power of two");
        let mut storage = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            storage.push(UnsafeCell::new(MaybeUninit::uninit()));
        }

        Self {
            bottom: AtomicIsize::new(0),
            _pad1: [0; 64 - std::mem::size_of::<AtomicIsize>()],
            top: AtomicIsize::new(0),
            _pad2: [0; 64 - std::mem::size_of::<AtomicIsize>()],
            mask: capacity as isize - 1,
            buffer: storage.into_boxed_slice(),
            push_count: AtomicU64::new(0),
            pop_count: AtomicU64::new(0),
            steal_count: AtomicU64::new(0),
            steal_attempt_count: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        (self.mask + 1) as usize
    }

    #[inline]
    unsafe fn slot(&self, index: isize) -> &UnsafeCell<MaybeUninit<T>> {
        &self.buffer[(index & self.mask) as usize]
    }

    /// Push to the bottom. Only the owning thread may call this. Returns the
    /// item back to the caller if the deque is full.
    pub fn push_bottom(&self, value: T) -> Result<(), PushError<T>> {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Acquire);

        if bottom - top >= self.mask + 1 {
            return Err(PushError(value));
        }

        // Safety: only the owner writes at `bottom`, and no stealer can have
        // advanced `top` past it since size < capacity.
        unsafe {
            (*self.slot(bottom).get()).write(value);
        }

        // Publish the new bottom; any stealer observing it must also observe
        // the write above.
        self.bottom.store(bottom + 1, Ordering::Release);
        self.push_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Pop from the bottom (LIFO). Only the owning thread may call this.
    pub fn pop_bottom(&self) -> Option<T> {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let new_bottom = bottom - 1;
        self.bottom.store(new_bottom, Ordering::Relaxed);

        // Full fence so the store above is visible to a concurrent steal's
        // acquire load of `bottom`, and so our read of `top` below observes
        // any steal that already happened.
        fence(Ordering::SeqCst);

        let top = self.top.load(Ordering::Relaxed);

        if top > new_bottom {
            // Empty: restore bottom and bail.
            self.bottom.store(bottom, Ordering::Relaxed);
            return None;
        }

        // Safety: top <= new_bottom, so this slot was pushed and not yet
        // stolen or popped.
        let value = unsafe { (*self.slot(new_bottom).get()).assume_init_read() };

        if top == new_bottom {
            // Last element: race the stealers for it.
            if self
                .top
                .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
            {
                // Lost the race; the value belongs to the stealer that won.
                std::mem::forget(value);
                self.bottom.store(bottom, Ordering::Relaxed);
                return None;
            }
            self.bottom.store(bottom, Ordering::Relaxed);
        }

        self.pop_count.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Steal from the top (FIFO for thieves). Any non-owner thread may call this.
    pub fn steal_top(&self) -> Steal<T> {
        self.steal_attempt_count.fetch_add(1, Ordering::Relaxed);

        let top = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bottom = self.bottom.load(Ordering::Acquire);

        if top >= bottom {
            return Steal::Empty;
        }

        // Safety: top < bottom, and the slot was published with a Release
        // store to `bottom` that we've synchronized with via the Acquire
        // load above.
        let value = unsafe { (*self.slot(top).get()).assume_init_read() };

        if self
            .top
            .compare_exchange(top, top + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.steal_count.fetch_add(1, Ordering::Relaxed);
            Steal::Success(value)
        } else {
            // Lost the race; forget our read so the winner's copy is the
            // only live one.
            std::mem::forget(value);
            Steal::Retry
        }
    }

    pub fn is_empty(&self) -> bool {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Relaxed);
        top >= bottom
    }

    pub fn len(&self) -> usize {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Relaxed);
        (bottom - top).max(0) as usize
    }

    pub fn stats(&self) -> DequeStats {
        DequeStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            steal_count: self.steal_count.load(Ordering::Relaxed),
            steal_attempt_count: self.steal_attempt_count.load(Ordering::Relaxed),
            current_size: self.len(),
            capacity: self.capacity(),
        }
    }
}

impl<T> Drop for BoundedDeque<T> {
    fn drop(&mut self) {
        while self.pop_bottom().is_some() {}
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DequeStats {
    pub push_count: u64,
    pub pop_count: u64,
    pub steal_count: u64,
    pub steal_attempt_count: u64,
    pub current_size: usize,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AOrdering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn push_pop_is_lifo() {
        let deque = BoundedDeque::new(8);
        deque.push_bottom(1).unwrap();
        deque.push_bottom(2).unwrap();
        deque.push_bottom(3).unwrap();

        assert_eq!(deque.pop_bottom(), Some(3));
        assert_eq!(deque.pop_bottom(), Some(2));
        assert_eq!(deque.pop_bottom(), Some(1));
        assert_eq!(deque.pop_bottom(), None);
    }

    #[test]
    fn steal_is_fifo() {
        let deque = BoundedDeque::new(8);
        deque.push_bottom(1).unwrap();
        deque.push_bottom(2).unwrap();
        deque.push_bottom(3).unwrap();

        assert!(matches!(deque.steal_top(), Steal::Success(1)));
        assert_eq!(deque.pop_bottom(), Some(3));
        assert_eq!(deque.pop_bottom(), Some(2));
    }

    #[test]
    fn full_push_is_rejected() {
        let deque = BoundedDeque::new(4);
        for i in 0..4 {
            deque.push_bottom(i).unwrap();
        }
        match deque.push_bottom(4) {
            Err(PushError(4)) => {}
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(deque.len(), 4);
    }

    #[test]
    fn size_never_exceeds_capacity_under_contention() {
        let deque = Arc::new(BoundedDeque::new(16));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for i in 0..1000 {
            let _ = deque.push_bottom(i);
            max_seen.fetch_max(deque.len(), AOrdering::Relaxed);
            while deque.len() >= 16 {
                deque.pop_bottom();
            }
        }

        assert!(max_seen.load(AOrdering::Relaxed) <= 16);
    }

    #[test]
    fn concurrent_steal_and_pop_every_item_exactly_once() {
        let deque = Arc::new(BoundedDeque::new(2048));
        for i in 0..1000 {
            deque.push_bottom(i).unwrap();
        }

        let barrier = Arc::new(Barrier::new(11));
        let mut handles = vec![];

        {
            let d = deque.clone();
            let b = barrier.clone();
            handles.push(thread::spawn(move || {
                b.wait();
                let mut count = 0;
                while d.pop_bottom().is_some() {
                    count += 1;
                }
                count
            }));
        }

        for _ in 0..10 {
            let d = deque.clone();
            let b = barrier.clone();
            handles.push(thread::spawn(move || {
                b.wait();
                let mut count = 0;
                loop {
                    match d.steal_top() {
                        Steal::Success(_) => count += 1,
                        Steal::Empty => break,
                        Steal::Retry => {}
                    }
                }
                count
            }));
        }

        let total: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1000);
    }
}
