use core::cell::RefCell;

use critical_section::Mutex;
use drivers_shared::Error;
use heapless::Deque;

struct Inner<T, const N: usize> {
    queue: Deque<T, N>,
    dropped: u32,
}

/// Bounded queue between one interrupt producer and the main loop.
///
/// Every access runs inside a critical section, so `push` may be called from an interrupt
/// handler while the main loop is in the middle of `pop`. When the queue is full the new item is
/// rejected and counted; items already queued are never overwritten.
pub struct Handoff<T, const N: usize> {
    inner: Mutex<RefCell<Inner<T, N>>>,
}

impl<T, const N: usize> Default for Handoff<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Handoff<T, N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                queue: Deque::new(),
                dropped: 0,
            })),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn push(&self, v: T) -> Result<(), Error> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            match inner.queue.push_back(v) {
                Ok(()) => Ok(()),
                Err(_) => {
                    inner.dropped = inner.dropped.saturating_add(1);
                    Err(Error::Overflow)
                }
            }
        })
    }

    pub fn pop(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).queue.pop_front())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).queue.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards everything queued, e.g. bytes received while the device sleeps.
    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).queue.clear())
    }

    /// Number of items rejected because the queue was full since the previous call.
    pub fn take_dropped(&self) -> u32 {
        critical_section::with(|cs| core::mem::take(&mut self.inner.borrow_ref_mut(cs).dropped))
    }
}
