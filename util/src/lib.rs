#![cfg_attr(not(test), no_std)]

mod handoff;

use drivers_shared::{button::ButtonEvent, hrm::RawSample};
pub use handoff::Handoff;

/// 640 ms of samples at 100 Hz.
pub const RAW_CAPACITY: usize = 64;
pub const RX_CAPACITY: usize = 64;
pub const BUTTON_CAPACITY: usize = 4;
pub const INTERVAL_CAPACITY: usize = 4;

/// Everything interrupt handlers hand over to the main loop.
pub struct Interrupts {
    /// Sensor conversions, oldest first.
    pub samples: Handoff<RawSample, RAW_CAPACITY>,
    /// Bytes received from the host.
    pub rx: Handoff<u8, RX_CAPACITY>,
    pub buttons: Handoff<ButtonEvent, BUTTON_CAPACITY>,
    /// One entry per elapsed record interval.
    pub interval: Handoff<(), INTERVAL_CAPACITY>,
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupts {
    pub const fn new() -> Self {
        Self {
            samples: Handoff::new(),
            rx: Handoff::new(),
            buttons: Handoff::new(),
            interval: Handoff::new(),
        }
    }
}

/// Fixed size history that overwrites its oldest entry once full.
pub struct RingBuffer<const N: usize, T> {
    ring_buffer: [T; N],
    next: usize,
    num_total: usize,
}

impl<const N: usize, T: Default> Default for RingBuffer<N, T> {
    fn default() -> Self {
        Self {
            ring_buffer: core::array::from_fn(|_| Default::default()),
            next: 0,
            num_total: 0,
        }
    }
}

impl<const N: usize, T> RingBuffer<N, T> {
    /// Stores `v` and returns the value it replaced.
    pub fn add(&mut self, mut v: T) -> T {
        self.num_total += 1;

        core::mem::swap(&mut self.ring_buffer[self.next], &mut v);
        self.next = (self.next + 1) % N;

        v
    }

    pub fn num_valid(&self) -> usize {
        self.num_total.min(N)
    }

    /// Values added since construction or the last `clear`, including overwritten ones.
    pub fn num_total(&self) -> usize {
        self.num_total
    }

    pub fn is_full(&self) -> bool {
        self.num_valid() == N
    }

    /// Stored values, oldest first.
    pub fn ordered(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = self.ring_buffer.split_at(self.next);
        let older = if self.is_full() { older } else { &[] };
        older.iter().chain(newer.iter())
    }

    /// Forgets all values without touching the storage.
    pub fn clear(&mut self) {
        self.next = 0;
        self.num_total = 0;
    }
}

impl<const N: usize, T: Copy + Default> RingBuffer<N, T> {
    /// Copy of the full history, oldest first. Slots never written hold `T::default()`.
    pub fn to_array(&self) -> [T; N] {
        let mut out = [T::default(); N];
        for (o, v) in out.iter_mut().zip(self.ordered()) {
            *o = *v;
        }
        out
    }
}
