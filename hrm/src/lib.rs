#![cfg_attr(not(test), no_std)]

pub mod filter;
pub mod terma;

pub use filter::{DigitalFilter, FilterCoefficients, FilterState};
pub use terma::{Detection, PeakDetector};

pub const MIN_BPM: u16 = 30;
pub const MAX_BPM: u16 = 230;

/// Heart rate in beats per minute. Zero means no rate has been determined yet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BPM(pub u16);

impl BPM {
    pub const UNKNOWN: BPM = BPM(0);

    pub fn is_known(&self) -> bool {
        self.0 != 0
    }
}
