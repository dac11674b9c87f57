use crate::Error;

/// Alternating on/off durations in milliseconds, starting with "on". A zero ends the pattern
/// early.
pub type Pattern = [u8; 7];

pub const ALARM: Pattern = [200, 100, 200, 100, 200, 250, 0];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuzzCmd {
    On,
    Off,
    Pattern(Pattern),
}

pub trait Buzzer {
    /// Starts repeating `pattern` until [`Buzzer::disable`] is called.
    fn enable(&mut self, pattern: Pattern) -> Result<(), Error>;
    fn disable(&mut self) -> Result<(), Error>;
}
