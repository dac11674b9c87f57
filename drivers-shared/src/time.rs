use crate::Error;

/// Hardware timer with a prescaler and an auto reload period.
///
/// The update rate is `clock / (prescaler * period)`.
pub trait Timer {
    fn set_prescaler(&mut self, prescaler: u32) -> Result<(), Error>;
    fn set_period(&mut self, period: u32) -> Result<(), Error>;
    fn start(&mut self) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
}

/// Wall clock in seconds since the unix epoch.
pub trait Rtc {
    fn now(&mut self) -> Result<u32, Error>;
    fn set(&mut self, epoch: u32) -> Result<(), Error>;
}
