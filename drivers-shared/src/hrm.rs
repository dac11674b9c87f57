use crate::Error;

/// One conversion of the PPG front end, 12 bit right aligned.
pub type RawSample = u16;

pub const RAW_SAMPLE_MAX: RawSample = (1 << 12) - 1;

/// Analog front end of the PPG sensor.
///
/// Conversions are not returned from here: the conversion-complete interrupt pushes them into a
/// handoff queue that the measurement pipeline drains.
pub trait Sensor {
    fn start(&mut self) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
}
