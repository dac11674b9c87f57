use core::fmt;

/// Failure kinds shared by every layer of the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Parameter out of range, wrong length or violated precondition.
    InvalidInput,
    /// A peripheral refused an operation or reported a fault.
    HardwareFailure,
    /// A bounded buffer had no room left; the newest data was dropped.
    Overflow,
    /// Malformed frame, unknown command or invalid payload from the host.
    ProtocolError,
    /// The record region has no free slot left.
    StorageExhausted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::InvalidInput => "invalid input",
            Error::HardwareFailure => "hardware failure",
            Error::Overflow => "buffer overflow",
            Error::ProtocolError => "protocol error",
            Error::StorageExhausted => "storage exhausted",
        };
        f.write_str(s)
    }
}

#[cfg(not(target_arch = "arm"))]
impl std::error::Error for Error {}
