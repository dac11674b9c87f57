use crate::Error;

/// Outgoing half of the serial link to the host. Incoming bytes arrive through a handoff filled
/// by the receive interrupt.
pub trait HostLink {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error>;
}
