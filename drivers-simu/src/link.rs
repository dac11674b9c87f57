use drivers_shared::{link::HostLink, protocol::FRAME_LEN, Error};

/// UART towards the host. Transmitted frames are printed as hex, one frame per line.
#[derive(Default)]
pub struct Uart;

pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses whitespace separated hex bytes like `01 10 00 00 00 00 00 04`.
pub fn parse_hex(line: &str) -> Option<Vec<u8>> {
    line.split_whitespace()
        .map(|b| u8::from_str_radix(b, 16).ok())
        .collect()
}

impl HostLink for Uart {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for frame in bytes.chunks(FRAME_LEN) {
            println!("<- {}", to_hex(frame));
        }
        Ok(())
    }
}
