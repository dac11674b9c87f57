//! Packet format of the serial link to the host application.
//!
//! A packet is six bytes `[command][data: 4][threshold_level]`. On the wire it is framed as
//! `0x01 <packet> 0x04`. Multi byte data is big endian. Replies reuse the packet layout and put
//! a [`Marker`] into the last byte.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Error;

pub const START: u8 = 0x01;
pub const STOP: u8 = 0x04;
pub const PACKET_LEN: usize = 6;
pub const FRAME_LEN: usize = PACKET_LEN + 2;

pub const MIN_INTERVAL_PRESCALER: u32 = 1;
pub const MAX_INTERVAL_PRESCALER: u32 = 65536;

#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    CheckLink = 0x10,
    GetRecords = 0x11,
    SetThreshold = 0x12,
    SetInterval = 0x13,
    SetTime = 0x14,
    ClearRecords = 0x15,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Marker {
    Ack = 0x06,
    Nak = 0x15,
    Record = 0xf0,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub command: u8,
    pub data: [u8; 4],
    pub threshold_level: u8,
}

impl Packet {
    pub fn new(command: u8, data: u32, threshold_level: u8) -> Self {
        Self {
            command,
            data: data.to_be_bytes(),
            threshold_level,
        }
    }

    pub fn reply(command: u8, data: u32, marker: Marker) -> Self {
        Self::new(command, data, marker.into())
    }

    pub fn data_u32(&self) -> u32 {
        u32::from_be_bytes(self.data)
    }

    pub fn marker(&self) -> Option<Marker> {
        Marker::try_from(self.threshold_level).ok()
    }

    pub fn from_bytes(b: &[u8; PACKET_LEN]) -> Self {
        Self {
            command: b[0],
            data: [b[1], b[2], b[3], b[4]],
            threshold_level: b[5],
        }
    }

    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let d = self.data;
        [self.command, d[0], d[1], d[2], d[3], self.threshold_level]
    }

    pub fn frame(&self) -> [u8; FRAME_LEN] {
        let mut f = [0; FRAME_LEN];
        f[0] = START;
        f[1..FRAME_LEN - 1].copy_from_slice(&self.to_bytes());
        f[FRAME_LEN - 1] = STOP;
        f
    }
}

/// A validated host request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Request {
    CheckLink,
    GetRecords,
    SetThreshold { lower: u8, upper: u8 },
    SetInterval { prescaler: u32 },
    SetTime { epoch: u32 },
    ClearRecords,
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::CheckLink => Command::CheckLink,
            Request::GetRecords => Command::GetRecords,
            Request::SetThreshold { .. } => Command::SetThreshold,
            Request::SetInterval { .. } => Command::SetInterval,
            Request::SetTime { .. } => Command::SetTime,
            Request::ClearRecords => Command::ClearRecords,
        }
    }
}

impl TryFrom<Packet> for Request {
    type Error = Error;

    fn try_from(p: Packet) -> Result<Self, Error> {
        let command = Command::try_from(p.command).map_err(|_| Error::ProtocolError)?;
        Ok(match command {
            Command::CheckLink => Request::CheckLink,
            Command::GetRecords => Request::GetRecords,
            Command::SetThreshold => {
                let (lower, upper) = (p.data[0], p.data[1]);
                if lower >= upper {
                    return Err(Error::ProtocolError);
                }
                Request::SetThreshold { lower, upper }
            }
            Command::SetInterval => {
                let prescaler = p.data_u32();
                if !(MIN_INTERVAL_PRESCALER..=MAX_INTERVAL_PRESCALER).contains(&prescaler) {
                    return Err(Error::ProtocolError);
                }
                Request::SetInterval { prescaler }
            }
            Command::SetTime => Request::SetTime {
                epoch: p.data_u32(),
            },
            Command::ClearRecords => Request::ClearRecords,
        })
    }
}

/// Reassembles frames from the received byte stream.
///
/// Bytes outside of a frame are dropped. A frame whose stop byte is wrong is reported once and
/// scanning restarts at the next start byte inside it.
pub struct Deframer {
    buf: [u8; FRAME_LEN],
    len: usize,
}

impl Default for Deframer {
    fn default() -> Self {
        Self {
            buf: [0; FRAME_LEN],
            len: 0,
        }
    }
}

impl Deframer {
    pub fn push(&mut self, byte: u8) -> Option<Result<Packet, Error>> {
        if self.len == 0 && byte != START {
            return None;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < FRAME_LEN {
            return None;
        }

        if self.buf[FRAME_LEN - 1] == STOP {
            self.len = 0;
            let mut packet = [0; PACKET_LEN];
            packet.copy_from_slice(&self.buf[1..FRAME_LEN - 1]);
            Some(Ok(Packet::from_bytes(&packet)))
        } else {
            match self.buf[1..].iter().position(|b| *b == START) {
                Some(p) => {
                    let begin = p + 1;
                    self.buf.copy_within(begin.., 0);
                    self.len = FRAME_LEN - begin;
                }
                None => self.len = 0,
            }
            Some(Err(Error::ProtocolError))
        }
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }
}
