//! Timing Channel – Packet module
//!
//! # Format:
//!
//! ```text
//!  ┌───────────────────────────────────────────────┐
//!  │                     Packet                    │
//!  ├───────────────────────────────────────────────┤
//!  │          Sequence Number (32 bit, BE)         │
//!  ├───────────────────────────────────────────────┤
//!  │ Type (8 bit) │
//!  └──────────────┘
//! ```
//!
//! ## Fields
//!
//! - **Sequence Number (32 bit)** – per sender session, starts at 0,
//!   network byte order
//! - **Type (8 bit)**
//!   - `0` – Data, carries one bit in its arrival time
//!   - `1` – Probe, link characterization only
//!
//! There is no payload and no checksum. The bytes of a packet carry no
//! covert information, only its arrival time does.

use crate::error::{Error, Result};

pub const PACKET_LEN: usize = 5;

#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub enum PacketType {
    Data,
    Probe,
}

impl PacketType {
    fn to_byte(self) -> u8 {
        match self {
            PacketType::Data => 0,
            PacketType::Probe => 1,
        }
    }

    fn from_byte(b: u8) -> Result<PacketType> {
        match b {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Probe),
            _ => Err(Error::MalformedPacket(format!("unknown packet type {b}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    seq_n: u32,
    kind: PacketType,
}

impl Packet {
    pub fn new(seq_n: u32, kind: PacketType) -> Self {
        Self { seq_n, kind }
    }

    // getter

    pub fn seq_n(&self) -> u32 {
        self.seq_n
    }

    pub fn kind(&self) -> PacketType {
        self.kind
    }

    pub fn is_data(&self) -> bool {
        self.kind == PacketType::Data
    }

    pub fn is_probe(&self) -> bool {
        self.kind == PacketType::Probe
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[..4].copy_from_slice(&self.seq_n.to_be_bytes());
        buf[4] = self.kind.to_byte();
        buf
    }

    /// Only an exact 5 byte datagram is a packet.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != PACKET_LEN {
            return Err(Error::MalformedPacket(format!(
                "expected {PACKET_LEN} bytes, got {}",
                buf.len()
            )));
        }

        let seq_n = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let kind = PacketType::from_byte(buf[4])?;
        Ok(Self { seq_n, kind })
    }
}
