//! Sending side: the Encoder (message mode) as a small state machine and the
//! Prober (probe mode) as a fixed packet train.
//!
//! Both run on top of a [`ProtocolIoContext`], which the socket provides for
//! real transmissions.

pub mod driver;
pub mod fsm;
pub mod probe;
mod send;
mod start;

pub use driver::run_snd_fsm_loop;
pub use fsm::ProtocolIoContext;
pub use probe::run_probe_loop;

/// Walks a message bit by bit, most significant bit of each byte first.
#[derive(Debug, Clone)]
pub struct BitCursor {
    msg: Vec<u8>,
    pos: usize,
}

impl BitCursor {
    pub fn new(msg: Vec<u8>) -> Self {
        Self { msg, pos: 0 }
    }

    pub fn total_bits(&self) -> usize {
        self.msg.len() * 8
    }
}

impl Iterator for BitCursor {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = *self.msg.get(self.pos / 8)?;
        let shift = 7 - (self.pos % 8);
        self.pos += 1;
        Some((byte >> shift) & 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmitReport {
    pub packets_sent: u32,
    pub send_failures: u32,
    /// bits encoded, equals `8 * message length`
    pub bits: u32,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReport {
    pub packets_sent: u32,
    pub send_failures: u32,
    pub elapsed_ms: f64,
}

impl ProbeReport {
    /// packets per second over the whole train
    pub fn rate_pps(&self) -> f64 {
        if self.elapsed_ms <= 0.0 {
            return 0.0;
        }
        f64::from(self.packets_sent) / (self.elapsed_ms / 1000.0)
    }
}
