use std::time::Instant;

use crate::meter::interval_ms;

/// Result of shifting one bit into the current byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOutcome {
    /// fewer than 8 bits accumulated
    Pending,
    /// complete non-zero byte, appended to the message
    Appended(u8),
    /// complete zero byte, never appended
    DroppedNul,
}

/// Everything the decoder knows about the message currently being received.
///
/// Built fresh from a priming packet and thrown away when the next session
/// starts.
#[derive(Debug, Clone)]
pub struct DecoderSession {
    start: Instant,
    last_arrival: Instant,
    last_seq_n: u32,
    current_byte: u8,
    bit_count: u8,
    message: Vec<u8>,
}

impl DecoderSession {
    /// Session primed by a packet with `seq_n` arriving at `at`.
    pub fn start(seq_n: u32, at: Instant) -> Self {
        Self {
            start: at,
            last_arrival: at,
            last_seq_n: seq_n,
            current_byte: 0,
            bit_count: 0,
            message: Vec::new(),
        }
    }

    pub fn last_arrival(&self) -> Instant {
        self.last_arrival
    }

    pub fn last_seq_n(&self) -> u32 {
        self.last_seq_n
    }

    pub fn bit_count(&self) -> u8 {
        self.bit_count
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Update the arrival reference, for every packet of the session.
    pub fn touch(&mut self, seq_n: u32, at: Instant) {
        self.last_seq_n = seq_n;
        self.last_arrival = at;
    }

    /// Shift `bit` in, MSB first.
    pub fn push_bit(&mut self, bit: u8) -> ByteOutcome {
        self.current_byte = (self.current_byte << 1) | (bit & 1);
        self.bit_count += 1;

        if self.bit_count < 8 {
            return ByteOutcome::Pending;
        }

        let byte = self.current_byte;
        self.current_byte = 0;
        self.bit_count = 0;

        if byte == 0 {
            ByteOutcome::DroppedNul
        } else {
            self.message.push(byte);
            ByteOutcome::Appended(byte)
        }
    }

    /// Completed message, if any character was decoded.
    pub fn finish(&self, now: Instant) -> Option<DecodedMessage> {
        if self.message.is_empty() {
            return None;
        }
        Some(DecodedMessage {
            bytes: self.message.clone(),
            elapsed_ms: interval_ms(self.start, now),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub bytes: Vec<u8>,
    /// from the session's priming packet to the packet that closed it
    pub elapsed_ms: f64,
}

impl DecodedMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
