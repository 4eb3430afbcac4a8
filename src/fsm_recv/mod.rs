//! Receiving side: the Decoder state machine (decode mode) and the
//! calibration Logger (logging mode).
//!
//! Both pull [`fsm::RcvEvent`]s from a [`PacketSource`] and run until it
//! reports a stop.

mod awaiting_session;
pub mod driver;
pub mod fsm;
mod in_session;
pub mod logger;
pub mod replay;
pub mod session;

pub use driver::{DecodeSummary, run_rcv_fsm_loop};
pub use fsm::{PacketSource, ProtocolIoContext, RcvEvent};
pub use logger::{LogSummary, run_log_loop};
pub use replay::{ReplayContext, decode_trace};
pub use session::{DecodedMessage, DecoderSession};

/// Gap after which the next packet starts a new session.
pub const SESSION_TIMEOUT_MS: f64 = 5000.0;

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::config::Threshold;
    use crate::pck::{Packet, PacketType};

    fn data(seq_n: u32) -> Packet {
        Packet::new(seq_n, PacketType::Data)
    }

    /// arrival trace from (packet, gap to previous packet in ms)
    fn trace(steps: &[(Packet, u64)]) -> Vec<(Packet, Instant)> {
        let mut at = Instant::now();
        steps
            .iter()
            .map(|(p, gap)| {
                at += Duration::from_millis(*gap);
                (*p, at)
            })
            .collect()
    }

    /// priming packet plus one data packet per bit of `msg`
    fn message_steps(msg: &[u8], first_seq: u32, zero: u64, one: u64) -> Vec<(Packet, u64)> {
        let mut steps = vec![(data(first_seq), 0)];
        let mut seq = first_seq;
        for byte in msg {
            for i in (0..8).rev() {
                seq += 1;
                let gap = if (byte >> i) & 1 == 0 { zero } else { one };
                steps.push((data(seq), gap));
            }
        }
        steps
    }

    fn threshold(ms: f64) -> Threshold {
        Threshold::new(ms).unwrap()
    }

    #[test]
    fn decodes_hi() {
        let steps = message_steps(b"Hi", 0, 50, 150);
        let (msgs, summary) =
            decode_trace(trace(&steps), threshold(125.0), SESSION_TIMEOUT_MS).unwrap();

        assert!(msgs.is_empty());
        assert_eq!(summary.pending, b"Hi".to_vec());
        assert_eq!(summary.pending_text().as_deref(), Some("Hi"));
        assert_eq!(summary.packets_received, 17);
    }

    #[test]
    fn interval_equal_to_threshold_is_one() {
        // 0b0100_0001 = 'A', the ones arrive exactly on the threshold
        let steps = message_steps(b"A", 0, 50, 125);
        let (_, summary) =
            decode_trace(trace(&steps), threshold(125.0), SESSION_TIMEOUT_MS).unwrap();
        assert_eq!(summary.pending, b"A".to_vec());
    }

    #[test]
    fn regression_finalizes_and_restarts() {
        let mut steps = message_steps(b"ok", 0, 50, 150);
        // new sender session on the same port, only 10 ms later
        steps.extend(message_steps(b"go", 0, 50, 150).into_iter().enumerate().map(
            |(i, (p, gap))| if i == 0 { (p, 10) } else { (p, gap) },
        ));

        let (msgs, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].text(), "ok");
        assert_eq!(summary.pending, b"go".to_vec());
    }

    #[test]
    fn repeated_sequence_number_is_a_regression() {
        let mut steps = message_steps(b"a", 0, 50, 150);
        steps.push((data(8), 50));
        let (msgs, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();

        assert_eq!(msgs[0].text(), "a");
        assert!(summary.pending.is_empty());
    }

    #[test]
    fn timeout_finalizes_and_new_priming_decodes_no_bit() {
        let mut steps = message_steps(b"x", 0, 50, 150);
        // next sender continues the counter, but after a long pause
        steps.extend(message_steps(b"y", 9, 50, 150).into_iter().enumerate().map(
            |(i, (p, gap))| if i == 0 { (p, 5001) } else { (p, gap) },
        ));

        let (msgs, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].text(), "x");
        // elapsed runs to the arrival of the packet that closed the session
        assert!(msgs[0].elapsed_ms > 5000.0);
        assert_eq!(summary.pending, b"y".to_vec());
    }

    #[test]
    fn gap_of_exactly_timeout_stays_in_session() {
        // a 5000 ms gap is a 1 bit, not a new session
        let mut steps = vec![(data(0), 0), (data(1), 5000)];
        for seq in 2..=8 {
            steps.push((data(seq), 50));
        }
        let (msgs, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();
        assert!(msgs.is_empty());
        assert_eq!(summary.pending, vec![0b1000_0000]);
    }

    #[test]
    fn empty_session_is_not_delivered() {
        let steps = vec![(data(0), 0), (data(1), 50), (data(0), 50)];
        let (msgs, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();
        assert!(msgs.is_empty());
        assert_eq!(summary.pending_text(), None);
    }

    #[test]
    fn zero_byte_is_dropped_from_message() {
        let steps = message_steps(&[b'a', 0, b'b'], 0, 50, 150);
        let (_, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();
        assert_eq!(summary.pending, b"ab".to_vec());
    }

    #[test]
    fn probe_packets_move_reference_without_bit() {
        // priming, a probe 30 ms later, then 8 data packets
        let mut steps = vec![(data(0), 0), (Packet::new(1, PacketType::Probe), 30)];
        for seq in 2..=9 {
            let gap = if seq == 3 { 150 } else { 50 };
            steps.push((data(seq), gap));
        }
        let (_, summary) =
            decode_trace(trace(&steps), threshold(100.0), SESSION_TIMEOUT_MS).unwrap();
        // bits 0,1,0,0,0,0,0,0
        assert_eq!(summary.pending, vec![0b0100_0000]);
    }
}
