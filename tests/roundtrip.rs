//! Encoder output replayed into the decoder on an ideal link.

use std::{io, time::Instant};

use timing_channel::{
    config::{Delays, Threshold},
    fsm_recv::{SESSION_TIMEOUT_MS, decode_trace},
    fsm_send::{BitCursor, ProtocolIoContext, run_snd_fsm_loop},
    meter::duration_from_ms,
    pck::Packet,
};

/// Sender context whose sleeps advance a virtual clock, so the recorded
/// send times are the arrival times of a jitter free link.
struct IdealLink {
    bits: BitCursor,
    clock: Instant,
    trace: Vec<(Packet, Instant)>,
    sent: u32,
}

impl IdealLink {
    fn new(msg: &[u8], clock: Instant) -> Self {
        Self {
            bits: BitCursor::new(msg.to_vec()),
            clock,
            trace: vec![],
            sent: 0,
        }
    }
}

impl ProtocolIoContext for IdealLink {
    fn next_bit(&mut self) -> Option<u8> {
        self.bits.next()
    }

    fn now(&self) -> Instant {
        self.clock
    }

    fn sleep_ms(&mut self, ms: f64) {
        self.clock += duration_from_ms(ms);
    }

    fn udt_send(&mut self, pck: &Packet) -> io::Result<()> {
        self.trace.push((*pck, self.clock));
        Ok(())
    }

    fn get_sent_counter(&self) -> u32 {
        self.sent
    }

    fn increase_sent_counter(&mut self) {
        self.sent += 1;
    }

    fn get_failure_counter(&self) -> u32 {
        0
    }

    fn increase_failure_counter(&mut self) {}
}

fn transmit(msg: &[u8], delays: Delays, clock: Instant) -> Vec<(Packet, Instant)> {
    let mut link = IdealLink::new(msg, clock);
    let report = run_snd_fsm_loop(&mut link, delays).unwrap();
    assert_eq!(report.packets_sent as usize, 8 * msg.len() + 1);
    link.trace
}

#[test]
fn hi_round_trips() {
    let delays = Delays::new(50.0, 150.0).unwrap();
    let trace = transmit(b"Hi", delays, Instant::now());

    // bit sequence as seen by the receiver
    let gaps: Vec<u8> = trace
        .windows(2)
        .map(|w| if w[1].1 - w[0].1 < duration_from_ms(125.0) { 0 } else { 1 })
        .collect();
    assert_eq!(gaps, vec![0, 1, 0, 0, 1, 0, 0, 0, 0, 1, 1, 0, 1, 0, 0, 1]);

    let (msgs, summary) =
        decode_trace(trace, Threshold::new(125.0).unwrap(), SESSION_TIMEOUT_MS).unwrap();
    assert!(msgs.is_empty());
    assert_eq!(summary.pending, b"Hi".to_vec());
}

#[test]
fn messages_round_trip_at_midpoint_threshold() {
    let cases: [(&[u8], f64, f64); 4] = [
        (b"The quick brown fox", 50.0, 150.0),
        (b"~!@#$%^&*()", 5.0, 7.5),
        (&[0x01, 0x7f, 0x80, 0xff], 20.0, 21.0),
        (b"a\nb\tc", 1.0, 100.0),
    ];

    for (msg, zero, one) in cases {
        let delays = Delays::new(zero, one).unwrap();
        let trace = transmit(msg, delays, Instant::now());
        let threshold = Threshold::new(delays.midpoint()).unwrap();

        let (_, summary) = decode_trace(trace, threshold, SESSION_TIMEOUT_MS).unwrap();
        assert_eq!(summary.pending, msg.to_vec(), "delays {zero}/{one}");
    }
}

#[test]
fn back_to_back_sessions_are_separated() {
    let delays = Delays::new(10.0, 30.0).unwrap();
    let first = transmit(b"one", delays, Instant::now());
    let resume = first.last().unwrap().1 + duration_from_ms(15.0);
    let second = transmit(b"two", delays, resume);

    let trace = first.into_iter().chain(second);
    let (msgs, summary) =
        decode_trace(trace, Threshold::new(20.0).unwrap(), SESSION_TIMEOUT_MS).unwrap();

    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].text(), "one");
    assert_eq!(summary.pending, b"two".to_vec());
}
