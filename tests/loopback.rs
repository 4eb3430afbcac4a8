//! Real UDP traffic over 127.0.0.1, receive loops bounded by a StopHandle.

use std::{
    net::UdpSocket,
    thread,
    time::{Duration, Instant},
};

use timing_channel::{
    calib::{CalibrationLog, parse_samples},
    config::{Delays, Impairments, ProbeParams, Threshold},
    sock::{StopHandle, TimingSocket},
};

fn receiver() -> TimingSocket {
    let mut sock = TimingSocket::bind("127.0.0.1:0").unwrap();
    sock.set_poll_interval_ms(10);
    sock
}

fn sender() -> TimingSocket {
    TimingSocket::bind("127.0.0.1:0").unwrap()
}

#[test]
fn stop_handle_ends_idle_receive_loop() {
    let mut sock = receiver();
    let stop = StopHandle::new();
    let stopper = stop.clone();

    let handle = thread::spawn(move || {
        let start = Instant::now();
        let summary = sock
            .recv_decode_blocking(Threshold::default(), &stop, |_| {})
            .unwrap();
        (summary, start.elapsed())
    });

    thread::sleep(Duration::from_millis(50));
    stopper.stop();
    let (summary, elapsed) = handle.join().unwrap();

    assert_eq!(summary.packets_received, 0);
    assert!(summary.pending.is_empty());
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn logger_records_probe_train() {
    let mut rcv = receiver();
    let addr = rcv.local_addr().unwrap();
    let stop = StopHandle::new();
    let stopper = stop.clone();

    let handle = thread::spawn(move || {
        let mut log = CalibrationLog::new(Vec::new()).unwrap();
        let summary = rcv.recv_log_blocking(&mut log, &stop).unwrap();
        (summary, log.into_inner().unwrap())
    });

    thread::sleep(Duration::from_millis(50));

    // a datagram that is not a packet is neither logged nor an anchor
    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    raw.send_to(&[1, 2, 3], addr).unwrap();
    thread::sleep(Duration::from_millis(20));

    let mut snd = sender();
    let report = snd
        .send_probe_blocking(addr, ProbeParams::new(5.0, 20).unwrap())
        .unwrap();
    assert_eq!(report.packets_sent, 20);
    snd.close_socket();

    thread::sleep(Duration::from_millis(200));
    stopper.stop();
    let (summary, out) = handle.join().unwrap();

    assert_eq!(summary.packets_logged, 20);
    assert_eq!(summary.malformed, 1);

    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Time"));
    assert_eq!(lines.next(), Some("0.0"));
    assert_eq!(text.lines().count(), 21);

    let samples = parse_samples(text.as_bytes()).unwrap();
    assert_eq!(samples.len(), 20);
    assert_eq!(samples[0], 0.0);
}

#[test]
fn decoder_receives_message_over_udp() {
    let mut rcv = receiver();
    let addr = rcv.local_addr().unwrap();
    let stop = StopHandle::new();
    let stopper = stop.clone();

    let handle = thread::spawn(move || {
        let mut got = Vec::new();
        let summary = rcv
            .recv_decode_blocking(Threshold::new(35.0).unwrap(), &stop, |msg| {
                got.push(msg.text())
            })
            .unwrap();
        (summary, got)
    });

    // arrival times are taken on receive, so the loop must already be polling
    thread::sleep(Duration::from_millis(50));

    let delays = Delays::new(10.0, 60.0).unwrap();
    let mut snd = sender();
    snd.send_message_blocking(b"ok".to_vec(), addr, delays).unwrap();
    // the next session's priming packet regresses the counter and closes "ok"
    let mut snd = sender();
    snd.send_message_blocking(b"!".to_vec(), addr, delays).unwrap();

    thread::sleep(Duration::from_millis(200));
    stopper.stop();
    let (summary, got) = handle.join().unwrap();

    assert_eq!(got, vec!["ok".to_string()]);
    assert_eq!(summary.pending, b"!".to_vec());
    assert_eq!(summary.packets_received, 17 + 9);
}

#[test]
fn full_loss_keeps_every_packet_off_the_wire() {
    let mut rcv = receiver();
    let addr = rcv.local_addr().unwrap();
    let stop = StopHandle::new();
    let stopper = stop.clone();

    let handle = thread::spawn(move || {
        let mut log = CalibrationLog::new(Vec::new()).unwrap();
        rcv.recv_log_blocking(&mut log, &stop).unwrap()
    });

    thread::sleep(Duration::from_millis(50));

    let mut snd = sender();
    snd.set_unreliable_transmit_parameters(Impairments::new(1.0, 0.0, 0.0).unwrap());
    let report = snd
        .send_probe_blocking(addr, ProbeParams::new(2.0, 10).unwrap())
        .unwrap();
    // a simulated loss is not a send failure
    assert_eq!(report.send_failures, 0);

    thread::sleep(Duration::from_millis(100));
    stopper.stop();
    let summary = handle.join().unwrap();

    assert_eq!(summary.packets_logged, 0);
    assert_eq!(summary.malformed, 0);
}
