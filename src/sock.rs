//! The `TimingSocket` represents a UDP transport endpoint used by every
//! mode of the timing channel.
//!
//! Each run (encode, probe, decode or log) owns a temporary protocol I/O
//! context (`SendProtocolIoContext`, `ListenContext`,
//! `RecvProtocolIoContext`) which drives the pipeline logic on top of the
//! socket.
//!
//! All runs are blocking. Receive loops wake up every poll interval to check
//! their [`StopHandle`], so a caller can end them without killing the
//! process.

use std::{
    io::{self, Write},
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{
    calib::CalibrationLog,
    config::{Delays, Impairments, ProbeParams, Threshold},
    error::Result,
    fsm_recv::{
        self, DecodeSummary, DecodedMessage, LogSummary, PacketSource, RcvEvent,
        SESSION_TIMEOUT_MS,
    },
    fsm_send::{self, BitCursor, ProbeReport, TransmitReport},
    meter::duration_from_ms,
    pck::{PACKET_LEN, Packet},
};

pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// room for oversized datagrams, so they are recognized as malformed
const RECV_BUF_LEN: usize = 64;

/// Cloneable run/stop switch for the receive loops.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "bin-deps")]
impl StopHandle {
    /// Stop once `signal` resolves. The future runs on a single threaded
    /// runtime in a background thread, so the receive loops stay blocking.
    pub fn stop_when<F>(&self, signal: F) -> io::Result<thread::JoinHandle<()>>
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let handle = self.clone();

        Ok(thread::spawn(move || match rt.block_on(signal) {
            Ok(()) => {
                tracing::info!("received shutdown signal");
                handle.stop();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for shutdown signal"),
        }))
    }

    /// Ctrl+C stops the loops instead of killing the process, so logs get
    /// flushed and summaries reported.
    pub fn stop_on_ctrl_c(&self) -> io::Result<()> {
        self.stop_when(tokio::signal::ctrl_c()).map(drop)
    }
}

struct SendProtocolIoContext<'a> {
    sock_ref: &'a TimingSocket,
    recv_addr: SocketAddr,
    bits: BitCursor,
    sent_counter: u32,
    failure_counter: u32,
}

impl<'a> SendProtocolIoContext<'a> {
    fn new(sock_ref: &'a TimingSocket, recv_addr: SocketAddr, msg: Vec<u8>) -> Self {
        Self {
            sock_ref,
            recv_addr,
            bits: BitCursor::new(msg),
            sent_counter: 0,
            failure_counter: 0,
        }
    }
}

impl fsm_send::ProtocolIoContext for SendProtocolIoContext<'_> {
    fn next_bit(&mut self) -> Option<u8> {
        self.bits.next()
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_ms(&mut self, ms: f64) {
        thread::sleep(duration_from_ms(ms));
    }

    fn udt_send(&mut self, pck: &Packet) -> io::Result<()> {
        self.sock_ref.udt_send(pck, self.recv_addr)?;
        Ok(())
    }

    fn get_sent_counter(&self) -> u32 {
        self.sent_counter
    }

    fn increase_sent_counter(&mut self) {
        self.sent_counter += 1;
    }

    fn get_failure_counter(&self) -> u32 {
        self.failure_counter
    }

    fn increase_failure_counter(&mut self) {
        self.failure_counter += 1;
    }
}

/// Packet source for the log loop, and the base of the decode context.
struct ListenContext<'a> {
    sock_ref: &'a TimingSocket,
    stop: &'a StopHandle,
}

impl PacketSource for ListenContext<'_> {
    fn wait_for_pkt(&mut self) -> Result<RcvEvent> {
        match self.sock_ref.rdt_recv()? {
            Some((rcvpkt, at)) => Ok(RcvEvent::RecvPck(rcvpkt, at)),
            None => Ok(RcvEvent::Idle),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

struct RecvProtocolIoContext<'a> {
    listen: ListenContext<'a>,
    on_message: &'a mut dyn FnMut(DecodedMessage),
}

impl PacketSource for RecvProtocolIoContext<'_> {
    fn wait_for_pkt(&mut self) -> Result<RcvEvent> {
        self.listen.wait_for_pkt()
    }

    fn is_stopped(&self) -> bool {
        self.listen.is_stopped()
    }
}

impl fsm_recv::ProtocolIoContext for RecvProtocolIoContext<'_> {
    fn deliver_message(&mut self, msg: DecodedMessage) {
        (self.on_message)(msg);
    }
}

/// One socket per process: either a sender or a receiver.
pub struct TimingSocket {
    inner: UdpSocket,
    session_timeout_ms: f64,
    poll_interval: Duration,
    impairments: Impairments,
}

impl TimingSocket {
    /// Ephemeral local port, for the sending modes.
    pub fn bind_any() -> io::Result<TimingSocket> {
        TimingSocket::bind("0.0.0.0:0")
    }

    /// All interfaces on `port`, for the receiving modes.
    pub fn bind_port(port: u16) -> io::Result<TimingSocket> {
        TimingSocket::bind(("0.0.0.0", port))
    }

    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<TimingSocket> {
        let sock = UdpSocket::bind(addr)?;
        io::Result::Ok(TimingSocket {
            inner: sock,
            session_timeout_ms: SESSION_TIMEOUT_MS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            impairments: Impairments::default(),
        })
    }

    /// Simulated link impairments applied on send, all off by default.
    pub fn set_unreliable_transmit_parameters(&mut self, impairments: Impairments) {
        self.impairments = impairments;
    }

    // socket configuration functions

    pub fn set_session_timeout_ms(&mut self, timeout_ms: f64) {
        self.session_timeout_ms = timeout_ms;
    }

    /// zero is raised to one millisecond, a zero read timeout is invalid
    pub fn set_poll_interval_ms(&mut self, interval_ms: u64) {
        self.poll_interval = Duration::from_millis(interval_ms.max(1));
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    // socket blocking functionality

    /// encode `msg` in inter-packet delays, blocking until the last bit is out
    pub fn send_message_blocking(
        &mut self,
        msg: Vec<u8>,
        recv_addr: SocketAddr,
        delays: Delays,
    ) -> Result<TransmitReport> {
        let mut ctx = SendProtocolIoContext::new(self, recv_addr, msg);
        fsm_send::run_snd_fsm_loop(&mut ctx, delays)
    }

    pub fn send_probe_blocking(
        &mut self,
        recv_addr: SocketAddr,
        params: ProbeParams,
    ) -> Result<ProbeReport> {
        let mut ctx = SendProtocolIoContext::new(self, recv_addr, Vec::new());
        Ok(fsm_send::run_probe_loop(&mut ctx, params))
    }

    /// decode until `stop`, handing every finished message to `on_message`
    pub fn recv_decode_blocking(
        &mut self,
        threshold: Threshold,
        stop: &StopHandle,
        mut on_message: impl FnMut(DecodedMessage),
    ) -> Result<DecodeSummary> {
        self.inner.set_read_timeout(Some(self.poll_interval))?;
        let session_timeout_ms = self.session_timeout_ms;
        let mut ctx = RecvProtocolIoContext {
            listen: ListenContext {
                sock_ref: self,
                stop,
            },
            on_message: &mut on_message,
        };
        fsm_recv::run_rcv_fsm_loop(&mut ctx, threshold, session_timeout_ms)
    }

    /// append every inter-arrival time to `log` until `stop`
    pub fn recv_log_blocking<W: Write>(
        &mut self,
        log: &mut CalibrationLog<W>,
        stop: &StopHandle,
    ) -> Result<LogSummary> {
        self.inner.set_read_timeout(Some(self.poll_interval))?;
        let mut ctx = ListenContext {
            sock_ref: self,
            stop,
        };
        fsm_recv::run_log_loop(&mut ctx, log)
    }

    /// Release the socket.
    pub fn close_socket(self) {
        drop(self.inner);
    }

    // utils

    fn udt_send(&self, sndpkt: &Packet, recv_addr: SocketAddr) -> io::Result<usize> {
        let imp = &self.impairments;

        // Simulate Packet loss
        if rand::random_bool(imp.loss_p()) {
            debug!(seq_n = sndpkt.seq_n(), "simulated loss");
            return Ok(0);
        }

        let mut pkt = sndpkt.encode();

        // Simulate Packet Error
        if rand::random_bool(imp.error_p()) {
            let mask: u8 = 1 << rand::random_range(0..8);
            pkt[rand::random_range(0..PACKET_LEN)] ^= mask;
        }

        // Simulate Packet Duplication
        if rand::random_bool(imp.dup_p()) {
            let _ = self.inner.send_to(&pkt, recv_addr);
        }

        self.inner.send_to(&pkt, recv_addr)
    }

    /// `None` if the poll interval passed without a datagram
    fn rdt_recv(&self) -> io::Result<Option<(Option<Packet>, Instant)>> {
        let mut buf = [0u8; RECV_BUF_LEN];
        match self.inner.recv_from(&mut buf) {
            Ok((n, src)) => {
                let at = Instant::now();
                match Packet::decode(&buf[..n]) {
                    Ok(pck) => Ok(Some((Some(pck), at))),
                    Err(e) => {
                        debug!(%src, error = %e, "malformed datagram");
                        Ok(Some((None, at)))
                    }
                }
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
