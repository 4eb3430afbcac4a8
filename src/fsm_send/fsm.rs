use std::{io, time::Instant};

use tracing::warn;

use crate::config::Delays;
use crate::error::Result;
use crate::pck::{Packet, PacketType};

pub enum SndEvent {
    InitPriming,
    /// next message bit, `None` once the message is exhausted
    NextBit(Option<u8>),
}

// start
#[derive(Clone)]
pub struct SndStateStart;

// send
#[derive(Clone)]
pub struct SndStateSend {
    seq_n: u32,
}

impl SndStateSend {
    pub fn new(seq_n: u32) -> Self {
        Self { seq_n }
    }

    /// sequence number of the next packet to emit
    pub fn seq_n(&self) -> u32 {
        self.seq_n
    }
}

// end
#[derive(Clone)]
pub struct SndStateEnd;

// fsm
#[derive(Clone, Copy)]
struct Config {
    delays: Delays,
}

pub struct SndFsm<State: Clone> {
    state: State,
    config: Config,
}

impl<State: Clone> SndFsm<State> {
    pub fn new(state: State, delays: Delays) -> Self {
        SndFsm {
            state,
            config: Config { delays },
        }
    }

    pub fn delays(&self) -> Delays {
        self.config.delays
    }

    /// immutable reference
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn to_send(&self, seq_n: u32) -> SndFsm<SndStateSend> {
        SndFsm {
            state: SndStateSend::new(seq_n),
            config: self.config,
        }
    }

    pub fn to_end(&self) -> SndFsm<SndStateEnd> {
        SndFsm {
            state: SndStateEnd,
            config: self.config,
        }
    }
}

pub trait FsmWrap {
    fn wrap(self) -> FsmStateWrapper;
}

// impl wrap on all states
impl FsmWrap for SndFsm<SndStateStart> {
    fn wrap(self) -> FsmStateWrapper {
        FsmStateWrapper::Start(self)
    }
}

impl FsmWrap for SndFsm<SndStateSend> {
    fn wrap(self) -> FsmStateWrapper {
        FsmStateWrapper::Send(self)
    }
}

impl FsmWrap for SndFsm<SndStateEnd> {
    fn wrap(self) -> FsmStateWrapper {
        FsmStateWrapper::End
    }
}

impl SndFsm<SndStateStart> {
    /// fsm start entry point
    pub fn init(delays: Delays) -> SndFsm<SndStateStart> {
        SndFsm::new(SndStateStart, delays)
    }
}

pub enum FsmStateWrapper {
    Start(SndFsm<SndStateStart>),
    Send(SndFsm<SndStateSend>),
    End,
}

pub trait StateRouter {
    fn goto(self, e: SndEvent, ctx: &mut dyn ProtocolIoContext) -> Result<FsmStateWrapper>;
}

/// I/O seam of the sending side: clock, sleep and datagram send.
///
/// The socket backed context sleeps for real; test contexts advance a
/// virtual clock instead.
pub trait ProtocolIoContext {
    /// next bit of the message, MSB first
    fn next_bit(&mut self) -> Option<u8>;

    fn now(&self) -> Instant;
    /// best effort, the scheduler may add overhead
    fn sleep_ms(&mut self, ms: f64);

    fn udt_send(&mut self, pck: &Packet) -> io::Result<()>;

    /// Track sent packets and failed sends
    fn get_sent_counter(&self) -> u32;
    fn increase_sent_counter(&mut self);
    fn get_failure_counter(&self) -> u32;
    fn increase_failure_counter(&mut self);
}

pub fn make_pkt(seq_n: u32, t: PacketType) -> Packet {
    Packet::new(seq_n, t)
}

/// Send one packet; a failure is logged and counted, never propagated.
///
/// # Return
/// true if the packet left the socket
pub fn send_or_log(ctx: &mut dyn ProtocolIoContext, pck: &Packet) -> bool {
    match ctx.udt_send(pck) {
        Ok(()) => {
            ctx.increase_sent_counter();
            true
        }
        Err(e) => {
            warn!(seq_n = pck.seq_n(), error = %e, "send failed");
            ctx.increase_failure_counter();
            false
        }
    }
}
