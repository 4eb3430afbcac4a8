use std::time::Instant;

use super::session::{DecodedMessage, DecoderSession};
use crate::config::Threshold;
use crate::error::Result;
use crate::pck::Packet;

pub enum RcvEvent {
    /// poll interval passed without a datagram
    Idle,
    /// rcvpkt (`None` if the datagram was malformed) and its arrival time
    RecvPck(Option<Packet>, Instant),
}

// no active message
#[derive(Clone)]
pub struct RcvStateAwaitingSession;

// accumulating bits of the current message
#[derive(Clone)]
pub struct RcvStateInSession {
    session: DecoderSession,
}

impl RcvStateInSession {
    pub fn new(session: DecoderSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &DecoderSession {
        &self.session
    }
}

// fsm

#[derive(Clone, Copy)]
struct Config {
    threshold: Threshold,
    session_timeout_ms: f64,
}

pub struct RcvFsm<State: Clone> {
    state: State,
    config: Config,
}

impl<State: Clone> RcvFsm<State> {
    pub fn new(state: State, threshold: Threshold, session_timeout_ms: f64) -> Self {
        RcvFsm {
            state,
            config: Config {
                threshold,
                session_timeout_ms,
            },
        }
    }

    /// immutable reference
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn threshold(&self) -> Threshold {
        self.config.threshold
    }

    pub fn session_timeout_ms(&self) -> f64 {
        self.config.session_timeout_ms
    }

    pub fn to_in_session(&self, session: DecoderSession) -> RcvFsm<RcvStateInSession> {
        RcvFsm {
            state: RcvStateInSession::new(session),
            config: self.config,
        }
    }
}

impl RcvFsm<RcvStateInSession> {
    pub fn session_mut(&mut self) -> &mut DecoderSession {
        &mut self.state.session
    }
}

// wrap trait on all states
pub trait FsmWrap {
    fn wrap(self) -> FsmStateWrapper;
}

impl FsmWrap for RcvFsm<RcvStateAwaitingSession> {
    fn wrap(self) -> FsmStateWrapper {
        FsmStateWrapper::AwaitingSession(self)
    }
}

impl FsmWrap for RcvFsm<RcvStateInSession> {
    fn wrap(self) -> FsmStateWrapper {
        FsmStateWrapper::InSession(self)
    }
}

// fsm entry point

impl RcvFsm<RcvStateAwaitingSession> {
    /// fsm start entry point
    pub fn init(threshold: Threshold, session_timeout_ms: f64) -> RcvFsm<RcvStateAwaitingSession> {
        RcvFsm::new(RcvStateAwaitingSession, threshold, session_timeout_ms)
    }
}

pub enum FsmStateWrapper {
    AwaitingSession(RcvFsm<RcvStateAwaitingSession>),
    InSession(RcvFsm<RcvStateInSession>),
}

impl FsmStateWrapper {
    /// session in progress, if any
    pub fn session(&self) -> Option<&DecoderSession> {
        match self {
            FsmStateWrapper::AwaitingSession(_) => None,
            FsmStateWrapper::InSession(fsm) => Some(fsm.state().session()),
        }
    }
}

pub trait StateRouter {
    fn goto(self, e: RcvEvent, ctx: &mut dyn ProtocolIoContext) -> Result<FsmStateWrapper>;
}

/// Where arriving packets come from, and whether to keep listening.
pub trait PacketSource {
    /// blocks at most one poll interval
    fn wait_for_pkt(&mut self) -> Result<RcvEvent>;
    fn is_stopped(&self) -> bool;
}

pub trait ProtocolIoContext: PacketSource {
    /// called once per finished session that decoded at least one character
    fn deliver_message(&mut self, msg: DecodedMessage);
}
