use std::{collections::VecDeque, time::Instant};

use super::driver::{DecodeSummary, run_rcv_fsm_loop};
use super::fsm::{PacketSource, ProtocolIoContext, RcvEvent};
use super::session::DecodedMessage;
use crate::config::Threshold;
use crate::error::Result;
use crate::pck::Packet;

/// Feeds a recorded arrival trace to the decoder instead of a socket.
///
/// Stops once the trace is exhausted.
pub struct ReplayContext {
    trace: VecDeque<(Packet, Instant)>,
    messages: Vec<DecodedMessage>,
}

impl ReplayContext {
    pub fn new(trace: impl IntoIterator<Item = (Packet, Instant)>) -> Self {
        Self {
            trace: trace.into_iter().collect(),
            messages: Vec::new(),
        }
    }

    pub fn into_messages(self) -> Vec<DecodedMessage> {
        self.messages
    }
}

impl PacketSource for ReplayContext {
    fn wait_for_pkt(&mut self) -> Result<RcvEvent> {
        Ok(match self.trace.pop_front() {
            Some((pck, at)) => RcvEvent::RecvPck(Some(pck), at),
            None => RcvEvent::Idle,
        })
    }

    fn is_stopped(&self) -> bool {
        self.trace.is_empty()
    }
}

impl ProtocolIoContext for ReplayContext {
    fn deliver_message(&mut self, msg: DecodedMessage) {
        self.messages.push(msg);
    }
}

/// Run the decoder over an arrival trace.
///
/// Returns the messages finished during the trace and the summary, whose
/// `pending` holds the characters of the last, still open session.
pub fn decode_trace(
    trace: impl IntoIterator<Item = (Packet, Instant)>,
    threshold: Threshold,
    session_timeout_ms: f64,
) -> Result<(Vec<DecodedMessage>, DecodeSummary)> {
    let mut ctx = ReplayContext::new(trace);
    let summary = run_rcv_fsm_loop(&mut ctx, threshold, session_timeout_ms)?;
    Ok((ctx.into_messages(), summary))
}
