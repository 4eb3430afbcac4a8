use super::fsm::FsmStateWrapper;
use super::fsm::FsmWrap;
use super::fsm::ProtocolIoContext;
use super::fsm::RcvEvent;
use super::fsm::RcvFsm;
use super::fsm::StateRouter;
use crate::config::Threshold;
use crate::error::Result;

/// What the decode loop saw before it was stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeSummary {
    pub packets_received: u64,
    pub malformed: u64,
    /// characters of the session still open when the loop stopped
    pub pending: Vec<u8>,
}

impl DecodeSummary {
    /// The unfinished message as text, `None` if no character was decoded.
    pub fn pending_text(&self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.pending).into_owned())
    }
}

/// Decode arriving packets until the context reports a stop.
pub fn run_rcv_fsm_loop(
    ctx: &mut impl ProtocolIoContext,
    threshold: Threshold,
    session_timeout_ms: f64,
) -> Result<DecodeSummary> {
    let mut cur_fsm_wrap = RcvFsm::init(threshold, session_timeout_ms).wrap();
    let mut summary = DecodeSummary::default();

    // run fsm
    while !ctx.is_stopped() {
        let event = ctx.wait_for_pkt()?;

        match &event {
            RcvEvent::RecvPck(Some(_), _) => summary.packets_received += 1,
            RcvEvent::RecvPck(None, _) => summary.malformed += 1,
            RcvEvent::Idle => {}
        }

        cur_fsm_wrap = match cur_fsm_wrap {
            FsmStateWrapper::AwaitingSession(fsm) => fsm.goto(event, ctx)?,
            FsmStateWrapper::InSession(fsm) => fsm.goto(event, ctx)?,
        };
    }

    if let Some(session) = cur_fsm_wrap.session() {
        summary.pending = session.message().to_vec();
    }
    Ok(summary)
}
