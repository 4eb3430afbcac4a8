use tracing::{debug, info};

use super::fsm::{
    FsmStateWrapper, FsmWrap, ProtocolIoContext, RcvEvent, RcvFsm, RcvStateAwaitingSession,
    StateRouter,
};
use super::session::DecoderSession;
use crate::error::Result;

impl StateRouter for RcvFsm<RcvStateAwaitingSession> {
    fn goto(self, e: RcvEvent, _ctx: &mut dyn ProtocolIoContext) -> Result<FsmStateWrapper> {
        match e {
            // nothing arrived
            RcvEvent::Idle => Ok(self.wrap()),

            // malformed datagram
            RcvEvent::RecvPck(None, _) => {
                debug!("ignoring malformed datagram");
                Ok(self.wrap())
            }

            // edge 1: very first packet primes a session, no bit
            RcvEvent::RecvPck(Some(rcvpkt), at) => {
                info!(seq_n = rcvpkt.seq_n(), "received initial packet");
                Ok(self
                    .to_in_session(DecoderSession::start(rcvpkt.seq_n(), at))
                    .wrap())
            }
        }
    }
}
