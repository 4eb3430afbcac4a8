use tracing::{debug, info};

use super::fsm::{
    FsmStateWrapper, FsmWrap, ProtocolIoContext, RcvEvent, RcvFsm, RcvStateInSession,
    StateRouter,
};
use super::session::{ByteOutcome, DecoderSession};
use crate::{error::Result, meter::interval_ms};

impl StateRouter for RcvFsm<RcvStateInSession> {
    fn goto(mut self, e: RcvEvent, ctx: &mut dyn ProtocolIoContext) -> Result<FsmStateWrapper> {
        match e {
            RcvEvent::Idle => Ok(self.wrap()),

            // malformed datagram, does not move the arrival reference
            RcvEvent::RecvPck(None, _) => {
                debug!("ignoring malformed datagram");
                Ok(self.wrap())
            }

            // edge 2: timeout or sequence regression => packet primes a new session
            RcvEvent::RecvPck(Some(rcvpkt), at)
                if interval_ms(self.state().session().last_arrival(), at)
                    > self.session_timeout_ms()
                    || rcvpkt.seq_n() <= self.state().session().last_seq_n() =>
            {
                if let Some(msg) = self.state().session().finish(at) {
                    info!(
                        len = msg.bytes.len(),
                        "message complete: \"{}\" in {:.1} ms",
                        msg.text(),
                        msg.elapsed_ms
                    );
                    ctx.deliver_message(msg);
                }
                info!(seq_n = rcvpkt.seq_n(), "received initial packet");
                Ok(self
                    .to_in_session(DecoderSession::start(rcvpkt.seq_n(), at))
                    .wrap())
            }

            // edge 3: same session, data packet carries one bit
            RcvEvent::RecvPck(Some(rcvpkt), at) if rcvpkt.is_data() => {
                let dt_ms = interval_ms(self.state().session().last_arrival(), at);
                let bit = self.threshold().classify(dt_ms);
                debug!(seq_n = rcvpkt.seq_n(), bit, "interval {dt_ms:.1} ms");

                let session = self.session_mut();
                match session.push_bit(bit) {
                    ByteOutcome::Appended(byte) => info!(
                        "decoded character '{}', message so far: \"{}\"",
                        char::from(byte),
                        String::from_utf8_lossy(session.message())
                    ),
                    ByteOutcome::DroppedNul => debug!("dropped zero byte"),
                    ByteOutcome::Pending => {}
                }
                session.touch(rcvpkt.seq_n(), at);
                Ok(self.wrap())
            }

            // edge 4: probe packet, no bit but still the new reference
            RcvEvent::RecvPck(Some(rcvpkt), at) => {
                self.session_mut().touch(rcvpkt.seq_n(), at);
                Ok(self.wrap())
            }
        }
    }
}
