use tracing::debug;

use super::fsm::{
    FsmStateWrapper, FsmWrap, ProtocolIoContext, SndEvent, SndFsm, SndStateSend, StateRouter,
    make_pkt, send_or_log,
};
use crate::{error::Result, meter::interval_ms, pck::PacketType};

impl StateRouter for SndFsm<SndStateSend> {
    fn goto(self, e: SndEvent, ctx: &mut dyn ProtocolIoContext) -> Result<FsmStateWrapper> {
        let seq_n = self.state().seq_n();
        match e {
            // edge 2: bit available => wait its delay, then emit
            SndEvent::NextBit(Some(bit)) => {
                let target_ms = self.delays().for_bit(bit);

                let sleep_start = ctx.now();
                ctx.sleep_ms(target_ms);
                let actual_ms = interval_ms(sleep_start, ctx.now());

                let sndpkt = make_pkt(seq_n, PacketType::Data);
                if send_or_log(ctx, &sndpkt) {
                    debug!(seq_n, bit, target_ms, actual_ms, "sent bit");
                }
                Ok(self.to_send(seq_n.wrapping_add(1)).wrap())
            }

            // edge 3: message exhausted
            SndEvent::NextBit(None) => Ok(self.to_end().wrap()),

            // already primed
            SndEvent::InitPriming => Ok(self.wrap()),
        }
    }
}
