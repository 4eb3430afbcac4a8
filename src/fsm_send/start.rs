use tracing::info;

use super::fsm::{
    FsmStateWrapper, FsmWrap, ProtocolIoContext, SndEvent, SndFsm, SndStateStart, StateRouter,
    make_pkt, send_or_log,
};
use crate::{error::Result, pck::PacketType};

impl StateRouter for SndFsm<SndStateStart> {
    fn goto(self, e: SndEvent, ctx: &mut dyn ProtocolIoContext) -> Result<FsmStateWrapper> {
        match e {
            // edge 1: priming packet, carries no bit
            SndEvent::InitPriming => {
                let sndpkt = make_pkt(0, PacketType::Data);
                if send_or_log(ctx, &sndpkt) {
                    info!("sent initial packet, seq 0");
                }
                Ok(self.to_send(1).wrap())
            }

            // no bit leaves before the priming packet
            SndEvent::NextBit(_) => Ok(self.wrap()),
        }
    }
}
