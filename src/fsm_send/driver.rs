use super::fsm::FsmStateWrapper;
use super::fsm::FsmWrap;

use super::fsm::ProtocolIoContext;
use super::fsm::SndEvent;
use super::fsm::SndFsm;
use super::fsm::StateRouter;
use super::TransmitReport;
use crate::config::Delays;
use crate::error::Result;
use crate::meter::interval_ms;

pub fn run_snd_fsm_loop(
    ctx: &mut impl ProtocolIoContext,
    delays: Delays,
) -> Result<TransmitReport> {
    let mut cur_fsm_wrap = SndFsm::init(delays).wrap();

    let start_time = ctx.now();

    // run fsm
    loop {
        if let FsmStateWrapper::End = cur_fsm_wrap {
            break;
        }

        let event = get_next_event_for_current_state(&cur_fsm_wrap, ctx);

        cur_fsm_wrap = match cur_fsm_wrap {
            FsmStateWrapper::Start(fsm) => fsm.goto(event, ctx)?,
            FsmStateWrapper::Send(fsm) => fsm.goto(event, ctx)?,

            // end state gets handled above
            FsmStateWrapper::End => unreachable!(),
        };
    }

    let packets_sent = ctx.get_sent_counter();
    let send_failures = ctx.get_failure_counter();
    Ok(TransmitReport {
        packets_sent,
        send_failures,
        // every emitted packet but the priming one carries a bit
        bits: (packets_sent + send_failures).saturating_sub(1),
        elapsed_ms: interval_ms(start_time, ctx.now()),
    })
}

fn get_next_event_for_current_state(
    wrapper: &FsmStateWrapper,
    ctx: &mut impl ProtocolIoContext,
) -> SndEvent {
    match wrapper {
        // init event for priming packet
        FsmStateWrapper::Start(_) => SndEvent::InitPriming,

        // pull next message bit
        FsmStateWrapper::Send(_) => SndEvent::NextBit(ctx.next_bit()),

        FsmStateWrapper::End => {
            unreachable!("Never call Event on end state in snd fsm");
        }
    }
}
