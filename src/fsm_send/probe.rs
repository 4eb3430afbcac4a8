use tracing::info;

use super::ProbeReport;
use super::fsm::{ProtocolIoContext, make_pkt, send_or_log};
use crate::config::ProbeParams;
use crate::meter::{IntervalMeter, interval_ms};
use crate::pck::PacketType;

/// Progress is reported every this many packets.
pub const PROBE_PROGRESS_EVERY: u32 = 500;

/// Send a train of `count` probe packets at a nominal interval.
///
/// The first packet goes out immediately, every further one after a sleep
/// of `delay_ms`. Progress reporting only observes the send times and never
/// feeds back into the sleep.
pub fn run_probe_loop(ctx: &mut impl ProtocolIoContext, params: ProbeParams) -> ProbeReport {
    let start_time = ctx.now();
    let mut meter = IntervalMeter::new();

    send_or_log(ctx, &make_pkt(0, PacketType::Probe));
    meter.mark(ctx.now());

    for seq_n in 1..params.count() {
        ctx.sleep_ms(params.delay_ms());

        let actual_ms = meter.mark(ctx.now()).unwrap_or_default();
        let sent = send_or_log(ctx, &make_pkt(seq_n, PacketType::Probe));

        if sent && seq_n % PROBE_PROGRESS_EVERY == 0 {
            info!(
                seq_n,
                total = ctx.get_sent_counter(),
                target_ms = params.delay_ms(),
                "sent probe, actual interval {actual_ms:.1} ms"
            );
        }
    }

    ProbeReport {
        packets_sent: ctx.get_sent_counter(),
        send_failures: ctx.get_failure_counter(),
        elapsed_ms: interval_ms(start_time, ctx.now()),
    }
}
