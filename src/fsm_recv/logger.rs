use std::io::Write;

use tracing::{debug, info};

use super::fsm::{PacketSource, RcvEvent};
use crate::calib::CalibrationLog;
use crate::error::Result;
use crate::meter::IntervalMeter;

/// Progress is reported every this many logged packets.
pub const LOG_PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub packets_logged: u64,
    pub malformed: u64,
}

/// Record the inter-arrival time of every packet until stopped.
///
/// The first packet anchors the log with `0.0`. Packet type does not
/// matter, data and probe packets are logged alike.
pub fn run_log_loop<W: Write>(
    src: &mut impl PacketSource,
    log: &mut CalibrationLog<W>,
) -> Result<LogSummary> {
    let mut meter = IntervalMeter::new();
    let mut summary = LogSummary::default();

    while !src.is_stopped() {
        let (rcvpkt, at) = match src.wait_for_pkt()? {
            RcvEvent::RecvPck(Some(rcvpkt), at) => (rcvpkt, at),
            RcvEvent::RecvPck(None, _) => {
                debug!("ignoring malformed datagram");
                summary.malformed += 1;
                continue;
            }
            RcvEvent::Idle => continue,
        };

        match meter.mark(at) {
            None => {
                info!(
                    seq_n = rcvpkt.seq_n(),
                    kind = ?rcvpkt.kind(),
                    "first packet received"
                );
                log.record_anchor()?;
            }
            Some(iat_ms) => {
                log.record(iat_ms)?;
                if summary.packets_logged % LOG_PROGRESS_EVERY == 0 {
                    info!(
                        seq_n = rcvpkt.seq_n(),
                        total = summary.packets_logged + 1,
                        "logged packet, interval {iat_ms:.1} ms"
                    );
                }
            }
        }
        summary.packets_logged += 1;
    }

    log.flush()?;
    Ok(summary)
}
