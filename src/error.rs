//! Error taxonomy shared by every mode.
//!
//! Configuration errors are raised before any socket exists. Transport
//! errors wrap `std::io::Error`. Per-packet send failures are not errors at
//! this level: the pipelines log and count them.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A delay was zero, negative or not a number.
    #[error("invalid delay {0} ms: delays must be positive")]
    InvalidDelay(f64),

    /// The zero delay is not strictly shorter than the one delay.
    #[error("invalid delays: zero delay {zero_ms} ms must be shorter than one delay {one_ms} ms")]
    InvertedDelays { zero_ms: f64, one_ms: f64 },

    /// Probe packet count below one.
    #[error("invalid packet count {0}: must be positive")]
    InvalidCount(u32),

    /// Impairment probability outside `0.0..=1.0` or not a number.
    #[error("invalid {name} probability {value}: must be within 0.0 and 1.0")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("invalid threshold {0} ms: must be positive")]
    InvalidThreshold(f64),

    #[error("message is empty")]
    EmptyMessage,

    #[error("cannot read message file {}: {source}", path.display())]
    MessageFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// Datagram that is not a 5 byte covert packet.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("malformed calibration log line {line}: '{content}'")]
    MalformedLog { line: usize, content: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
