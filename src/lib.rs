//! # Timing Channel - bits hidden in the gaps between packets
//!
//! A sender emits empty UDP datagrams and waits one of two delays before
//! each of them: the short one for a 0 bit, the long one for a 1 bit. The
//! receiver measures inter-arrival times and compares them to a threshold.
//!
//! ```text
//!
//!   seq   0        1              2        3        4      ...
//!         |--50ms--|-----150ms----|--50ms--|--50ms--|
//!   bit            0              1        0        0
//!
//! ```
//!
//! Probe and logging modes measure how a path distorts these gaps, so the
//! delay pair and threshold can be chosen for a given link.

pub mod calib;
pub mod config;
pub mod error;
pub mod fsm_recv;
pub mod fsm_send;
pub mod logging;
pub mod meter;
pub mod pck;
pub mod sock;

pub use error::{Error, Result};
