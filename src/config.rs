//! Validated operating parameters.
//!
//! Everything here is checked before a socket is created, so a bad
//! invocation fails without acquiring any network resource.

use std::{
    fs,
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
};

use crate::error::{Error, Result};

pub const DEFAULT_ZERO_DELAY_MS: f64 = 50.0;
pub const DEFAULT_ONE_DELAY_MS: f64 = 150.0;
pub const DEFAULT_THRESHOLD_MS: f64 = 125.0;

fn check_positive(ms: f64) -> Result<f64> {
    if ms.is_finite() && ms > 0.0 {
        Ok(ms)
    } else {
        Err(Error::InvalidDelay(ms))
    }
}

/// Inter-packet delay for a 0 bit and for a 1 bit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delays {
    zero_ms: f64,
    one_ms: f64,
}

impl Delays {
    pub fn new(zero_ms: f64, one_ms: f64) -> Result<Self> {
        let zero_ms = check_positive(zero_ms)?;
        let one_ms = check_positive(one_ms)?;
        if zero_ms >= one_ms {
            return Err(Error::InvertedDelays { zero_ms, one_ms });
        }
        Ok(Self { zero_ms, one_ms })
    }

    pub fn zero_ms(&self) -> f64 {
        self.zero_ms
    }

    pub fn one_ms(&self) -> f64 {
        self.one_ms
    }

    pub fn for_bit(&self, bit: u8) -> f64 {
        match bit {
            0 => self.zero_ms,
            _ => self.one_ms,
        }
    }

    /// Threshold halfway between both delays, ideal for a jitter free link.
    pub fn midpoint(&self) -> f64 {
        (self.zero_ms + self.one_ms) / 2.0
    }
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            zero_ms: DEFAULT_ZERO_DELAY_MS,
            one_ms: DEFAULT_ONE_DELAY_MS,
        }
    }
}

/// Decode threshold: `dt < threshold` is a 0 bit, anything else a 1 bit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(ms: f64) -> Result<Self> {
        if ms.is_finite() && ms > 0.0 {
            Ok(Self(ms))
        } else {
            Err(Error::InvalidThreshold(ms))
        }
    }

    pub fn ms(&self) -> f64 {
        self.0
    }

    pub fn classify(&self, dt_ms: f64) -> u8 {
        if dt_ms < self.0 { 0 } else { 1 }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_MS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeParams {
    delay_ms: f64,
    count: u32,
}

impl ProbeParams {
    pub fn new(delay_ms: f64, count: u32) -> Result<Self> {
        let delay_ms = check_positive(delay_ms)?;
        if count == 0 {
            return Err(Error::InvalidCount(count));
        }
        Ok(Self { delay_ms, count })
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Simulated link impairments for the sending modes, all off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Impairments {
    loss_p: f64,
    error_p: f64,
    dup_p: f64,
}

fn check_probability(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidProbability { name, value })
    }
}

impl Impairments {
    pub fn new(loss_p: f64, error_p: f64, dup_p: f64) -> Result<Self> {
        Ok(Self {
            loss_p: check_probability("loss", loss_p)?,
            error_p: check_probability("error", error_p)?,
            dup_p: check_probability("duplication", dup_p)?,
        })
    }

    pub fn loss_p(&self) -> f64 {
        self.loss_p
    }

    pub fn error_p(&self) -> f64 {
        self.error_p
    }

    pub fn dup_p(&self) -> f64 {
        self.dup_p
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    Literal(String),
    File(PathBuf),
}

impl MessageSource {
    /// Message bytes to encode.
    ///
    /// File content loses exactly one trailing newline.
    pub fn load(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            MessageSource::Literal(text) => text.as_bytes().to_vec(),
            MessageSource::File(path) => {
                let mut bytes = fs::read(path).map_err(|source| Error::MessageFile {
                    path: path.clone(),
                    source,
                })?;
                if bytes.last() == Some(&b'\n') {
                    bytes.pop();
                    if bytes.last() == Some(&b'\r') {
                        bytes.pop();
                    }
                }
                bytes
            }
        };

        if bytes.is_empty() {
            return Err(Error::EmptyMessage);
        }
        Ok(bytes)
    }
}

pub fn resolve_target(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|_| Error::InvalidAddress(host.to_string()))?
        .next()
        .ok_or_else(|| Error::InvalidAddress(host.to_string()))
}
