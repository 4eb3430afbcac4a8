//! Calibration log: the raw inter-arrival samples written in logging mode,
//! and helpers to summarize such a log offline.
//!
//! # Format:
//!
//! ```text
//! Time
//! 0.0
//! 20.112
//! 19.874
//! ...
//! ```
//!
//! One interval in milliseconds per line, three decimals. The first data
//! line is always `0.0` and anchors the train.
//!
//! The summary helpers only describe the samples. Choosing a threshold and a
//! delay pair from them is left to the operator.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::error::{Error, Result};

pub const LOG_HEADER: &str = "Time";
/// The log is flushed every this many samples.
pub const FLUSH_EVERY: u64 = 100;

pub struct CalibrationLog<W: Write> {
    out: W,
    samples: u64,
}

impl CalibrationLog<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        CalibrationLog::new(BufWriter::new(file))
    }
}

impl<W: Write> CalibrationLog<W> {
    /// Writes the header line right away.
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{LOG_HEADER}")?;
        out.flush()?;
        Ok(Self { out, samples: 0 })
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// `0.0` line for the first packet of a train.
    pub fn record_anchor(&mut self) -> Result<()> {
        writeln!(self.out, "0.0")?;
        self.after_record()
    }

    pub fn record(&mut self, iat_ms: f64) -> Result<()> {
        writeln!(self.out, "{iat_ms:.3}")?;
        self.after_record()
    }

    fn after_record(&mut self) -> Result<()> {
        self.samples += 1;
        if self.samples % FLUSH_EVERY == 0 {
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    /// Flush and release the underlying file.
    pub fn close_file(self) -> Result<()> {
        self.into_inner().map(drop)
    }
}

/// Parse a log, skipping the header and blank lines.
pub fn parse_samples<R: BufRead>(reader: R) -> Result<Vec<f64>> {
    let mut samples = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.trim();
        if content.is_empty() || (i == 0 && content == LOG_HEADER) {
            continue;
        }
        let value = content.parse::<f64>().map_err(|_| Error::MalformedLog {
            line: i + 1,
            content: content.to_string(),
        })?;
        samples.push(value);
    }
    Ok(samples)
}

pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    parse_samples(BufReader::new(file))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// population standard deviation
    pub std_dev: f64,
    /// (percent, value) for 10/25/50/75/90
    pub percentiles: Vec<(u8, f64)>,
}

impl Summary {
    pub const PERCENTS: [u8; 5] = [10, 25, 50, 75, 90];

    /// `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let percentiles = Self::PERCENTS
            .iter()
            .map(|&p| {
                let idx = (n * usize::from(p) / 100).min(n - 1);
                (p, sorted[idx])
            })
            .collect();

        Some(Self {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            std_dev: variance.sqrt(),
            percentiles,
        })
    }
}

/// Count of samples below `threshold_ms` and at or above it.
pub fn split_at(samples: &[f64], threshold_ms: f64) -> (usize, usize) {
    let below = samples.iter().filter(|&&x| x < threshold_ms).count();
    (below, samples.len() - below)
}

/// Space between two neighbouring values of the sorted samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub width: f64,
    pub low: f64,
    pub high: f64,
    /// share of the samples at or below `low`, in percent
    pub below_pct: f64,
}

/// The `n` widest gaps between sorted samples, widest first.
///
/// A bimodal log shows one gap far wider than the rest, between the 0 bit
/// and the 1 bit clusters.
pub fn largest_gaps(samples: &[f64], n: usize) -> Vec<Gap> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let total = sorted.len() as f64;
    let mut gaps: Vec<Gap> = sorted
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Gap {
            width: pair[1] - pair[0],
            low: pair[0],
            high: pair[1],
            below_pct: (i + 1) as f64 / total * 100.0,
        })
        .collect();

    gaps.sort_by(|a, b| b.width.total_cmp(&a.width));
    gaps.truncate(n);
    gaps
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineDecode {
    /// one `'0'`/`'1'` per sample
    pub bits: String,
    /// printable ASCII as is, any other byte as `?`
    pub text: String,
}

/// Decode a logged train with the decoder's bit rule.
///
/// The leading anchor sample carries no bit and is skipped. A trailing
/// partial byte is discarded.
pub fn offline_decode(samples: &[f64], threshold_ms: f64) -> OfflineDecode {
    let bits: String = samples
        .iter()
        .skip(1)
        .map(|&x| if x < threshold_ms { '0' } else { '1' })
        .collect();

    let text = bits
        .as_bytes()
        .chunks_exact(8)
        .map(|chunk| {
            let byte = chunk.iter().fold(0u8, |acc, b| (acc << 1) | (b - b'0'));
            if (32..=126).contains(&byte) {
                char::from(byte)
            } else {
                '?'
            }
        })
        .collect();

    OfflineDecode { bits, text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_anchor_and_three_decimals() {
        let mut log = CalibrationLog::new(Vec::new()).unwrap();
        log.record_anchor().unwrap();
        log.record(20.11249).unwrap();
        log.record(5.0).unwrap();
        assert_eq!(log.samples(), 3);

        let out = String::from_utf8(log.into_inner().unwrap()).unwrap();
        assert_eq!(out, "Time\n0.0\n20.112\n5.000\n");
    }

    #[test]
    fn parse_skips_header_and_blanks() {
        let input = "Time\n0.0\n\n19.5\n20.25\n";
        let samples = parse_samples(input.as_bytes()).unwrap();
        assert_eq!(samples, vec![0.0, 19.5, 20.25]);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_samples("Time\n0.0\nabc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedLog { line: 3, .. }));
    }

    #[test]
    fn log_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jitter_log.csv");

        let mut log = CalibrationLog::create(&path).unwrap();
        log.record_anchor().unwrap();
        log.record(12.5).unwrap();
        log.close_file().unwrap();

        assert_eq!(read_samples(&path).unwrap(), vec![0.0, 12.5]);
    }

    #[test]
    fn summary_statistics() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = Summary::from_samples(&samples).unwrap();
        assert_eq!(s.count, 8);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(s.percentiles[2], (50, 5.0));
        assert_eq!(s.percentiles[4], (90, 9.0));
        assert!(Summary::from_samples(&[]).is_none());
    }

    #[test]
    fn split_counts_threshold_as_high() {
        assert_eq!(split_at(&[10.0, 99.9, 100.0, 150.0], 100.0), (2, 2));
    }

    #[test]
    fn widest_gap_separates_clusters() {
        let samples = [151.0, 49.0, 0.0, 50.5, 149.0, 52.0, 150.0, 48.0];
        let gaps = largest_gaps(&samples, 2);

        assert_eq!(gaps.len(), 2);
        assert_eq!((gaps[0].low, gaps[0].high), (52.0, 149.0));
        assert_eq!(gaps[0].width, 97.0);
        assert_eq!(gaps[0].below_pct, 62.5);
        assert_eq!((gaps[1].low, gaps[1].high), (0.0, 48.0));

        assert!(largest_gaps(&[1.0], 5).is_empty());
        assert_eq!(largest_gaps(&samples, 100).len(), 7);
    }

    #[test]
    fn offline_decode_skips_anchor() {
        // anchor, then 'H' = 01001000 and a stray partial bit
        let mut samples = vec![0.0];
        for bit in [0, 1, 0, 0, 1, 0, 0, 0] {
            samples.push(if bit == 0 { 50.0 } else { 150.0 });
        }
        samples.push(150.0);

        let d = offline_decode(&samples, 100.0);
        assert_eq!(d.bits, "010010001");
        assert_eq!(d.text, "H");
    }

    #[test]
    fn offline_decode_masks_unprintable() {
        let mut samples = vec![0.0];
        samples.extend([50.0; 8]);
        assert_eq!(offline_decode(&samples, 100.0).text, "?");
    }
}
