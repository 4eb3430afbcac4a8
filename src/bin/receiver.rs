use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use timing_channel::{
    calib::{self, CalibrationLog, Summary},
    config::{DEFAULT_THRESHOLD_MS, Threshold},
    fsm_recv::SESSION_TIMEOUT_MS,
    logging::{init_logging, level_from_verbosity},
    sock::{DEFAULT_PORT, StopHandle, TimingSocket},
};
use tracing::info;

const GAPS_SHOWN: usize = 5;

/// Receives timing channel traffic: decodes messages, logs inter-arrival
/// times for calibration, or summarizes such a log.
///
///   Decode and log modes run until Ctrl+C, then report what they saw
fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_deref(), level_from_verbosity(cli.verbose))?;

    match cli.command {
        Command::Decode(args) => run_decode(args),
        Command::Log(args) => run_log(args),
        Command::Analyze(args) => run_analyze(args),
    }
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let threshold = Threshold::new(args.threshold)?;
    if !(args.session_timeout.is_finite() && args.session_timeout > 0.0) {
        anyhow::bail!("invalid session timeout {} ms: must be positive", args.session_timeout);
    }

    let mut sock = TimingSocket::bind_port(args.port)
        .with_context(|| format!("Bind failed on port {}", args.port))?;
    sock.set_session_timeout_ms(args.session_timeout);

    info!(port = args.port, threshold_ms = threshold.ms(), "receiver waiting for packets");

    let stop = StopHandle::new();
    stop.stop_on_ctrl_c().context("Cannot install Ctrl+C handler")?;

    let summary = sock.recv_decode_blocking(threshold, &stop, |msg| {
        println!("{}", msg.text());
    })?;
    sock.close_socket();

    if let Some(text) = summary.pending_text() {
        println!("{text}");
        info!(chars = summary.pending.len(), "last message was still open at shutdown");
    }
    info!(
        packets = summary.packets_received,
        malformed = summary.malformed,
        "decoding stopped"
    );
    Ok(())
}

fn run_log(args: LogArgs) -> Result<()> {
    let mut log = CalibrationLog::create(&args.output)
        .with_context(|| format!("Cannot open log file {:?}", args.output))?;
    let mut sock = TimingSocket::bind_port(args.port)
        .with_context(|| format!("Bind failed on port {}", args.port))?;

    info!(port = args.port, output = ?args.output, "logging receiver waiting for packets");

    let stop = StopHandle::new();
    stop.stop_on_ctrl_c().context("Cannot install Ctrl+C handler")?;

    let summary = sock.recv_log_blocking(&mut log, &stop)?;
    sock.close_socket();
    log.close_file()?;

    info!(
        packets = summary.packets_logged,
        malformed = summary.malformed,
        output = ?args.output,
        "logging stopped"
    );
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let samples = calib::read_samples(&args.log)
        .with_context(|| format!("Cannot read log file {:?}", args.log))?;
    let Some(summary) = Summary::from_samples(&samples) else {
        anyhow::bail!("log {:?} holds no samples", args.log);
    };

    println!("Samples: {}", summary.count);
    println!("Min:  {:.3} ms", summary.min);
    println!("Max:  {:.3} ms", summary.max);
    println!("Mean: {:.3} ms", summary.mean);
    println!("Std:  {:.3} ms", summary.std_dev);
    for (p, value) in &summary.percentiles {
        println!("P{p:<3} {value:.3} ms");
    }

    println!("Largest gaps:");
    for gap in calib::largest_gaps(&samples, GAPS_SHOWN) {
        println!(
            "  {:.3} ms between {:.3} and {:.3} ({:.1}% below)",
            gap.width, gap.low, gap.high, gap.below_pct
        );
    }

    if let Some(threshold_ms) = args.threshold {
        let threshold = Threshold::new(threshold_ms)?;
        let (low, high) = calib::split_at(&samples, threshold.ms());
        println!("< {threshold_ms} ms: {low} (bit 0)");
        println!(">= {threshold_ms} ms: {high} (bit 1)");

        let decoded = calib::offline_decode(&samples, threshold.ms());
        println!("Bits: {}", decoded.bits);
        println!("Text: {}", decoded.text);
    }
    Ok(())
}

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// write diagnostics to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Decode messages from inter-arrival times
    Decode(DecodeArgs),
    /// Record every inter-arrival time to a calibration log
    Log(LogArgs),
    /// Summarize a calibration log
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Clone)]
struct DecodeArgs {
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
    /// intervals below this are 0 bits, in ms
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD_MS)]
    threshold: f64,
    /// gap that ends a message, in ms
    #[arg(long, default_value_t = SESSION_TIMEOUT_MS)]
    session_timeout: f64,
}

#[derive(Args, Debug, Clone)]
struct LogArgs {
    port: u16,
    output: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct AnalyzeArgs {
    log: PathBuf,
    /// split and decode the samples at this threshold, in ms
    #[arg(short, long)]
    threshold: Option<f64>,
}
