use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use timing_channel::{
    config::{
        DEFAULT_ONE_DELAY_MS, DEFAULT_ZERO_DELAY_MS, Delays, Impairments, MessageSource,
        ProbeParams, resolve_target,
    },
    logging::{init_logging, level_from_verbosity},
    sock::{DEFAULT_PORT, TimingSocket},
};
use tracing::info;

/// Sends a message hidden in inter-packet delays, or a probe train to
/// measure a link.
///
///   Invalid arguments are rejected before any socket is opened
fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_deref(), level_from_verbosity(cli.verbose))?;

    match cli.command {
        Command::Message(args) => run_message(args),
        Command::Probe(args) => run_probe(args),
    }
}

fn run_message(args: MessageArgs) -> Result<()> {
    let delays = Delays::new(args.zero_delay, args.one_delay)?;
    let source = match (args.text, args.file) {
        (_, Some(path)) => MessageSource::File(path),
        (Some(text), None) => MessageSource::Literal(text),
        (None, None) => anyhow::bail!("either a message or --file is required"),
    };
    let msg = source.load()?;
    let recv_addr = resolve_target(&args.target.ip, args.target.port)?;
    let impairments = args.impair.validate()?;

    info!(
        "using delays: {} ms (0-bit), {} ms (1-bit)",
        delays.zero_ms(),
        delays.one_ms()
    );
    info!(
        len = msg.len(),
        bits = msg.len() * 8,
        "message: \"{}\"",
        String::from_utf8_lossy(&msg)
    );

    let mut sock = TimingSocket::bind_any().context("Unable to create socket")?;
    sock.set_unreliable_transmit_parameters(impairments);

    let report = sock.send_message_blocking(msg, recv_addr, delays)?;
    sock.close_socket();

    println!(
        "Sent {} bits in {} packets to {recv_addr} in {:.1} ms ({} failed sends)",
        report.bits, report.packets_sent, report.elapsed_ms, report.send_failures
    );
    Ok(())
}

fn run_probe(args: ProbeArgs) -> Result<()> {
    let params = ProbeParams::new(args.delay, args.count)?;
    let recv_addr = resolve_target(&args.target.ip, args.target.port)?;
    let impairments = args.impair.validate()?;

    info!(
        target = %recv_addr,
        delay_ms = params.delay_ms(),
        count = params.count(),
        "starting probe transmission"
    );

    let mut sock = TimingSocket::bind_any().context("Unable to create socket")?;
    sock.set_unreliable_transmit_parameters(impairments);

    let report = sock.send_probe_blocking(recv_addr, params)?;
    sock.close_socket();

    println!("Total packets sent: {}", report.packets_sent);
    println!("Total duration: {:.1} seconds", report.elapsed_ms / 1000.0);
    println!("Average rate: {:.1} packets/second", report.rate_pps());
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
    /// Encode a message in the delays between packets
    Message(MessageArgs),
    /// Send a fixed train of probe packets at one nominal interval
    Probe(ProbeArgs),
}

#[derive(Args, Debug, Clone)]
struct Target {
    ip: String,
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[derive(Args, Debug, Clone)]
struct MessageArgs {
    #[command(flatten)]
    target: Target,
    /// message text
    #[arg(short, long, conflicts_with = "file")]
    text: Option<String>,
    /// read the message from a file
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// delay before a 0 bit in ms
    #[arg(short, long, default_value_t = DEFAULT_ZERO_DELAY_MS)]
    zero_delay: f64,
    /// delay before a 1 bit in ms
    #[arg(short, long, default_value_t = DEFAULT_ONE_DELAY_MS)]
    one_delay: f64,
    #[command(flatten)]
    impair: ImpairArgs,
}

#[derive(Args, Debug, Clone)]
struct ProbeArgs {
    #[command(flatten)]
    target: Target,
    /// nominal delay between probes in ms
    #[arg(short, long)]
    delay: f64,
    /// number of probe packets
    #[arg(short, long)]
    count: u32,
    #[command(flatten)]
    impair: ImpairArgs,
}

/// Simulated link impairments, probabilities in 0.0..=1.0
#[derive(Args, Debug, Clone)]
struct ImpairArgs {
    /// drop a packet instead of sending it
    #[arg(long, default_value_t = 0.0)]
    loss_p: f64,
    /// flip one bit of a packet
    #[arg(long, default_value_t = 0.0)]
    error_p: f64,
    /// send a packet twice
    #[arg(long, default_value_t = 0.0)]
    dup_p: f64,
}

impl ImpairArgs {
    fn validate(&self) -> timing_channel::Result<Impairments> {
        Impairments::new(self.loss_p, self.error_p, self.dup_p)
    }
}
