use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod listen;
pub mod send;
pub mod simulate;
pub mod target;
pub mod version;

use target::Target;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one or more messages to a board.
    Send(SendArgs),
    /// Print every message that arrives on a port or serial line.
    Listen(ListenArgs),
    /// Query a board's identity and network settings.
    Info(InfoArgs),
    /// Run a simulated board on UDP.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Board to talk to: udp:HOST:PORT, tcp:HOST:PORT or serial:PATH[@BAUD].
    pub target: Target,
    /// Commands such as '/motor/1/speed 512'. Several are sent as one bundle.
    #[arg(required = true, num_args = 1..)]
    pub commands: Vec<String>,
    /// Wait for replies and print them.
    #[arg(long)]
    pub wait: bool,
    /// How long to wait for replies when --wait is set (e.g. 2s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Where to listen: udp:BIND_ADDR:PORT, tcp:BIND_ADDR:PORT or serial:PATH[@BAUD].
    pub target: Target,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Board to query: udp:HOST:PORT, tcp:HOST:PORT or serial:PATH[@BAUD].
    pub target: Target,
    /// How long to wait for both info replies (e.g. 5s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// UDP port to listen on.
    #[arg(long, default_value_t = oscwire_transport::DEFAULT_DEVICE_PORT)]
    pub port: u16,
    /// Local address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: std::net::IpAddr,
    /// Send replies to this port on the sender's host instead of its source port.
    #[arg(long)]
    pub reply_port: Option<u16>,
    /// Device name reported in info replies.
    #[arg(long, default_value = "oscwire-sim")]
    pub name: String,
    /// Serial number reported in info replies.
    #[arg(long, default_value_t = 1)]
    pub serial: i32,
    /// Answer undecodable packets with an error reply to /error.
    #[arg(long)]
    pub reply_decode_errors: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
