use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use gattpipe_frame::ATT_WRITE_OVERHEAD;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod chunk;
pub mod loopback;
pub mod version;

/// ATT MTU every BLE link supports before negotiation.
const MIN_ATT_MTU: &str = "23";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how a payload is framed and split into link-sized fragments.
    Chunk(ChunkArgs),
    /// Run request/response exchanges over an in-memory link with an echo peer.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Chunk(args) => chunk::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["file", "size"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "size"])]
    pub file: Option<PathBuf>,
    /// Generate a payload of N bytes.
    #[arg(long, value_name = "N", conflicts_with_all = ["data", "file"])]
    pub size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Per-operation budget reported by the link (ATT MTU).
    #[arg(long, env = "GATTPIPE_MTU", default_value = MIN_ATT_MTU)]
    pub mtu: usize,
    /// Fixed per-write overhead subtracted from the MTU.
    #[arg(long, env = "GATTPIPE_WRITE_OVERHEAD", default_value_t = ATT_WRITE_OVERHEAD)]
    pub overhead: usize,
}

#[derive(Args, Debug)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ReplyMode {
    /// Send the request back unchanged.
    Echo,
    /// ASCII-uppercase the request.
    Upper,
    /// Reverse the request bytes.
    Reverse,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    #[command(flatten)]
    pub link: LinkArgs,
    /// Number of request/response exchanges.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
    /// How the far end answers.
    #[arg(long, value_enum, default_value = "echo")]
    pub reply: ReplyMode,
    /// Maximum time to wait for each response (e.g. 5s, 500ms).
    #[arg(long, env = "GATTPIPE_TIMEOUT", default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn resolve_payload(args: &PayloadArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if let Some(size) = args.size {
        return Ok((0..size).map(|i| (i % 256) as u8).collect());
    }
    Ok(Vec::new())
}

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
