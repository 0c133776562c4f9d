mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "gattpipe",
    version,
    about = "Chunked byte pipe over MTU-constrained links"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). GATTPIPE_LOG overrides this.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chunk_subcommand() {
        let cli = Cli::try_parse_from(["gattpipe", "chunk", "--size", "50", "--mtu", "23"])
            .expect("chunk args should parse");

        match cli.command {
            Command::Chunk(args) => {
                assert_eq!(args.payload.size, Some(50));
                assert_eq!(args.link.mtu, 23);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "gattpipe", "loopback", "--data", "hello", "--size", "10",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_loopback_subcommand() {
        let cli = Cli::try_parse_from([
            "gattpipe", "loopback", "--data", "ping", "--count", "3", "--reply", "upper",
        ])
        .expect("loopback args should parse");
        assert!(matches!(cli.command, Command::Loopback(args) if args.count == 3));
    }
}
