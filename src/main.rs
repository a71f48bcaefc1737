//! runstream-cli entry point.
//!
//! ## CLI Subcommands
//!
//! - `runstream-cli tail <dir>` - Print decoded events as JSON lines
//! - `runstream-cli verify <dir>` - Check every frame in a log directory
//! - `runstream-cli import <dir>` - Print the chunks an import produces
//! - `runstream-cli config show|defaults` - Print configuration

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use runstream_core::cli::{self, config_cmd, parse_stream_args, EXIT_USAGE};
use runstream_core::config;
use runstream_core::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "tail" | "verify" | "import" => {
            let stream_args = match parse_stream_args(&args[2..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("{command}: {e}");
                    print_command_help(command);
                    return ExitCode::from(EXIT_USAGE as u8);
                }
            };
            init_observability();
            let cancel = cancel_on_ctrl_c();
            let code = match command {
                "tail" => cli::run_tail(&stream_args, cancel).await,
                "import" => cli::run_import(&stream_args, cancel).await,
                _ => cli::run_verify(&stream_args).await,
            };
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    if args.get(3).map(|s| s.as_str()) == Some("--json") {
                        ExitCode::from(config_cmd::run_show_json() as u8)
                    } else {
                        config_cmd::run_show();
                        ExitCode::SUCCESS
                    }
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("runstream-cli {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_observability() {
    let env = config::load();
    if let Err(e) = telemetry::init_logging(&env.log) {
        eprintln!("Logging disabled: {e}");
    }
    telemetry::init_metrics();
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cli: interrupt received, stopping");
            token.cancel();
        }
    });
    cancel
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "runstream-cli - Run telemetry event log tools v{}

USAGE:
    runstream-cli <COMMAND> [OPTIONS]

COMMANDS:
    tail         Print decoded events from a log directory as JSON lines
    verify       Check every frame checksum in a log directory
    import       Convert events to history chunks and print them
    config       Show configuration (show, defaults)
    version      Show version information
    help         Show this help message

EXAMPLES:
    runstream-cli tail ./tb-logs --follow
    runstream-cli verify ./tb-logs
    runstream-cli import ./tb-logs --this-host
    runstream-cli config show --json

ENVIRONMENT:
    RUNSTREAM_LOG_LEVEL     Log filter (default: info)
    RUNSTREAM_LOG_FORMAT    json or pretty (default: json)
    RUNSTREAM_START_TIME    Ignore event files older than this epoch second
    RUNSTREAM_HOSTNAME      Only read event files written by this host
    See `runstream-cli config defaults` for the full list.

EXIT CODES:
    0  Success
    1  Failure (corrupt log, I/O error, fatal multiplexer error)
    2  Usage error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "tail" => {
            eprintln!(
                "runstream-cli tail - Print events

USAGE:
    runstream-cli tail <DIR> [--follow] [--this-host]

OPTIONS:
    -f, --follow   Keep waiting for new events until Ctrl-C
    --this-host    Only read event files written by this machine

DESCRIPTION:
    Reads every event file in DIR in sequence order and prints one JSON
    object per event. Without --follow, stops once no new data is available.
"
            );
        }
        "verify" => {
            eprintln!(
                "runstream-cli verify - Check event files

USAGE:
    runstream-cli verify <DIR> [--this-host]

DESCRIPTION:
    Parses every frame of every event file and reports the first corrupt
    frame in each. A partly written final frame is reported but is not an
    error.

EXIT CODES:
    0  No corruption found
    1  At least one file is corrupt or unreadable
"
            );
        }
        "import" => {
            eprintln!(
                "runstream-cli import - Import events as history

USAGE:
    runstream-cli import <DIR> [--follow] [--this-host]

DESCRIPTION:
    Runs the events in DIR through the telemetry multiplexer and prints
    each resulting chunk as JSON.
"
            );
        }
        "config" => {
            eprintln!(
                "runstream-cli config - Show configuration

USAGE:
    runstream-cli config show [--json]
    runstream-cli config defaults
"
            );
        }
        _ => {
            eprintln!("No detailed help for '{}'", command);
            print_usage();
        }
    }
}
