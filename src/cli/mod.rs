// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for inspecting and importing run event logs.
//!
//! ## Usage
//!
//! ```bash
//! runstream-cli tail ./logs --follow     # Print events as JSON lines
//! runstream-cli verify ./logs            # Check every frame checksum
//! runstream-cli import ./logs            # Print the chunks an import produces
//! runstream-cli config show              # Print effective configuration
//! ```

pub mod config_cmd;
pub mod import_cmd;
pub mod tail_cmd;
pub mod verify_cmd;

use std::path::PathBuf;

use crate::config::EnvConfig;
use crate::eventlog::TfEventsFilter;

pub use import_cmd::run_import;
pub use tail_cmd::run_tail;
pub use verify_cmd::run_verify;

/// Exit code for bad arguments, as opposed to a failed run.
pub const EXIT_USAGE: i32 = 2;

/// Options shared by the commands that read an event log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamArgs {
    pub dir: PathBuf,
    /// Keep waiting for new data instead of stopping at the end of the log.
    pub follow: bool,
    /// Only read files written by this machine.
    pub this_host: bool,
}

/// Parse `<dir> [--follow] [--this-host]`.
pub fn parse_stream_args(args: &[String]) -> Result<StreamArgs, String> {
    let mut dir = None;
    let mut follow = false;
    let mut this_host = false;
    for arg in args {
        match arg.as_str() {
            "--follow" | "-f" => follow = true,
            "--this-host" => this_host = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            path if dir.is_none() => dir = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument: {extra}")),
        }
    }
    let dir = dir.ok_or_else(|| "missing log directory".to_string())?;
    Ok(StreamArgs {
        dir,
        follow,
        this_host,
    })
}

/// Segment filter from configuration, optionally pinned to this machine.
///
/// An explicit `RUNSTREAM_HOSTNAME` wins over `--this-host`.
pub fn segment_filter(config: &EnvConfig, this_host: bool) -> TfEventsFilter {
    let mut filter = config.filter.clone();
    if this_host && filter.hostname.is_none() {
        match hostname::get() {
            Ok(name) => filter.hostname = Some(name.to_string_lossy().into_owned()),
            Err(e) => tracing::warn!(error = %e, "cli: cannot determine hostname, reading all hosts"),
        }
    }
    filter
}
