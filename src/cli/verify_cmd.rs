// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `verify`: check every frame of every segment in a log directory.
//!
//! Unlike the reader this does not stop at the first bad segment, so one
//! run reports the state of the whole directory.

use std::fmt;

use super::{segment_filter, StreamArgs};
use crate::config;
use crate::eventlog::{
    parse_frame, FrameError, FrameParse, LocalSegmentRoot, SegmentFilter, SegmentRoot,
};

/// Outcome of scanning one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentStatus {
    Clean,
    /// The last frame is incomplete. Normal while a writer is active.
    Truncated { offset: u64, trailing: usize },
    Corrupt { offset: u64, error: FrameError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub frames: u64,
    pub status: SegmentStatus,
}

impl fmt::Display for SegmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            SegmentStatus::Clean => write!(f, "ok ({} frames)", self.frames),
            SegmentStatus::Truncated { offset, trailing } => write!(
                f,
                "ok ({} frames, {trailing} trailing bytes at offset {offset})",
                self.frames
            ),
            SegmentStatus::Corrupt { offset, error } => write!(
                f,
                "CORRUPT after {} frames at offset {offset}: {error}",
                self.frames
            ),
        }
    }
}

/// Scan a complete segment image.
pub fn verify_segment(bytes: &[u8], max_frame_len: u64) -> SegmentReport {
    let mut offset = 0usize;
    let mut frames = 0u64;
    loop {
        let rest = &bytes[offset..];
        if rest.is_empty() {
            return SegmentReport {
                frames,
                status: SegmentStatus::Clean,
            };
        }
        match parse_frame(rest, max_frame_len) {
            Ok(FrameParse::Complete { consumed, .. }) => {
                offset += consumed;
                frames += 1;
            }
            Ok(FrameParse::Incomplete) => {
                return SegmentReport {
                    frames,
                    status: SegmentStatus::Truncated {
                        offset: offset as u64,
                        trailing: rest.len(),
                    },
                };
            }
            Err(error) => {
                return SegmentReport {
                    frames,
                    status: SegmentStatus::Corrupt {
                        offset: offset as u64,
                        error,
                    },
                };
            }
        }
    }
}

/// Run the command. Exit code 1 if any segment is corrupt.
pub async fn run_verify(args: &StreamArgs) -> i32 {
    let env = config::load();
    let filter = segment_filter(&env, args.this_host);
    let root = LocalSegmentRoot::new(&args.dir);

    let entries = match root.list().await {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Cannot list {}: {e}", args.dir.display());
            return 1;
        }
    };
    let mut segments: Vec<_> = entries
        .into_iter()
        .filter_map(|path| filter.sequence(&path.name).map(|seq| (seq, path)))
        .collect();
    segments.sort_by(|a, b| (a.0, &a.1.name).cmp(&(b.0, &b.1.name)));

    if segments.is_empty() {
        println!("No event files found in {}", args.dir.display());
        return 0;
    }

    let mut corrupt = 0;
    for (_, path) in &segments {
        let bytes = match tokio::fs::read(root.dir().join(&path.name)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("{path}: read failed: {e}");
                corrupt += 1;
                continue;
            }
        };
        let report = verify_segment(&bytes, env.reader.max_frame_len);
        if matches!(report.status, SegmentStatus::Corrupt { .. }) {
            corrupt += 1;
        }
        println!("{path}: {report}");
    }

    println!(
        "{} segment(s) checked, {corrupt} with errors",
        segments.len()
    );
    if corrupt == 0 {
        0
    } else {
        1
    }
}
