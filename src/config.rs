//! Runtime configuration loading from environment variables.
//!
//! All values come from `RUNSTREAM_*` environment variables. Missing or
//! invalid values fall back to defaults without failing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `RUNSTREAM_QUEUE_CAPACITY` | 256 | Records buffered ahead of the multiplexer worker |
//! | `RUNSTREAM_DELIVERY_CAPACITY` | 256 | Chunks buffered ahead of the transport |
//! | `RUNSTREAM_MAX_FRAME_LEN` | 67108864 | Largest event payload accepted (bytes, 1 KiB..1 GiB) |
//! | `RUNSTREAM_POLL_INTERVAL_MS` | 500 | Importer wait when the log has no new data |
//! | `RUNSTREAM_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `RUNSTREAM_LOG_FORMAT` | json | `json` or `pretty` |
//! | `RUNSTREAM_START_TIME` | 0 | Ignore event files older than this (epoch secs) |
//! | `RUNSTREAM_HOSTNAME` | unset | Only read event files written by this host |

use std::time::Duration;

use serde::Serialize;

use crate::eventlog::{ReaderConfig, TfEventsFilter};
use crate::filestream::MuxConfig;
use crate::telemetry::{LogConfig, LogFormat};

const MIN_FRAME_LEN: u64 = 1024;
const MAX_FRAME_LEN: u64 = 1024 * 1024 * 1024;
const MIN_POLL_MS: u64 = 10;
const MAX_POLL_MS: u64 = 60_000;

/// Flat summary of the effective values, printed by `config show`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub queue_capacity: usize,
    pub delivery_capacity: usize,
    pub max_frame_len: u64,
    pub poll_interval_ms: u64,
    pub log_level: String,
    pub log_format: &'static str,
    pub start_time_sec: u64,
    pub hostname: Option<String>,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub mux: MuxConfig,
    pub delivery_capacity: usize,
    pub reader: ReaderConfig,
    pub filter: TfEventsFilter,
    pub poll_interval: Duration,
    pub log: LogConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            mux: MuxConfig::default(),
            delivery_capacity: 256,
            reader: ReaderConfig::default(),
            filter: TfEventsFilter::default(),
            poll_interval: Duration::from_millis(500),
            log: LogConfig::default(),
        }
    }
}

fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_reader_config() -> ReaderConfig {
    let defaults = ReaderConfig::default();
    let max_frame_len = parse_u64("RUNSTREAM_MAX_FRAME_LEN", defaults.max_frame_len);
    ReaderConfig {
        max_frame_len: max_frame_len.clamp(MIN_FRAME_LEN, MAX_FRAME_LEN),
        ..defaults
    }
}

fn load_log_config() -> LogConfig {
    let level = non_empty("RUNSTREAM_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    let format = non_empty("RUNSTREAM_LOG_FORMAT")
        .and_then(|f| f.parse::<LogFormat>().ok())
        .unwrap_or_default();
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

fn load_filter() -> TfEventsFilter {
    TfEventsFilter {
        start_time_sec: parse_u64("RUNSTREAM_START_TIME", 0),
        hostname: non_empty("RUNSTREAM_HOSTNAME"),
    }
}

/// Load all configuration from environment variables.
pub fn load() -> EnvConfig {
    let queue_capacity = parse_usize("RUNSTREAM_QUEUE_CAPACITY", 256).max(1);
    let delivery_capacity = parse_usize("RUNSTREAM_DELIVERY_CAPACITY", 256).max(1);
    let poll_ms = parse_u64("RUNSTREAM_POLL_INTERVAL_MS", 500).clamp(MIN_POLL_MS, MAX_POLL_MS);

    EnvConfig {
        mux: MuxConfig { queue_capacity },
        delivery_capacity,
        reader: load_reader_config(),
        filter: load_filter(),
        poll_interval: Duration::from_millis(poll_ms),
        log: load_log_config(),
    }
}

impl EnvConfig {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            queue_capacity: self.mux.queue_capacity,
            delivery_capacity: self.delivery_capacity,
            max_frame_len: self.reader.max_frame_len,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str(),
            start_time_sec: self.filter.start_time_sec,
            hostname: self.filter.hostname.clone(),
        }
    }
}
