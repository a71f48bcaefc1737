// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults.

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print built-in defaults, ignoring the environment.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Print effective config as one JSON object.
pub fn run_show_json() -> i32 {
    let cfg = config::load().effective_config();
    match serde_json::to_string_pretty(&cfg) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("Failed to serialize configuration: {e}");
            1
        }
    }
}

fn config_lines(cfg: &EffectiveConfig) -> Vec<String> {
    vec![
        format!("RUNSTREAM_QUEUE_CAPACITY={}", cfg.queue_capacity),
        format!("RUNSTREAM_DELIVERY_CAPACITY={}", cfg.delivery_capacity),
        format!("RUNSTREAM_MAX_FRAME_LEN={}", cfg.max_frame_len),
        format!("RUNSTREAM_POLL_INTERVAL_MS={}", cfg.poll_interval_ms),
        format!("RUNSTREAM_LOG_LEVEL={}", cfg.log_level),
        format!("RUNSTREAM_LOG_FORMAT={}", cfg.log_format),
        format!("RUNSTREAM_START_TIME={}", cfg.start_time_sec),
        format!(
            "RUNSTREAM_HOSTNAME={}",
            cfg.hostname.as_deref().unwrap_or("")
        ),
    ]
}

fn print_config(cfg: &EffectiveConfig) {
    for line in config_lines(cfg) {
        println!("{line}");
    }
}
