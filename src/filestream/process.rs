//! Message to chunk transformation.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::chunk::{Chunk, ChunkType, ControlFields};
use super::error::FatalError;
use super::message::{
    finite_number, FilesUploaded, JsonItem, OutputLine, Record, RunExit, StatsSnapshot,
    StreamUpdate, TelemetryMessage,
};
use super::session::StreamSession;
use crate::telemetry;

/// Marks rows produced from system metrics rather than user history.
pub const SYSTEM_MARKER_KEY: &str = "_wandb";
pub const TIMESTAMP_KEY: &str = "_timestamp";
pub const RUNTIME_KEY: &str = "_runtime";
pub const CLIENT_ID_KEY: &str = "_client_id";
pub const SYSTEM_PREFIX: &str = "system.";

/// Turns records into chunks. Stateless apart from the session.
#[derive(Debug, Clone)]
pub struct ChunkProcessor {
    session: Arc<StreamSession>,
}

impl ChunkProcessor {
    pub fn new(session: Arc<StreamSession>) -> Self {
        Self { session }
    }

    /// Transform one record into at most one chunk.
    ///
    /// `Ok(None)` means the record was dropped after logging; an error means
    /// the worker must stop.
    pub fn process(&self, record: Record) -> Result<Option<Chunk>, FatalError> {
        let message = record.into_message().map_err(|unknown| match unknown {
            Some(type_name) => FatalError::UnknownMessage(type_name),
            None => FatalError::MissingMessage,
        })?;

        tracing::trace!(message_type = message.type_name(), "filestream: record");

        match message {
            TelemetryMessage::History(update) => {
                encode_items(ChunkType::History, &update.items).map(Some)
            }
            TelemetryMessage::Summary(update) => {
                encode_items(ChunkType::Summary, &update.update).map(Some)
            }
            TelemetryMessage::Stats(stats) => Ok(self.system_metrics(&stats)),
            TelemetryMessage::OutputRaw(OutputLine { line }) => {
                Ok(Some(Chunk::line(ChunkType::Output, line)))
            }
            TelemetryMessage::Preempting => Ok(Some(Chunk::Control(ControlFields {
                preempting: true,
                ..Default::default()
            }))),
            TelemetryMessage::Exit(RunExit { exit_code }) => {
                Ok(Some(Chunk::Control(ControlFields {
                    complete: Some(true),
                    exitcode: Some(exit_code),
                    ..Default::default()
                })))
            }
            TelemetryMessage::StreamData(update) => self.stream_data(&update).map(Some),
            TelemetryMessage::FilesUploaded(FilesUploaded { files }) => {
                Ok(Some(Chunk::Control(ControlFields {
                    uploaded: files,
                    ..Default::default()
                })))
            }
        }
    }

    /// System metrics are lossy: a bad metric or a bad sample is logged and
    /// dropped so that one sample never halts the stream.
    fn system_metrics(&self, stats: &StatsSnapshot) -> Option<Chunk> {
        let timestamp = stats.timestamp.as_secs_f64();
        let runtime = timestamp - self.session.start_time();
        let (Some(timestamp_json), Some(runtime_json)) =
            (finite_number(timestamp), finite_number(runtime))
        else {
            tracing::error!(
                timestamp,
                runtime,
                "filestream: dropping system metrics sample with non-finite time"
            );
            telemetry::record_stats_sample_dropped();
            return None;
        };

        let mut row = Map::new();
        row.insert(SYSTEM_MARKER_KEY.into(), Value::Bool(true));
        row.insert(TIMESTAMP_KEY.into(), Value::Number(timestamp_json));
        row.insert(RUNTIME_KEY.into(), Value::Number(runtime_json));

        for item in &stats.items {
            match serde_json::from_str::<Value>(&item.value_json) {
                Ok(value) => {
                    row.insert(format!("{SYSTEM_PREFIX}{}", item.key), value);
                }
                Err(e) => {
                    tracing::warn!(
                        key = %item.key,
                        value = %item.value_json,
                        error = %e,
                        "filestream: dropping unparsable system metric"
                    );
                    telemetry::record_metric_parse_failure();
                }
            }
        }

        match serde_json::to_string(&row) {
            Ok(line) => Some(Chunk::line(ChunkType::Events, line)),
            Err(e) => {
                tracing::error!(error = %e, "filestream: dropping system metrics sample");
                telemetry::record_stats_sample_dropped();
                None
            }
        }
    }

    fn stream_data(&self, update: &StreamUpdate) -> Result<Chunk, FatalError> {
        let mut row = Map::new();
        for (key, value) in &update.items {
            let value = Value::try_from(value).map_err(|e| {
                tracing::error!(key = %key, error = %e, "filestream: unserializable stream value");
                FatalError::Serialize(e)
            })?;
            row.insert(key.clone(), value);
        }
        if let Some(client_id) = self.session.client_id() {
            row.insert(CLIENT_ID_KEY.into(), Value::from(client_id));
        }
        let line = serde_json::to_string(&row).map_err(FatalError::Serialize)?;
        Ok(Chunk::line(ChunkType::History, line))
    }
}

/// Encode items as one JSON object line. Each `value_json` must itself be
/// valid JSON; nested keys become nested objects.
pub fn jsonify_items(items: &[JsonItem]) -> Result<String, serde_json::Error> {
    let mut root = Map::new();
    for item in items {
        let value: Value = serde_json::from_str(&item.value_json)?;
        if item.nested_key.is_empty() {
            root.insert(item.key.clone(), value);
        } else {
            insert_nested(&mut root, &item.nested_key, value);
        }
    }
    serde_json::to_string(&root)
}

fn insert_nested(root: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = root;
    for key in parents {
        let slot = node
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(child) = slot else {
            return;
        };
        node = child;
    }
    node.insert(last.clone(), value);
}

fn encode_items(chunk_type: ChunkType, items: &[JsonItem]) -> Result<Chunk, FatalError> {
    let line =
        jsonify_items(items).map_err(|source| FatalError::Encode { chunk_type, source })?;
    Ok(Chunk::line(chunk_type, line))
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
