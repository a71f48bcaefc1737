//! Telemetry messages accepted by the multiplexer.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A key with a JSON-encoded value, as produced by history and summary
/// producers. `nested_key`, when non-empty, replaces `key` with a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonItem {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_key: Vec<String>,
    pub value_json: String,
}

impl JsonItem {
    pub fn new(key: impl Into<String>, value_json: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            nested_key: Vec::new(),
            value_json: value_json.into(),
        }
    }
}

/// One history row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryUpdate {
    /// Row fields; keys later in the list overwrite earlier ones.
    pub items: Vec<JsonItem>,
}

/// Changes to the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryUpdate {
    /// Summary keys to set.
    pub update: Vec<JsonItem>,
}

/// Wall-clock instant as seconds plus nanoseconds since the epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    /// Sub-second part, `0..1_000_000_000`.
    #[serde(default)]
    pub nanos: i32,
}

impl Timestamp {
    /// Fractional seconds since the epoch.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.nanos) / 1e9
    }
}

/// One system metric within a stats sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsItem {
    /// Metric name, emitted with a `system.` prefix.
    pub key: String,
    /// JSON-encoded metric value.
    pub value_json: String,
}

/// One sample of system metrics (GPU, CPU, memory, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub timestamp: Timestamp,
    pub items: Vec<StatsItem>,
}

/// A raw console line, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub line: String,
}

/// The run finished with `exit_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunExit {
    pub exit_code: i32,
}

/// Typed cell value in a stream update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamValue {
    Int64(i64),
    Double(f64),
    String(String),
}

impl TryFrom<&StreamValue> for Value {
    type Error = serde_json::Error;

    /// Fails on NaN and infinities, which JSON cannot represent.
    fn try_from(value: &StreamValue) -> Result<Self, Self::Error> {
        match value {
            StreamValue::Int64(v) => Ok(Value::from(*v)),
            StreamValue::Double(v) => finite_number(*v).map(Value::Number).ok_or_else(|| {
                <serde_json::Error as serde::ser::Error>::custom(format!(
                    "double {v} is not representable in JSON"
                ))
            }),
            StreamValue::String(v) => Ok(Value::from(v.as_str())),
        }
    }
}

/// `Some` only for finite doubles.
pub(crate) fn finite_number(v: f64) -> Option<serde_json::Number> {
    serde_json::Number::from_f64(v)
}

/// Key/value row for stream tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUpdate {
    pub items: BTreeMap<String, StreamValue>,
}

/// Files the uploader has finished with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesUploaded {
    /// Paths relative to the run's file directory.
    pub files: Vec<String>,
}

/// Every kind of run event the multiplexer accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessage {
    History(HistoryUpdate),
    Summary(SummaryUpdate),
    Stats(StatsSnapshot),
    OutputRaw(OutputLine),
    Preempting,
    Exit(RunExit),
    StreamData(StreamUpdate),
    FilesUploaded(FilesUploaded),
}

impl TelemetryMessage {
    /// Wire names of all message types, as used in the `type` tag.
    pub const TYPE_NAMES: &'static [&'static str] = &[
        "history",
        "summary",
        "stats",
        "output_raw",
        "preempting",
        "exit",
        "stream_data",
        "files_uploaded",
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::History(_) => "history",
            Self::Summary(_) => "summary",
            Self::Stats(_) => "stats",
            Self::OutputRaw(_) => "output_raw",
            Self::Preempting => "preempting",
            Self::Exit(_) => "exit",
            Self::StreamData(_) => "stream_data",
            Self::FilesUploaded(_) => "files_uploaded",
        }
    }
}

/// Queue envelope around a message.
///
/// Producers that build records from untyped input can end up with no
/// message or with a type this build does not know. Those records still
/// enter the queue; the worker treats them as protocol violations.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    message: Option<TelemetryMessage>,
    unknown_type: Option<String>,
}

impl Record {
    /// A record whose message was never set.
    pub fn empty() -> Self {
        Self {
            message: None,
            unknown_type: None,
        }
    }

    /// A record carrying a type name outside `TelemetryMessage::TYPE_NAMES`.
    pub fn unknown(type_name: impl Into<String>) -> Self {
        Self {
            message: None,
            unknown_type: Some(type_name.into()),
        }
    }

    /// Decode a record from a JSON object with a `type` tag.
    ///
    /// A missing tag yields an empty record and an unrecognized tag an
    /// unknown one; malformed fields of a known type are an error.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Some(object) = value.as_object() else {
            return Err(serde_json::Error::custom("record must be a JSON object"));
        };
        match object.get("type") {
            None | Some(Value::Null) => Ok(Self::empty()),
            Some(Value::String(name)) if !TelemetryMessage::TYPE_NAMES.contains(&name.as_str()) => {
                Ok(Self::unknown(name.clone()))
            }
            Some(_) => Ok(serde_json::from_value::<TelemetryMessage>(value)?.into()),
        }
    }

    pub fn message(&self) -> Option<&TelemetryMessage> {
        self.message.as_ref()
    }

    pub fn unknown_type(&self) -> Option<&str> {
        self.unknown_type.as_deref()
    }

    pub(crate) fn into_message(self) -> Result<TelemetryMessage, Option<String>> {
        self.message.ok_or(self.unknown_type)
    }
}

impl From<TelemetryMessage> for Record {
    fn from(message: TelemetryMessage) -> Self {
        Self {
            message: Some(message),
            unknown_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_cover_every_variant() {
        let samples = [
            TelemetryMessage::History(HistoryUpdate::default()),
            TelemetryMessage::Summary(SummaryUpdate::default()),
            TelemetryMessage::Stats(StatsSnapshot::default()),
            TelemetryMessage::OutputRaw(OutputLine { line: String::new() }),
            TelemetryMessage::Preempting,
            TelemetryMessage::Exit(RunExit { exit_code: 0 }),
            TelemetryMessage::StreamData(StreamUpdate::default()),
            TelemetryMessage::FilesUploaded(FilesUploaded::default()),
        ];
        for message in &samples {
            assert!(TelemetryMessage::TYPE_NAMES.contains(&message.type_name()));
            let json = serde_json::to_value(message).unwrap();
            assert_eq!(json["type"], message.type_name());
        }
        assert_eq!(samples.len(), TelemetryMessage::TYPE_NAMES.len());
    }

    #[test]
    fn from_json_decodes_known_types() {
        let record = Record::from_json(br#"{"type":"exit","exit_code":3}"#).unwrap();
        assert_eq!(
            record.message(),
            Some(&TelemetryMessage::Exit(RunExit { exit_code: 3 }))
        );

        let record = Record::from_json(br#"{"type":"preempting"}"#).unwrap();
        assert_eq!(record.message(), Some(&TelemetryMessage::Preempting));

        let record = Record::from_json(
            br#"{"type":"stream_data","items":{"a":{"int64":1},"b":{"string":"x"}}}"#,
        )
        .unwrap();
        match record.message() {
            Some(TelemetryMessage::StreamData(update)) => {
                assert_eq!(update.items["a"], StreamValue::Int64(1));
                assert_eq!(update.items["b"], StreamValue::String("x".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn from_json_keeps_unknown_and_missing_types() {
        let record = Record::from_json(br#"{"type":"telemetry_v9"}"#).unwrap();
        assert!(record.message().is_none());
        assert_eq!(record.unknown_type(), Some("telemetry_v9"));

        let record = Record::from_json(br#"{"line":"no tag"}"#).unwrap();
        assert_eq!(record, Record::empty());
    }

    #[test]
    fn from_json_rejects_malformed_known_types() {
        assert!(Record::from_json(br#"{"type":"exit","exit_code":"three"}"#).is_err());
        assert!(Record::from_json(b"[1]").is_err());
    }

    #[test]
    fn timestamp_combines_seconds_and_nanos() {
        let ts = Timestamp {
            seconds: 100,
            nanos: 500_000_000,
        };
        assert_eq!(ts.as_secs_f64(), 100.5);
    }
}
