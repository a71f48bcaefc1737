//! Tests for record to chunk transformation.

use std::collections::BTreeMap;

use super::*;
use crate::filestream::message::{
    HistoryUpdate, StatsItem, StreamValue, SummaryUpdate, Timestamp,
};

fn processor() -> ChunkProcessor {
    ChunkProcessor::new(Arc::new(StreamSession::new(1000.0)))
}

fn line_json(chunk: &Chunk) -> Value {
    serde_json::from_str(chunk.as_line().expect("line chunk")).unwrap()
}

fn stat(key: &str, value_json: &str) -> StatsItem {
    StatsItem {
        key: key.into(),
        value_json: value_json.into(),
    }
}

#[test]
fn history_items_become_one_json_line() {
    let record = TelemetryMessage::History(HistoryUpdate {
        items: vec![
            JsonItem::new("_step", "4"),
            JsonItem::new("loss", "0.25"),
            JsonItem::new("tag", "\"warmup\""),
        ],
    });
    let chunk = processor().process(record.into()).unwrap().unwrap();
    assert_eq!(chunk.chunk_type(), ChunkType::History);
    let row = line_json(&chunk);
    assert_eq!(row["_step"], 4);
    assert_eq!(row["loss"], 0.25);
    assert_eq!(row["tag"], "warmup");
}

#[test]
fn summary_nested_keys_become_objects() {
    let record = TelemetryMessage::Summary(SummaryUpdate {
        update: vec![
            JsonItem {
                key: String::new(),
                nested_key: vec!["eval".into(), "acc".into()],
                value_json: "0.9".into(),
            },
            JsonItem {
                key: String::new(),
                nested_key: vec!["eval".into(), "f1".into()],
                value_json: "0.8".into(),
            },
        ],
    });
    let chunk = processor().process(record.into()).unwrap().unwrap();
    assert_eq!(chunk.chunk_type(), ChunkType::Summary);
    let row = line_json(&chunk);
    assert_eq!(row["eval"]["acc"], 0.9);
    assert_eq!(row["eval"]["f1"], 0.8);
}

#[test]
fn invalid_history_value_is_fatal() {
    let record = TelemetryMessage::History(HistoryUpdate {
        items: vec![JsonItem::new("loss", "{not json")],
    });
    let err = processor().process(record.into()).unwrap_err();
    assert!(matches!(
        err,
        FatalError::Encode {
            chunk_type: ChunkType::History,
            ..
        }
    ));
    assert!(!err.is_protocol_violation());
}

#[test]
fn output_line_is_verbatim() {
    let line = "epoch 1/10 [=====>    ] {\"not\": \"parsed\"}\r";
    let record = TelemetryMessage::OutputRaw(OutputLine { line: line.into() });
    let chunk = processor().process(record.into()).unwrap().unwrap();
    assert_eq!(chunk, Chunk::line(ChunkType::Output, line));
}

#[test]
fn stats_row_has_marker_timestamp_and_runtime() {
    let record = TelemetryMessage::Stats(StatsSnapshot {
        timestamp: Timestamp {
            seconds: 1012,
            nanos: 500_000_000,
        },
        items: vec![stat("gpu.0.temp", "61"), stat("cpu", "12.5")],
    });
    let chunk = processor().process(record.into()).unwrap().unwrap();
    assert_eq!(chunk.chunk_type(), ChunkType::Events);

    let row = line_json(&chunk);
    assert_eq!(row["_wandb"], true);
    assert_eq!(row["_timestamp"], 1012.5);
    assert_eq!(row["_runtime"], 12.5);
    assert_eq!(row["system.gpu.0.temp"], 61);
    assert_eq!(row["system.cpu"], 12.5);
}

#[test]
fn stats_sample_with_non_finite_runtime_is_dropped() {
    let processor = ChunkProcessor::new(Arc::new(StreamSession::new(f64::NAN)));
    let record = TelemetryMessage::Stats(StatsSnapshot {
        timestamp: Timestamp {
            seconds: 1,
            nanos: 0,
        },
        items: vec![stat("cpu", "3")],
    });
    assert_eq!(processor.process(record.into()).unwrap(), None);

    let line = TelemetryMessage::OutputRaw(OutputLine {
        line: "still here".into(),
    });
    let next = processor.process(line.into()).unwrap().unwrap();
    assert_eq!(next.as_line(), Some("still here"));
}

#[test]
fn unparsable_metric_is_dropped_not_the_sample() {
    let record = TelemetryMessage::Stats(StatsSnapshot {
        timestamp: Timestamp {
            seconds: 1001,
            nanos: 0,
        },
        items: vec![
            stat("memory", "48.0"),
            stat("disk", "NaN%"),
            stat("network.sent", "1024"),
        ],
    });
    let chunk = processor().process(record.into()).unwrap().unwrap();
    let row = line_json(&chunk);
    let object = row.as_object().unwrap();

    assert_eq!(row["system.memory"], 48.0);
    assert_eq!(row["system.network.sent"], 1024);
    assert!(!object.contains_key("system.disk"));
    assert_eq!(row["_runtime"], 1.0);
    assert_eq!(object.len(), 5);
}

#[test]
fn stream_update_typed_values() {
    let mut items = BTreeMap::new();
    items.insert("count".to_string(), StreamValue::Int64(-3));
    items.insert("ratio".to_string(), StreamValue::Double(0.5));
    items.insert("name".to_string(), StreamValue::String("a".into()));
    let record = TelemetryMessage::StreamData(StreamUpdate { items });

    let chunk = processor().process(record.into()).unwrap().unwrap();
    assert_eq!(chunk.chunk_type(), ChunkType::History);
    let row = line_json(&chunk);
    assert_eq!(row["count"], -3);
    assert_eq!(row["ratio"], 0.5);
    assert_eq!(row["name"], "a");
    assert!(row.get("_client_id").is_none());
}

#[test]
fn stream_update_non_finite_double_is_fatal() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut items = BTreeMap::new();
        items.insert("ok".to_string(), StreamValue::Int64(1));
        items.insert("x".to_string(), StreamValue::Double(bad));
        let err = processor()
            .process(TelemetryMessage::StreamData(StreamUpdate { items }).into())
            .unwrap_err();
        assert!(matches!(err, FatalError::Serialize(_)), "{bad}: {err:?}");
        assert!(!err.is_protocol_violation());
    }
}

#[test]
fn stream_update_tagged_with_client_id() {
    let session = StreamSession::new(0.0).with_client_id("table-7");
    let processor = ChunkProcessor::new(Arc::new(session));
    let mut items = BTreeMap::new();
    items.insert("x".to_string(), StreamValue::Int64(1));

    let chunk = processor
        .process(TelemetryMessage::StreamData(StreamUpdate { items }).into())
        .unwrap()
        .unwrap();
    assert_eq!(line_json(&chunk)["_client_id"], "table-7");
}

#[test]
fn exit_is_complete_with_code() {
    let chunk = processor()
        .process(TelemetryMessage::Exit(RunExit { exit_code: 2 }).into())
        .unwrap()
        .unwrap();
    assert_eq!(
        chunk,
        Chunk::Control(ControlFields {
            complete: Some(true),
            exitcode: Some(2),
            preempting: false,
            uploaded: Vec::new(),
        })
    );
}

#[test]
fn preempting_sets_only_the_flag() {
    let chunk = processor()
        .process(TelemetryMessage::Preempting.into())
        .unwrap()
        .unwrap();
    assert_eq!(
        chunk.as_control(),
        Some(&ControlFields {
            preempting: true,
            ..Default::default()
        })
    );
}

#[test]
fn files_uploaded_lists_names() {
    let files = vec!["config.yaml".to_string(), "media/plot.png".to_string()];
    let chunk = processor()
        .process(
            TelemetryMessage::FilesUploaded(FilesUploaded {
                files: files.clone(),
            })
            .into(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(chunk.as_control().unwrap().uploaded, files);
}

#[test]
fn empty_record_is_protocol_violation() {
    let err = processor().process(Record::empty()).unwrap_err();
    assert!(matches!(err, FatalError::MissingMessage));
    assert!(err.is_protocol_violation());
}

#[test]
fn unknown_record_is_protocol_violation() {
    let err = processor().process(Record::unknown("metrics_v2")).unwrap_err();
    match err {
        FatalError::UnknownMessage(name) => assert_eq!(name, "metrics_v2"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn jsonify_overwrites_scalar_parent() {
    let items = vec![
        JsonItem::new("a", "1"),
        JsonItem {
            key: String::new(),
            nested_key: vec!["a".into(), "b".into()],
            value_json: "2".into(),
        },
    ];
    let row: Value = serde_json::from_str(&jsonify_items(&items).unwrap()).unwrap();
    assert_eq!(row["a"]["b"], 2);
}
