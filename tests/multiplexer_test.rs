//! Multiplexer tests: ordering, shutdown and fatal paths through the public API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use runstream_core::filestream::{
    spawn_multiplexer, ChannelDelivery, Chunk, ChunkType, FatalError, HistoryUpdate, JsonItem,
    MuxConfig, OutputLine, Record, RunExit, StatsItem, StatsSnapshot, StreamSession, StreamUpdate,
    StreamValue, SubmitError, TelemetryMessage, Timestamp,
};
use runstream_core::RunStream;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

fn history(seq: u64) -> TelemetryMessage {
    TelemetryMessage::History(HistoryUpdate {
        items: vec![JsonItem::new("seq", seq.to_string())],
    })
}

fn output(seq: u64) -> TelemetryMessage {
    TelemetryMessage::OutputRaw(OutputLine {
        line: seq.to_string(),
    })
}

fn seq_of(chunk: &Chunk) -> u64 {
    let line = chunk.as_line().unwrap();
    match chunk.chunk_type() {
        ChunkType::History => {
            let row: Value = serde_json::from_str(line).unwrap();
            row["seq"].as_u64().unwrap()
        }
        _ => line.parse().unwrap(),
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_keep_submission_order() {
    const PRODUCERS: u64 = 8;
    const PER_PRODUCER: u64 = 50;

    let (delivery, mut rx) = ChannelDelivery::new(16);
    let (handle, worker) = spawn_multiplexer(
        Arc::new(StreamSession::new(0.0)),
        Arc::new(delivery),
        MuxConfig { queue_capacity: 4 },
        CancellationToken::new(),
    );

    // Submitting under the lock fixes a global order; `next` records it.
    let next = Arc::new(Mutex::new(0u64));
    let mut tasks = Vec::new();
    for producer in 0..PRODUCERS {
        let handle = handle.clone();
        let next = next.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..PER_PRODUCER {
                let mut seq = next.lock().await;
                let message = if producer % 2 == 0 {
                    history(*seq)
                } else {
                    output(*seq)
                };
                handle.submit(message).await.unwrap();
                *seq += 1;
            }
        }));
    }
    drop(handle);

    let collector = tokio::spawn(async move {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    });

    for task in tasks {
        task.await.unwrap();
    }
    worker.await.unwrap().unwrap();
    let chunks = collector.await.unwrap();

    assert_eq!(chunks.len() as u64, PRODUCERS * PER_PRODUCER);
    let seqs: Vec<u64> = chunks.iter().map(seq_of).collect();
    let expected: Vec<u64> = (0..PRODUCERS * PER_PRODUCER).collect();
    assert_eq!(seqs, expected);

    for chunk_type in [ChunkType::History, ChunkType::Output] {
        let per_type: Vec<u64> = chunks
            .iter()
            .filter(|c| c.chunk_type() == chunk_type)
            .map(seq_of)
            .collect();
        assert!(per_type.windows(2).all(|w| w[0] < w[1]));
    }
}

// =============================================================================
// Transformation through the worker
// =============================================================================

#[tokio::test]
async fn test_stats_with_bad_metric_still_emits_sample() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let (handle, worker) = spawn_multiplexer(
        Arc::new(StreamSession::new(100.0)),
        Arc::new(delivery),
        MuxConfig::default(),
        CancellationToken::new(),
    );

    let stats = StatsSnapshot {
        timestamp: Timestamp {
            seconds: 130,
            nanos: 0,
        },
        items: vec![
            StatsItem {
                key: "cpu".into(),
                value_json: "3.5".into(),
            },
            StatsItem {
                key: "gpu".into(),
                value_json: "{{".into(),
            },
            StatsItem {
                key: "memory".into(),
                value_json: "70".into(),
            },
        ],
    };
    handle.submit(TelemetryMessage::Stats(stats)).await.unwrap();
    drop(handle);
    worker.await.unwrap().unwrap();

    let chunk = rx.recv().await.unwrap();
    assert_eq!(chunk.chunk_type(), ChunkType::Events);
    let row: Value = serde_json::from_str(chunk.as_line().unwrap()).unwrap();
    assert_eq!(row["system.cpu"], 3.5);
    assert_eq!(row["system.memory"], 70);
    assert!(row.get("system.gpu").is_none());
    assert_eq!(row["_runtime"], 30.0);
    assert_eq!(row["_wandb"], true);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_control_messages_produce_single_chunks() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let (handle, worker) = spawn_multiplexer(
        Arc::new(StreamSession::new(0.0)),
        Arc::new(delivery),
        MuxConfig::default(),
        CancellationToken::new(),
    );
    handle.submit(TelemetryMessage::Preempting).await.unwrap();
    handle
        .submit(TelemetryMessage::Exit(RunExit { exit_code: 3 }))
        .await
        .unwrap();
    drop(handle);
    worker.await.unwrap().unwrap();

    let preempting = rx.recv().await.unwrap();
    assert_eq!(
        serde_json::to_value(&preempting).unwrap(),
        serde_json::json!({"kind": "control", "preempting": true})
    );
    let exit = rx.recv().await.unwrap();
    assert_eq!(
        serde_json::to_value(&exit).unwrap(),
        serde_json::json!({"kind": "control", "complete": true, "exitcode": 3})
    );
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_json_records_reach_the_worker() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let session = StreamSession::new(0.0).with_client_id("client-1");
    let (handle, worker) = spawn_multiplexer(
        Arc::new(session),
        Arc::new(delivery),
        MuxConfig::default(),
        CancellationToken::new(),
    );

    let record = Record::from_json(
        br#"{"type": "stream_data", "items": {"rows": {"int64": 12}}}"#,
    )
    .unwrap();
    handle.submit(record).await.unwrap();
    drop(handle);
    worker.await.unwrap().unwrap();

    let row: Value = serde_json::from_str(rx.recv().await.unwrap().as_line().unwrap()).unwrap();
    assert_eq!(row["rows"], 12);
    assert_eq!(row["_client_id"], "client-1");
}

#[tokio::test]
async fn test_stream_update_values() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let run = RunStream::start(
        StreamSession::new(0.0),
        Arc::new(delivery),
        MuxConfig::default(),
    );
    let mut items = BTreeMap::new();
    items.insert("acc".to_string(), StreamValue::Double(0.75));
    run.handle()
        .submit(TelemetryMessage::StreamData(StreamUpdate { items }))
        .await
        .unwrap();
    run.finish().await.unwrap();

    let row: Value = serde_json::from_str(rx.recv().await.unwrap().as_line().unwrap()).unwrap();
    assert_eq!(row["acc"], 0.75);
}

#[tokio::test]
async fn test_dropped_stats_sample_does_not_stop_worker() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let (handle, worker) = spawn_multiplexer(
        Arc::new(StreamSession::new(f64::INFINITY)),
        Arc::new(delivery),
        MuxConfig::default(),
        CancellationToken::new(),
    );
    handle
        .submit(TelemetryMessage::Stats(StatsSnapshot {
            timestamp: Timestamp {
                seconds: 5,
                nanos: 0,
            },
            items: vec![StatsItem {
                key: "cpu".into(),
                value_json: "1".into(),
            }],
        }))
        .await
        .unwrap();
    handle.submit(output(9)).await.unwrap();
    drop(handle);
    worker.await.unwrap().unwrap();

    let chunk = rx.recv().await.unwrap();
    assert_eq!(chunk.chunk_type(), ChunkType::Output);
    assert_eq!(seq_of(&chunk), 9);
    assert!(rx.recv().await.is_none());
}

// =============================================================================
// Shutdown and fatal errors
// =============================================================================

#[tokio::test]
async fn test_finish_drains_and_rejects_late_submissions() {
    let (delivery, mut rx) = ChannelDelivery::new(64);
    let run = RunStream::start(
        StreamSession::new(0.0),
        Arc::new(delivery),
        MuxConfig { queue_capacity: 64 },
    );
    let producer = run.handle();
    for seq in 0..20 {
        producer.submit(output(seq)).await.unwrap();
    }
    run.finish().await.unwrap();

    for seq in 0..20 {
        assert_eq!(seq_of(&rx.recv().await.unwrap()), seq);
    }
    assert!(rx.recv().await.is_none());
    assert_eq!(producer.submit(output(99)).await, Err(SubmitError));
}

#[tokio::test]
async fn test_unknown_record_type_is_fatal() {
    let (delivery, _rx) = ChannelDelivery::new(4);
    let run = RunStream::start(
        StreamSession::new(0.0),
        Arc::new(delivery),
        MuxConfig::default(),
    );
    let record = Record::from_json(br#"{"type": "telemetry_v9", "x": 1}"#).unwrap();
    run.handle().submit(record).await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), run.finish())
        .await
        .unwrap()
        .unwrap_err();
    match err {
        FatalError::UnknownMessage(name) => assert_eq!(name, "telemetry_v9"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_nan_stream_value_is_fatal() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let run = RunStream::start(
        StreamSession::new(0.0),
        Arc::new(delivery),
        MuxConfig::default(),
    );
    let mut items = BTreeMap::new();
    items.insert("loss".to_string(), StreamValue::Double(f64::NAN));
    run.handle()
        .submit(TelemetryMessage::StreamData(StreamUpdate { items }))
        .await
        .unwrap();

    assert!(matches!(run.finish().await, Err(FatalError::Serialize(_))));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_blocking_submit_from_sync_thread() {
    let (delivery, mut rx) = ChannelDelivery::new(4);
    let run = RunStream::start(
        StreamSession::new(0.0),
        Arc::new(delivery),
        MuxConfig::default(),
    );
    let handle = run.handle();
    tokio::task::spawn_blocking(move || {
        handle.blocking_submit(output(5)).unwrap();
    })
    .await
    .unwrap();
    run.finish().await.unwrap();
    assert_eq!(seq_of(&rx.recv().await.unwrap()), 5);
}
