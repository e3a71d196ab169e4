//! Unit tests for event sinks and the paper executor

use crossguard::error::ExecutionError;
use crossguard::models::market::OrderSide;
use crossguard::models::protection::{EngineEvent, ProtectionDecision};
use crossguard::models::signal::{Action, CrossoverEvent, CrossoverKind, ReasonCode};
use crossguard::services::events::{EventSink, FanoutEventSink, JsonlEventSink};
use crossguard::services::execution::{OrderExecutor, PaperOrderExecutor};
use std::sync::Arc;
use tempfile::TempDir;

use crate::support::{base_time, RecordingSink};

fn rejection() -> EngineEvent {
    EngineEvent::Protection(ProtectionDecision {
        symbol: "BTCUSDT".to_string(),
        action: Action::Buy,
        admitted: false,
        blocking_reasons: [ReasonCode::FreshTrendBearish].into_iter().collect(),
    })
}

fn crossover() -> EngineEvent {
    EngineEvent::Crossover(CrossoverEvent {
        symbol: "ETHUSDT".to_string(),
        timestamp: base_time(),
        kind: CrossoverKind::Death,
        sample: 30,
    })
}

#[test]
fn fanout_forwards_to_every_sink() {
    let a = Arc::new(RecordingSink::default());
    let b = Arc::new(RecordingSink::default());
    let fanout = FanoutEventSink::new(vec![a.clone() as Arc<dyn EventSink>, b.clone()]);

    fanout.record(rejection());
    fanout.record(crossover());

    assert_eq!(a.events(), vec![rejection(), crossover()]);
    assert_eq!(b.events().len(), 2);
}

#[tokio::test]
async fn jsonl_sink_writes_one_line_per_event() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events/engine.jsonl");
    let (sink, writer) = JsonlEventSink::spawn(path.clone());

    sink.record(rejection());
    sink.record(crossover());
    drop(sink);
    writer.await.unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["type"], "protection");
    assert_eq!(first["admitted"], false);
    let second: EngineEvent = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second, crossover());
}

#[tokio::test]
async fn paper_executor_places_valid_orders() {
    let executor = PaperOrderExecutor::new();
    let first = executor
        .place_order("BTCUSDT", OrderSide::Buy, 0.5)
        .await
        .unwrap();
    let second = executor
        .place_order("BTCUSDT", OrderSide::Sell, 0.5)
        .await
        .unwrap();

    assert_eq!(first.order_id, "paper-1");
    assert_eq!(second.order_id, "paper-2");
    assert_eq!(second.side, OrderSide::Sell);
    assert_eq!(executor.orders_placed(), 2);
}

#[test]
fn paper_executor_rejects_bad_quantity() {
    let executor = PaperOrderExecutor::new();
    for quantity in [0.0, -1.0, f64::NAN] {
        let err = tokio_test::block_on(executor.place_order("BTCUSDT", OrderSide::Buy, quantity))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidOrder(_)));
    }
    assert_eq!(executor.orders_placed(), 0);
}
