//! End-to-end protocol scenarios over the in-memory bus: producer and
//! console wired through real frames, codec, and dispatcher.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::mpsc;

use fleet_monitor::bus::{BusEvent, BusPublisher, BusTransport, LocalBus};
use fleet_monitor::producer::{Dispatcher, StaticRecordStore, TelemetryGenerator};
use fleet_monitor::protocol::messages::{
    BusMessage, CommandAction, ControlCommand, QueryKind, QueryRequest, ResultStatus,
};
use fleet_monitor::protocol::{codec, Channel, Role};

fn producer_dispatcher(bus: &Arc<LocalBus>) -> Dispatcher<Arc<LocalBus>, StaticRecordStore> {
    Dispatcher::new(
        TelemetryGenerator::with_reference_roster(),
        StaticRecordStore::with_audit_history(),
        BusPublisher::new(bus.clone(), Role::Producer),
    )
}

#[tokio::test]
async fn scenario_a_full_roster_batch_arrives_as_one_event() {
    let bus = Arc::new(LocalBus::new());
    let mut status_frames = bus.subscribe(Channel::DeviceStatus);

    let generator = TelemetryGenerator::with_reference_roster();
    let publisher = BusPublisher::new(bus.clone(), Role::Producer);
    let batch = {
        let mut rng = StdRng::seed_from_u64(42);
        generator.snapshot_all(&mut rng)
    };
    publisher
        .publish(&BusMessage::DeviceStatusBatch(batch))
        .await
        .unwrap();

    let frame = status_frames.recv().await.unwrap();
    let event = BusEvent::from_frame(frame.channel.as_str(), frame.payload.as_bytes())
        .expect("known channel");
    let batch = match event {
        BusEvent::Message {
            channel: Channel::DeviceStatus,
            message: BusMessage::DeviceStatusBatch(batch),
        } => batch,
        other => panic!("expected one device_status event, got {other:?}"),
    };
    assert_eq!(batch.records.len(), 6);
    assert!(matches!(
        status_frames.try_recv(),
        Err(TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn scenario_b_confirm_is_acknowledged_across_the_bus() {
    let bus = Arc::new(LocalBus::new());
    let mut command_frames = bus.subscribe(Channel::ControlCommands);
    let mut result_frames = bus.subscribe(Channel::QueryResults);
    let dispatcher = producer_dispatcher(&bus);

    let console = BusPublisher::new(bus.clone(), Role::Console);
    console
        .publish(&BusMessage::ControlCommand(ControlCommand::issued_now(
            CommandAction::Confirm,
            Some("device_status".to_string()),
        )))
        .await
        .unwrap();

    let frame = command_frames.recv().await.unwrap();
    let event =
        BusEvent::from_frame(frame.channel.as_str(), frame.payload.as_bytes()).expect("decodes");
    dispatcher.dispatch(event).await.unwrap();

    let frame = result_frames.recv().await.unwrap();
    let BusMessage::QueryResult(result) = codec::decode(&frame.payload).unwrap() else {
        panic!("expected a query result on query_results");
    };
    assert_eq!(result.status, ResultStatus::Success);
    assert!(result.message.contains("confirmation"));
}

#[tokio::test]
async fn scenario_c_bogus_action_produces_no_reply() {
    let bus = Arc::new(LocalBus::new());
    let mut command_frames = bus.subscribe(Channel::ControlCommands);
    let mut result_frames = bus.subscribe(Channel::QueryResults);
    let dispatcher = producer_dispatcher(&bus);

    let console = BusPublisher::new(bus.clone(), Role::Console);
    console
        .publish(&BusMessage::ControlCommand(ControlCommand::issued_now(
            CommandAction::Other("bogus".to_string()),
            None,
        )))
        .await
        .unwrap();

    let frame = command_frames.recv().await.unwrap();
    let event =
        BusEvent::from_frame(frame.channel.as_str(), frame.payload.as_bytes()).expect("decodes");
    dispatcher.dispatch(event).await.unwrap();

    assert!(matches!(
        result_frames.try_recv(),
        Err(TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn scenario_d_malformed_payload_does_not_kill_the_stream() {
    let bus = Arc::new(LocalBus::new());
    let mut frames = bus.subscribe(Channel::MonitoringData);

    bus.publish(Channel::MonitoringData, "{definitely not a message".to_string())
        .await
        .unwrap();
    let generator = TelemetryGenerator::with_reference_roster();
    let sample = {
        let mut rng = StdRng::seed_from_u64(7);
        generator.sample_one(&mut rng, "PWR-001").unwrap()
    };
    BusPublisher::new(bus.clone(), Role::Producer)
        .publish(&BusMessage::MonitoringSample(sample.clone()))
        .await
        .unwrap();

    // Same handoff the receive loop performs: frame -> event -> consumer.
    let (events_tx, mut events_rx) = mpsc::channel(8);
    for _ in 0..2 {
        let frame = frames.recv().await.unwrap();
        if let Some(event) = BusEvent::from_frame(frame.channel.as_str(), frame.payload.as_bytes())
        {
            events_tx.send(event).await.unwrap();
        }
    }

    let first = events_rx.recv().await.unwrap();
    assert!(matches!(
        first,
        BusEvent::Malformed {
            channel: Channel::MonitoringData,
            ..
        }
    ));

    let second = events_rx.recv().await.unwrap();
    let BusEvent::Message {
        message: BusMessage::MonitoringSample(received),
        ..
    } = second
    else {
        panic!("valid sample should still arrive after the malformed frame");
    };
    assert_eq!(received, sample);
}

#[tokio::test]
async fn scenario_e_record_query_yields_exactly_one_result_with_records() {
    let bus = Arc::new(LocalBus::new());
    let mut request_frames = bus.subscribe(Channel::QueryRequests);
    let mut result_frames = bus.subscribe(Channel::QueryResults);
    let dispatcher = producer_dispatcher(&bus);

    let console = BusPublisher::new(bus.clone(), Role::Console);
    console
        .publish(&BusMessage::QueryRequest(QueryRequest::issued_now(
            QueryKind::QueryRecords,
        )))
        .await
        .unwrap();

    let frame = request_frames.recv().await.unwrap();
    let event =
        BusEvent::from_frame(frame.channel.as_str(), frame.payload.as_bytes()).expect("decodes");
    dispatcher.dispatch(event).await.unwrap();

    let frame = result_frames.recv().await.unwrap();
    let BusMessage::QueryResult(result) = codec::decode(&frame.payload).unwrap() else {
        panic!("expected a query result");
    };
    assert_eq!(result.status, ResultStatus::Success);
    assert!(!result.records.expect("records attached").is_empty());
    assert!(matches!(
        result_frames.try_recv(),
        Err(TryRecvError::Empty)
    ));
}
