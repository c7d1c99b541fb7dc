use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::bus::{
    BusEvent, BusListener, BusPublisher, BusTransport, ListenerError, ListenerOptions,
    PublishError,
};
use crate::protocol::messages::{
    BusMessage, CommandAction, ControlCommand, QueryKind, QueryRequest,
};
use crate::protocol::Role;

/// Operator-side session: one listener bound to the console channel set and
/// a console-role publisher. The session owns no protocol state beyond
/// whether it is currently bound.
///
/// The query protocol carries no correlation id, so a session assumes at
/// most one outstanding query at a time; a reply is matched to its request
/// by type and arrival order only.
pub struct ConsoleSession<T: BusTransport> {
    listener: BusListener,
    publisher: BusPublisher<T>,
    bound: bool,
}

impl<T: BusTransport> ConsoleSession<T> {
    pub fn new(transport: T, options: ListenerOptions) -> Self {
        Self {
            listener: BusListener::new(options),
            publisher: BusPublisher::new(transport, Role::Console),
            bound: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Subscribe the console channels and start receiving. Issues an initial
    /// device-status query so the display starts from a fresh snapshot.
    pub async fn bind(&mut self, events: mpsc::Sender<BusEvent>) -> Result<(), ListenerError> {
        self.listener
            .start(Role::Console.subscriptions(), events)
            .await?;
        self.bound = true;
        if let Err(err) = self.query(QueryKind::DeviceStatus).await {
            warn!("initial device status query failed: {err}");
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        self.listener.stop().await;
        self.bound = false;
    }

    /// Acknowledge the currently displayed information. The view the
    /// operator is acting on is passed explicitly, never read from ambient
    /// state.
    pub async fn confirm(&self, context: Option<&str>) -> Result<(), PublishError> {
        let command = ControlCommand::issued_now(
            CommandAction::Confirm,
            context.map(str::to_owned),
        );
        self.publisher
            .publish(&BusMessage::ControlCommand(command))
            .await
            .map(|_| ())
    }

    pub async fn restore(&self) -> Result<(), PublishError> {
        let command = ControlCommand::issued_now(CommandAction::Restore, None);
        self.publisher
            .publish(&BusMessage::ControlCommand(command))
            .await
            .map(|_| ())
    }

    pub async fn query(&self, kind: QueryKind) -> Result<(), PublishError> {
        self.publisher
            .publish(&BusMessage::QueryRequest(QueryRequest::issued_now(kind)))
            .await
            .map(|_| ())
    }
}

/// Render incoming events the way the operator display does: one timestamped
/// line per event, errors included.
pub async fn render_events(mut events: mpsc::Receiver<BusEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BusEvent::Message { channel, message } => {
                info!(%channel, "{}", describe(&message));
            }
            BusEvent::Malformed { channel, error } => {
                warn!(%channel, "undecodable message: {error}");
            }
            BusEvent::ConnectionLost { detail } => {
                error!("bus connection lost: {detail}");
            }
        }
    }
}

fn describe(message: &BusMessage) -> String {
    match message {
        BusMessage::DeviceStatusBatch(batch) => {
            let online = batch
                .records
                .iter()
                .filter(|record| {
                    record.status == crate::protocol::messages::DeviceStatus::Online
                })
                .count();
            format!(
                "device status: {}/{} online",
                online,
                batch.records.len()
            )
        }
        BusMessage::MonitoringSample(sample) => {
            let points: Vec<String> = sample
                .data_points
                .iter()
                .map(|point| format!("{}={}{}", point.metric, point.value, point.unit))
                .collect();
            format!("{}: {}", sample.device_name, points.join(", "))
        }
        BusMessage::QueryResult(result) => match &result.records {
            Some(records) => format!("{} ({} records)", result.message, records.len()),
            None => result.message.clone(),
        },
        other => format!("unexpected {} on a console channel", other.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{
        DataPoint, DeviceKind, DeviceStatus, DeviceStatusBatch, DeviceStatusRecord,
        MonitoringSample, QueryResult, StatusMetrics,
    };

    #[test]
    fn batch_summary_counts_online_devices() {
        let record = |status| DeviceStatusRecord {
            device_id: "CTRL-001".to_string(),
            device_name: "Evacuation Controller".to_string(),
            device_type: DeviceKind::Controller,
            location: "Platform A".to_string(),
            status,
            timestamp: "2025-12-07 10:00:00".to_string(),
            metrics: StatusMetrics::Controller {
                signal_strength: 90,
                cpu_usage: 30,
                memory_usage: 40,
            },
        };
        let batch = BusMessage::DeviceStatusBatch(DeviceStatusBatch {
            records: vec![
                record(DeviceStatus::Online),
                record(DeviceStatus::Warning),
                record(DeviceStatus::Online),
            ],
        });
        assert_eq!(describe(&batch), "device status: 2/3 online");
    }

    #[test]
    fn sample_summary_lists_data_points() {
        let sample = BusMessage::MonitoringSample(MonitoringSample {
            device_id: "PWR-001".to_string(),
            device_name: "Standby Power Supply - Platform A".to_string(),
            timestamp: "2025-12-07 10:00:00.000".to_string(),
            data_points: vec![DataPoint {
                metric: "voltage".to_string(),
                value: 24.5,
                unit: "V".to_string(),
            }],
        });
        assert_eq!(
            describe(&sample),
            "Standby Power Supply - Platform A: voltage=24.5V"
        );
    }

    #[test]
    fn result_summary_mentions_record_count() {
        let result = BusMessage::QueryResult(QueryResult::with_records(
            "query records returned",
            vec![],
        ));
        assert_eq!(describe(&result), "query records returned (0 records)");
    }
}
