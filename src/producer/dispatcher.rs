use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::records::RecordStore;
use super::telemetry::TelemetryGenerator;
use crate::bus::{BusEvent, BusPublisher, BusTransport, PublishError};
use crate::protocol::messages::{
    BusMessage, CommandAction, ControlCommand, QueryKind, QueryRequest, QueryResult,
};
use crate::protocol::Channel;

/// Producer-side responder for control commands and query requests.
///
/// Inbound events are handled one at a time, each to completion
/// (decode happened in the listener; here: handle, then publish the reply)
/// before the next event is taken from the listener's channel.
pub struct Dispatcher<T: BusTransport, S: RecordStore> {
    generator: TelemetryGenerator,
    records: S,
    publisher: BusPublisher<T>,
}

impl<T: BusTransport, S: RecordStore> Dispatcher<T, S> {
    pub fn new(generator: TelemetryGenerator, records: S, publisher: BusPublisher<T>) -> Self {
        Self {
            generator,
            records,
            publisher,
        }
    }

    pub async fn run(&self, events: &mut mpsc::Receiver<BusEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(err) = self.dispatch(event).await {
                error!("dispatch failed: {err}");
            }
        }
    }

    pub async fn dispatch(&self, event: BusEvent) -> Result<(), PublishError> {
        match event {
            BusEvent::Message { channel, message } => self.dispatch_message(channel, message).await,
            BusEvent::Malformed { channel, error } => {
                warn!(%channel, "discarding undecodable message: {error}");
                Ok(())
            }
            BusEvent::ConnectionLost { detail } => {
                error!("bus connection lost: {detail}");
                Ok(())
            }
        }
    }

    async fn dispatch_message(
        &self,
        channel: Channel,
        message: BusMessage,
    ) -> Result<(), PublishError> {
        match (channel, message) {
            (Channel::ControlCommands, BusMessage::ControlCommand(command)) => {
                self.on_command(command).await
            }
            (Channel::QueryRequests, BusMessage::QueryRequest(query)) => {
                self.on_query(query).await
            }
            (channel, message) => {
                warn!(%channel, kind = message.kind(), "unexpected message for this channel");
                Ok(())
            }
        }
    }

    async fn on_command(&self, command: ControlCommand) -> Result<(), PublishError> {
        let ack = match command.action {
            CommandAction::Confirm => {
                info!(issued = %command.timestamp, context = ?command.context, "information confirmed");
                QueryResult::success("confirmation acknowledged")
            }
            CommandAction::Restore => {
                info!(issued = %command.timestamp, "restore request received");
                QueryResult::success("restore acknowledged")
            }
            CommandAction::Other(ref action) => {
                // No error-ack path is defined for unknown commands.
                warn!(action = %action, issued = %command.timestamp, "ignoring unrecognized control action");
                return Ok(());
            }
        };
        self.publisher.publish(&BusMessage::QueryResult(ack)).await?;
        Ok(())
    }

    async fn on_query(&self, query: QueryRequest) -> Result<(), PublishError> {
        match query.query_type {
            QueryKind::DeviceStatus => {
                let batch = {
                    let mut rng = rand::thread_rng();
                    self.generator.snapshot_all(&mut rng)
                };
                info!(
                    devices = batch.records.len(),
                    "answering status query with a fresh snapshot"
                );
                self.publisher
                    .publish(&BusMessage::DeviceStatusBatch(batch))
                    .await?;
            }
            QueryKind::QueryRecords => {
                let records = self.records.recent();
                info!(count = records.len(), "answering record history query");
                let result = QueryResult::with_records("query records returned", records);
                self.publisher
                    .publish(&BusMessage::QueryResult(result))
                    .await?;
            }
            QueryKind::Other(ref kind) => {
                warn!(query_type = %kind, "ignoring unrecognized query type");
            }
        }
        Ok(())
    }
}
