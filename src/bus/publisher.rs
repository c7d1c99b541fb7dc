use thiserror::Error;
use tracing::debug;

use super::transport::{BusError, BusTransport};
use crate::protocol::messages::BusMessage;
use crate::protocol::{codec, Channel, Role, RouteError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("message could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Role-checked publish path. Every message goes out on its canonical
/// channel; a wrong-role publish is rejected, never re-routed.
pub struct BusPublisher<T: BusTransport> {
    transport: T,
    role: Role,
}

impl<T: BusTransport> BusPublisher<T> {
    pub fn new(transport: T, role: Role) -> Self {
        Self { transport, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub async fn publish(&self, message: &BusMessage) -> Result<Channel, PublishError> {
        let channel = Channel::for_message(message);
        if channel.publisher() != self.role {
            return Err(RouteError {
                channel,
                role: self.role,
            }
            .into());
        }
        let payload = codec::encode(message)?;
        self.transport.publish(channel, payload).await?;
        debug!(%channel, kind = message.kind(), "published");
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bus::local::LocalBus;
    use crate::protocol::messages::{CommandAction, ControlCommand, DeviceStatusBatch};

    #[tokio::test]
    async fn console_may_not_publish_telemetry() {
        let publisher = BusPublisher::new(Arc::new(LocalBus::new()), Role::Console);
        let batch = BusMessage::DeviceStatusBatch(DeviceStatusBatch { records: vec![] });
        let err = publisher.publish(&batch).await.expect_err("wrong role");
        assert!(matches!(
            err,
            PublishError::Route(RouteError {
                channel: Channel::DeviceStatus,
                role: Role::Console,
            })
        ));
    }

    #[tokio::test]
    async fn commands_go_out_on_their_canonical_channel() {
        let bus = Arc::new(LocalBus::new());
        let mut sub = bus.subscribe(Channel::ControlCommands);
        let publisher = BusPublisher::new(bus.clone(), Role::Console);
        let command =
            BusMessage::ControlCommand(ControlCommand::issued_now(CommandAction::Confirm, None));

        let channel = publisher.publish(&command).await.expect("publish ok");
        assert_eq!(channel, Channel::ControlCommands);

        let frame = sub.recv().await.expect("frame delivered");
        assert_eq!(frame.channel, Channel::ControlCommands);
        assert_eq!(codec::decode(&frame.payload).unwrap(), command);
    }
}
