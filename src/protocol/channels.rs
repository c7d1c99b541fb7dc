use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::protocol::messages::BusMessage;

/// The five fixed channels of the monitoring protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    DeviceStatus,
    MonitoringData,
    ControlCommands,
    QueryRequests,
    QueryResults,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::DeviceStatus,
        Channel::MonitoringData,
        Channel::ControlCommands,
        Channel::QueryRequests,
        Channel::QueryResults,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::DeviceStatus => "device_status",
            Channel::MonitoringData => "monitoring_data",
            Channel::ControlCommands => "control_commands",
            Channel::QueryRequests => "query_requests",
            Channel::QueryResults => "query_results",
        }
    }

    /// The role allowed to publish on this channel.
    pub fn publisher(self) -> Role {
        match self {
            Channel::DeviceStatus | Channel::MonitoringData | Channel::QueryResults => {
                Role::Producer
            }
            Channel::ControlCommands | Channel::QueryRequests => Role::Console,
        }
    }

    /// Canonical channel for a message kind.
    pub fn for_message(message: &BusMessage) -> Channel {
        match message {
            BusMessage::DeviceStatusBatch(_) => Channel::DeviceStatus,
            BusMessage::MonitoringSample(_) => Channel::MonitoringData,
            BusMessage::ControlCommand(_) => Channel::ControlCommands,
            BusMessage::QueryRequest(_) => Channel::QueryRequests,
            BusMessage::QueryResult(_) => Channel::QueryResults,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == name)
            .ok_or_else(|| UnknownChannel(name.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Producer,
    Console,
}

impl Role {
    /// The channel set a role listens on.
    pub fn subscriptions(self) -> &'static [Channel] {
        match self {
            Role::Producer => &[Channel::ControlCommands, Channel::QueryRequests],
            Role::Console => &[
                Channel::MonitoringData,
                Channel::DeviceStatus,
                Channel::QueryResults,
            ],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Producer => "producer",
            Role::Console => "console",
        })
    }
}

#[derive(Debug, Error)]
#[error("unknown channel name: {0}")]
pub struct UnknownChannel(pub String);

/// A publish attempt on a channel the role does not own. This is a
/// programming error on the caller's side; the message is never re-routed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("role {role} may not publish on channel {channel}")]
pub struct RouteError {
    pub channel: Channel,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{BusMessage, CommandAction, ControlCommand};

    #[test]
    fn channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!("telemetry".parse::<Channel>().is_err());
    }

    #[test]
    fn publisher_roles_follow_the_protocol_table() {
        assert_eq!(Channel::DeviceStatus.publisher(), Role::Producer);
        assert_eq!(Channel::MonitoringData.publisher(), Role::Producer);
        assert_eq!(Channel::QueryResults.publisher(), Role::Producer);
        assert_eq!(Channel::ControlCommands.publisher(), Role::Console);
        assert_eq!(Channel::QueryRequests.publisher(), Role::Console);
    }

    #[test]
    fn commands_route_to_the_command_channel() {
        let message =
            BusMessage::ControlCommand(ControlCommand::issued_now(CommandAction::Confirm, None));
        assert_eq!(Channel::for_message(&message), Channel::ControlCommands);
    }

    #[test]
    fn roles_subscribe_to_disjoint_channel_sets() {
        for channel in Role::Producer.subscriptions() {
            assert!(!Role::Console.subscriptions().contains(channel));
        }
    }
}
