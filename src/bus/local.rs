use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::transport::{BusError, BusTransport};
use crate::protocol::Channel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFrame {
    pub channel: Channel,
    pub payload: String,
}

/// Simple in-memory bus for tests and non-transport contexts. Fan-out to
/// zero subscribers succeeds, like publishing on the wire bus.
#[derive(Debug, Default)]
pub struct LocalBus {
    channels: RwLock<HashMap<Channel, broadcast::Sender<LocalFrame>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: Channel) -> broadcast::Sender<LocalFrame> {
        let mut guard = self.channels.write();
        guard
            .entry(channel)
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<LocalFrame> {
        self.sender_for(channel).subscribe()
    }
}

impl BusTransport for LocalBus {
    async fn publish(&self, channel: Channel, payload: String) -> Result<(), BusError> {
        let _ = self.sender_for(channel).send(LocalFrame { channel, payload });
        Ok(())
    }
}
