use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::protocol::Channel;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unreachable at {host}:{port}: {detail}")]
    Connection {
        host: String,
        port: u16,
        detail: String,
    },
    #[error("liveness check against {host}:{port} timed out after {timeout:?}")]
    LivenessTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },
    #[error("publish on {channel} failed: {detail}")]
    Publish { channel: Channel, detail: String },
}

/// Publish side of the bus. The listener owns its own connection; this trait
/// only covers the outbound path, so tests can substitute an in-memory bus.
pub trait BusTransport: Send + Sync {
    fn publish(
        &self,
        channel: Channel,
        payload: String,
    ) -> impl Future<Output = Result<(), BusError>> + Send;
}

impl<T> BusTransport for Arc<T>
where
    T: BusTransport + Send + Sync,
{
    async fn publish(&self, channel: Channel, payload: String) -> Result<(), BusError> {
        self.as_ref().publish(channel, payload).await
    }
}

#[derive(Clone, Debug)]
pub struct TransportOptions {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub queue_size: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8899,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            queue_size: 100,
        }
    }
}

/// Drive the event loop until the broker acknowledges the connection. This is
/// the liveness check: it either proves the bus is reachable or fails fast.
pub(crate) async fn await_connack(
    eventloop: &mut EventLoop,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<(), BusError> {
    let acked = tokio::time::timeout(timeout, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                Ok(event) => trace!(?event, "pre-ack bus event"),
                Err(err) => return Err(err.to_string()),
            }
        }
    })
    .await;

    match acked {
        Ok(Ok(())) => Ok(()),
        Ok(Err(detail)) => Err(BusError::Connection {
            host: host.to_string(),
            port,
            detail,
        }),
        Err(_) => Err(BusError::LivenessTimeout {
            host: host.to_string(),
            port,
            timeout,
        }),
    }
}

/// Publisher-side bus connection. The returned task drives the connection
/// until the process exits or the connection drops; per the protocol's
/// failure semantics a dropped connection is not re-established here.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    pub async fn connect(
        tag: &str,
        options: &TransportOptions,
    ) -> Result<(Self, JoinHandle<()>), BusError> {
        let client_id = format!("fleet-monitor-{}-{}", tag, Uuid::new_v4());
        let mut mqttoptions = MqttOptions::new(client_id, &options.host, options.port);
        mqttoptions.set_clean_session(true);
        mqttoptions.set_keep_alive(options.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, options.queue_size);
        await_connack(&mut eventloop, &options.host, options.port, options.connect_timeout)
            .await?;
        debug!(host = %options.host, port = options.port, "publisher connection established");

        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(event) => trace!(?event, "publisher bus event"),
                    Err(err) => {
                        error!("publisher connection lost: {err}");
                        break;
                    }
                }
            }
        });

        Ok((Self { client }, driver))
    }
}

impl BusTransport for MqttTransport {
    async fn publish(&self, channel: Channel, payload: String) -> Result<(), BusError> {
        self.client
            .publish(channel.as_str(), QoS::AtMostOnce, false, payload)
            .await
            .map_err(|err| BusError::Publish {
                channel,
                detail: err.to_string(),
            })
    }
}
