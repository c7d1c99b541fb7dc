use std::str::FromStr;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::transport::{await_connack, BusError};
use crate::protocol::messages::BusMessage;
use crate::protocol::{codec, Channel, DecodeError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Connecting,
    Subscribed,
    Draining,
    Stopped,
}

/// Event handed to the consumer. Decode failures are forwarded rather than
/// dropped so the consumer can surface bus-health problems.
#[derive(Debug)]
pub enum BusEvent {
    Message {
        channel: Channel,
        message: BusMessage,
    },
    Malformed {
        channel: Channel,
        error: DecodeError,
    },
    ConnectionLost {
        detail: String,
    },
}

impl BusEvent {
    /// Decode one raw frame into the event delivered to the consumer.
    /// Frames on channels outside the protocol table are dropped.
    pub fn from_frame(topic: &str, payload: &[u8]) -> Option<BusEvent> {
        let channel = match Channel::from_str(topic) {
            Ok(channel) => channel,
            Err(err) => {
                warn!("{err}, dropping frame");
                return None;
            }
        };
        let text = String::from_utf8_lossy(payload);
        match codec::decode(&text) {
            Ok(message) => Some(BusEvent::Message { channel, message }),
            Err(error) => {
                warn!(%channel, payload = %text, "undecodable payload");
                Some(BusEvent::Malformed { channel, error })
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListenerOptions {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub poll_idle: Duration,
    pub queue_size: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8899,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            poll_idle: Duration::from_millis(100),
            queue_size: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Bus(#[from] BusError),
}

struct Running {
    client: AsyncClient,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Subscribing side of the bus. Owns its connection exclusively and runs the
/// receive loop on a dedicated task; decoded events cross back to the
/// consumer as owned values over the mpsc channel handed to `start`.
///
/// After a connection loss the loop stops driving the transport and reports
/// a `ConnectionLost` event on every poll cycle until stopped; reconnecting
/// is an explicit `stop`/`start` by the owner.
pub struct BusListener {
    options: ListenerOptions,
    state: watch::Sender<ListenerState>,
    running: Mutex<Option<Running>>,
}

impl BusListener {
    pub fn new(options: ListenerOptions) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            options,
            state,
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Connect, verify liveness, subscribe, and spawn the receive loop.
    /// Fails without retrying if the bus is unreachable; calling `start` on a
    /// running listener is an error and never spawns a second loop.
    pub async fn start(
        &self,
        channels: &[Channel],
        events: mpsc::Sender<BusEvent>,
    ) -> Result<(), ListenerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ListenerError::AlreadyRunning);
        }

        let _ = self.state.send(ListenerState::Connecting);
        match self.connect_and_subscribe(channels).await {
            Ok((client, eventloop)) => {
                let (stop_tx, stop_rx) = watch::channel(false);
                let handle = tokio::spawn(receive_loop(
                    eventloop,
                    events,
                    stop_rx,
                    self.options.poll_idle,
                ));
                *running = Some(Running {
                    client,
                    stop: stop_tx,
                    handle,
                });
                let _ = self.state.send(ListenerState::Subscribed);
                Ok(())
            }
            Err(err) => {
                let _ = self.state.send(ListenerState::Idle);
                Err(err)
            }
        }
    }

    async fn connect_and_subscribe(
        &self,
        channels: &[Channel],
    ) -> Result<(AsyncClient, EventLoop), ListenerError> {
        let client_id = format!("fleet-monitor-listener-{}", Uuid::new_v4());
        let mut mqttoptions = MqttOptions::new(client_id, &self.options.host, self.options.port);
        mqttoptions.set_clean_session(true);
        mqttoptions.set_keep_alive(self.options.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, self.options.queue_size);
        await_connack(
            &mut eventloop,
            &self.options.host,
            self.options.port,
            self.options.connect_timeout,
        )
        .await?;

        for channel in channels {
            client
                .subscribe(channel.as_str(), QoS::AtMostOnce)
                .await
                .map_err(|err| BusError::Connection {
                    host: self.options.host.clone(),
                    port: self.options.port,
                    detail: err.to_string(),
                })?;
        }
        debug!(?channels, "subscribed");
        Ok((client, eventloop))
    }

    /// Signal the receive loop, join it, and release the connection. Safe to
    /// call from any context and any number of times; once it returns, no
    /// further event is delivered by this listener.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        let Some(Running {
            client,
            stop,
            handle,
        }) = running
        else {
            return;
        };

        let _ = self.state.send(ListenerState::Draining);
        let _ = stop.send(true);
        if let Err(err) = handle.await {
            warn!("receive loop did not shut down cleanly: {err}");
        }
        // The session is clean, so broker-side subscriptions die with the
        // connection; dropping the client closes it.
        drop(client);
        let _ = self.state.send(ListenerState::Stopped);
        debug!("listener stopped");
    }
}

async fn receive_loop(
    mut eventloop: EventLoop,
    events: mpsc::Sender<BusEvent>,
    mut stop: watch::Receiver<bool>,
    poll_idle: Duration,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => return,
            polled = eventloop.poll() => match polled {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(event) = BusEvent::from_frame(&publish.topic, &publish.payload) {
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    report_lost(err.to_string(), &events, &mut stop, poll_idle).await;
                    return;
                }
            }
        }
    }
}

/// The transport is gone. Keep surfacing that on every poll cycle, with the
/// idle backoff between cycles, until the owner stops the listener.
async fn report_lost(
    detail: String,
    events: &mpsc::Sender<BusEvent>,
    stop: &mut watch::Receiver<bool>,
    poll_idle: Duration,
) {
    loop {
        let event = BusEvent::ConnectionLost {
            detail: detail.clone(),
        };
        if events.send(event).await.is_err() {
            return;
        }
        tokio::select! {
            _ = stop.changed() => return,
            _ = tokio::time::sleep(poll_idle) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_on_unknown_channels_are_dropped_before_decode() {
        assert!(BusEvent::from_frame("telemetry/raw", b"[]").is_none());
    }

    #[test]
    fn malformed_frames_become_error_events() {
        let event = BusEvent::from_frame("monitoring_data", b"{oops").expect("known channel");
        assert!(matches!(
            event,
            BusEvent::Malformed {
                channel: Channel::MonitoringData,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let listener = BusListener::new(ListenerOptions::default());
        listener.stop().await;
        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[tokio::test]
    async fn failed_start_returns_to_idle() {
        // Nothing listens on the discard port; the connection attempt must
        // fail fast instead of hanging.
        let listener = BusListener::new(ListenerOptions {
            host: "127.0.0.1".to_string(),
            port: 9,
            connect_timeout: Duration::from_secs(2),
            ..ListenerOptions::default()
        });
        let (events, _rx) = mpsc::channel(8);
        let err = listener
            .start(&[Channel::MonitoringData], events)
            .await
            .expect_err("no bus is running");
        assert!(matches!(err, ListenerError::Bus(_)));
        assert_eq!(listener.state(), ListenerState::Idle);
    }
}
