pub mod listener;
pub mod local;
pub mod publisher;
pub mod transport;

pub use listener::{BusEvent, BusListener, ListenerError, ListenerOptions, ListenerState};
pub use local::{LocalBus, LocalFrame};
pub use publisher::{BusPublisher, PublishError};
pub use transport::{BusError, BusTransport, MqttTransport, TransportOptions};
