use thiserror::Error;

use crate::protocol::messages::BusMessage;

/// The payload matched none of the protocol's message shapes. Non-fatal:
/// callers log and discard, then keep processing.
#[derive(Debug, Error)]
#[error("payload does not match any monitoring message shape")]
pub struct DecodeError {
    #[source]
    source: serde_json::Error,
}

/// Canonical UTF-8 text encoding of a message.
pub fn encode(message: &BusMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Strict decode: the payload either fully matches one of the five shapes or
/// is rejected.
pub fn decode(payload: &str) -> Result<BusMessage, DecodeError> {
    serde_json::from_str(payload).map_err(|source| DecodeError { source })
}
