pub mod channels;
pub mod codec;
pub mod messages;

pub use channels::{Channel, Role, RouteError, UnknownChannel};
pub use codec::{decode, encode, DecodeError};
