//! Seam to the messaging-protocol library. The gateway only needs a way to
//! open one connection per tenant, a stream of connection events and a handle
//! that can send text and close.

pub mod connector;
pub mod loopback;

pub use connector::{
    Connection, ConnectionEvent, Connector, DisconnectReason, MessageReceipt, ProtocolError,
    ProtocolHandle,
};
pub use loopback::LoopbackConnector;
