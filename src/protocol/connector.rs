use async_trait::async_trait;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::credentials::CredentialBundle;
use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- Connector -------------------------------------------------------------

/// Opens protocol connections. Connecting only establishes the handle and its
/// event stream; whether the connection ever becomes usable is reported
/// later through [`ConnectionEvent`]s.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        tenant: &TenantKey,
        credentials: CredentialBundle,
    ) -> Result<Connection, ProtocolError>;
}

/// A freshly opened connection: the handle used for sending plus the ordered
/// stream of events for this connection only.
pub struct Connection {
    pub handle: Arc<dyn ProtocolHandle>,
    pub events: mpsc::Receiver<ConnectionEvent>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ----- ProtocolHandle --------------------------------------------------------

#[async_trait]
pub trait ProtocolHandle: Send + Sync + 'static {
    /// Sends a text message to a fully addressed recipient.
    async fn send_text(&self, recipient: &str, text: &str)
    -> Result<MessageReceipt, ProtocolError>;

    /// Tears the connection down. No further events are expected afterwards.
    async fn close(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceipt {
    pub id: String,
}

// -----------------------------------------------------------------------------
// ----- ConnectionEvent -------------------------------------------------------

#[derive(Debug)]
pub enum ConnectionEvent {
    /// A new pairing challenge must be presented out of band.
    PairingChallenge(String),

    /// The connection is authenticated and ready to send.
    Open,

    Closed(DisconnectReason),

    /// The protocol layer rotated its credentials; they must be persisted.
    CredentialsUpdated(CredentialBundle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side revoked this device. Terminal.
    LoggedOut,

    /// Anything else: network drop, stream error, restart request.
    Lost(String),
}

impl DisconnectReason {
    pub fn is_logout(&self) -> bool {
        matches!(self, DisconnectReason::LoggedOut)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::LoggedOut => f.write_str("logged out"),
            DisconnectReason::Lost(reason) => write!(f, "connection lost: {reason}"),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection not ready")]
    NotReady,

    #[error("connection closed")]
    Closed,

    #[error("failed to open connection: {0}")]
    Connect(String),
}
