use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::timeout};
use tracing::{error, info, warn};

use crate::credentials::CredentialStore;
use crate::errors::GatewayError;
use crate::pairing::PairingStore;
use crate::protocol::{ConnectionEvent, DisconnectReason, MessageReceipt, ProtocolHandle};
use crate::shared_types::{SessionStatus, TenantKey};

// -----------------------------------------------------------------------------
// ----- SendLimits ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendLimits {
    /// How long a send waits for a `connecting`/`reconnecting` session.
    pub ready_timeout: Duration,

    /// Upper bound on a single protocol send.
    pub send_timeout: Duration,
}

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

/// One tenant's protocol connection and the status derived from its events.
///
/// The status only changes inside [`Session::apply`], which the registry's
/// per-session driver calls one event at a time.
pub struct Session {
    tenant: TenantKey,
    generation: u64,
    handle: Arc<dyn ProtocolHandle>,
    status: watch::Sender<SessionStatus>,
    credentials: Arc<dyn CredentialStore>,
    pairing: PairingStore,
    limits: SendLimits,
}

/// Why a session's event stream stopped being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionExit {
    Reconnect(DisconnectReason),
    LoggedOut,
    PersistFailed(String),
}

// -----------------------------------------------------------------------------
// ----- Session: Static -------------------------------------------------------

impl Session {
    pub(crate) fn new(
        tenant: TenantKey,
        generation: u64,
        handle: Arc<dyn ProtocolHandle>,
        credentials: Arc<dyn CredentialStore>,
        pairing: PairingStore,
        limits: SendLimits,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Connecting);
        Self {
            tenant,
            generation,
            handle,
            status,
            credentials,
            pairing,
            limits,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Session: Public -------------------------------------------------------

impl Session {
    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Sends `text` to an already normalized recipient address.
    ///
    /// A session that is still coming up gets `ready_timeout` to reach
    /// `connected`; after that the send is attempted regardless and the
    /// protocol layer decides. The send itself is bounded by `send_timeout`.
    pub async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<MessageReceipt, GatewayError> {
        if matches!(
            self.status(),
            SessionStatus::Connecting | SessionStatus::Reconnecting
        ) {
            self.wait_connected(self.limits.ready_timeout).await;
        }

        match timeout(self.limits.send_timeout, self.handle.send_text(recipient, text)).await {
            Ok(Ok(receipt)) => {
                info!("message {} sent to {recipient} ({})", receipt.id, self.tenant);
                Ok(receipt)
            }
            Ok(Err(source)) => Err(GatewayError::Send {
                recipient: recipient.to_string(),
                source,
            }),
            Err(_) => Err(GatewayError::SendTimeout {
                recipient: recipient.to_string(),
                after: self.limits.send_timeout,
            }),
        }
    }

    /// Waits until the session reports `connected`. Returns whether it did.
    pub async fn wait_connected(&self, within: Duration) -> bool {
        let mut rx = self.subscribe();
        matches!(
            timeout(within, rx.wait_for(|s| *s == SessionStatus::Connected)).await,
            Ok(Ok(_))
        )
    }

    pub async fn close(&self) {
        self.handle.close().await;
    }
}

// -----------------------------------------------------------------------------
// ----- Session: Event handling -----------------------------------------------

impl Session {
    /// Applies one connection event. Returns `Some` once the session has
    /// reached a state in which its event stream must no longer be consumed.
    pub(crate) async fn apply(&self, event: ConnectionEvent) -> Option<SessionExit> {
        match event {
            ConnectionEvent::PairingChallenge(data) => {
                info!("pairing challenge issued for {}", self.tenant);
                self.set_status(SessionStatus::PendingQr);
                let _ = self.pairing.set(&self.tenant, data).await;
                None
            }

            ConnectionEvent::Open => {
                self.pairing.clear(&self.tenant).await;
                self.set_status(SessionStatus::Connected);
                info!("session for {} connected", self.tenant);
                None
            }

            ConnectionEvent::Closed(reason) if reason.is_logout() => {
                self.pairing.clear(&self.tenant).await;
                self.set_status(SessionStatus::LoggedOut);
                warn!("session for {} logged out remotely", self.tenant);
                Some(SessionExit::LoggedOut)
            }

            ConnectionEvent::Closed(reason) => {
                self.set_status(SessionStatus::Reconnecting);
                warn!("session for {} closed ({reason}), will reconnect", self.tenant);
                Some(SessionExit::Reconnect(reason))
            }

            ConnectionEvent::CredentialsUpdated(bundle) => {
                match self.credentials.save(&self.tenant, &bundle).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!("failed to persist credentials for {}: {e}", self.tenant);
                        self.pairing.clear(&self.tenant).await;
                        self.set_status(SessionStatus::LoggedOut);
                        Some(SessionExit::PersistFailed(e.to_string()))
                    }
                }
            }
        }
    }

    fn set_status(&self, status: SessionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            info!("{}: {previous} -> {status}", self.tenant);
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
