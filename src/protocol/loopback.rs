use async_trait::async_trait;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    Connection, ConnectionEvent, Connector, MessageReceipt, ProtocolError, ProtocolHandle,
};
use crate::credentials::CredentialBundle;
use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const EVENT_CAPACITY: usize = 16;

const ISSUED_CREDENTIAL_LEN: usize = 32;

// -----------------------------------------------------------------------------
// ----- LoopbackConnector -----------------------------------------------------

/// In-process stand-in for the real protocol library.
///
/// Tenants without credentials get a pairing challenge and are considered
/// paired after `pair_after`; tenants with credentials open straight away.
/// Sends never leave the process, they are logged and acknowledged.
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    client_name: String,
    pair_after: Duration,
}

impl LoopbackConnector {
    pub fn new(client_name: impl Into<String>, pair_after: Duration) -> Self {
        Self {
            client_name: client_name.into(),
            pair_after,
        }
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(
        &self,
        tenant: &TenantKey,
        credentials: CredentialBundle,
    ) -> Result<Connection, ProtocolError> {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let handle = Arc::new(LoopbackHandle {
            tenant: tenant.clone(),
            ready: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        debug!(
            "{} opening loopback connection for {tenant} (paired: {})",
            self.client_name,
            !credentials.is_empty()
        );

        let challenge = credentials
            .is_empty()
            .then(|| format!("{}:{tenant}:{:016x}", self.client_name, rand::random::<u64>()));

        tokio::spawn(drive(handle.clone(), tx, challenge, self.pair_after));

        Ok(Connection {
            handle,
            events: rx,
        })
    }
}

async fn drive(
    handle: Arc<LoopbackHandle>,
    tx: mpsc::Sender<ConnectionEvent>,
    challenge: Option<String>,
    pair_after: Duration,
) {
    if let Some(challenge) = challenge {
        if tx.send(ConnectionEvent::PairingChallenge(challenge)).await.is_err() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(pair_after) => {}
            _ = handle.shutdown.cancelled() => return,
        }

        let issued = rand::random::<[u8; ISSUED_CREDENTIAL_LEN]>().to_vec();
        let bundle = CredentialBundle::from_bytes(issued);
        if tx.send(ConnectionEvent::CredentialsUpdated(bundle)).await.is_err() {
            return;
        }
    }

    handle.ready.store(true, Ordering::Release);
    if tx.send(ConnectionEvent::Open).await.is_err() {
        return;
    }

    // Hold the event stream open until the session closes us.
    handle.shutdown.cancelled().await;
}

// -----------------------------------------------------------------------------
// ----- LoopbackHandle --------------------------------------------------------

#[derive(Debug)]
struct LoopbackHandle {
    tenant: TenantKey,
    ready: AtomicBool,
    shutdown: CancellationToken,
}

#[async_trait]
impl ProtocolHandle for LoopbackHandle {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<MessageReceipt, ProtocolError> {
        if self.shutdown.is_cancelled() {
            return Err(ProtocolError::Closed);
        }
        if !self.ready.load(Ordering::Acquire) {
            return Err(ProtocolError::NotReady);
        }

        let id = format!("{:016X}", rand::random::<u64>());
        info!(
            "loopback delivered {} chars from {} to {recipient} as {id}",
            text.chars().count(),
            self.tenant
        );

        Ok(MessageReceipt { id })
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unpaired_tenant_gets_challenge_then_credentials_then_open() {
        let connector = LoopbackConnector::new("wagate", Duration::from_secs(2));
        let mut conn = connector
            .connect(&TenantKey::new("acme"), CredentialBundle::empty())
            .await
            .unwrap();

        match conn.events.recv().await.unwrap() {
            ConnectionEvent::PairingChallenge(c) => assert!(c.starts_with("wagate:acme:")),
            other => panic!("expected pairing challenge, got {other:?}"),
        }

        let err = conn.handle.send_text("1@x", "hi").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotReady));

        match conn.events.recv().await.unwrap() {
            ConnectionEvent::CredentialsUpdated(b) => assert_eq!(b.len(), ISSUED_CREDENTIAL_LEN),
            other => panic!("expected credentials, got {other:?}"),
        }
        assert!(matches!(conn.events.recv().await.unwrap(), ConnectionEvent::Open));

        let receipt = conn.handle.send_text("1@x", "hi").await.unwrap();
        assert_eq!(receipt.id.len(), 16);
    }

    #[tokio::test]
    async fn paired_tenant_opens_immediately_and_close_ends_stream() {
        let connector = LoopbackConnector::new("wagate", Duration::from_secs(60));
        let mut conn = connector
            .connect(
                &TenantKey::new("acme"),
                CredentialBundle::from_bytes(b"stored".to_vec()),
            )
            .await
            .unwrap();

        assert!(matches!(conn.events.recv().await.unwrap(), ConnectionEvent::Open));

        conn.handle.close().await;
        assert!(conn.events.recv().await.is_none());

        let err = conn.handle.send_text("1@x", "hi").await.unwrap_err();
        assert!(matches!(err, ProtocolError::Closed));
    }
}
