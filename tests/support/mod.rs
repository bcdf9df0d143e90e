use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{sync::mpsc, time::sleep};

use wagate::credentials::{
    CredentialBundle, CredentialError, CredentialStore, FileCredentialStore,
};
use wagate::gateway::{RegistrySettings, SendLimits};
use wagate::pairing::{NullRenderer, PairingStore};
use wagate::protocol::{
    Connection, ConnectionEvent, Connector, DisconnectReason, MessageReceipt, ProtocolError,
    ProtocolHandle,
};
use wagate::{SessionRegistry, TenantKey};

// -----------------------------------------------------------------------------
// ----- ScriptedConnector -----------------------------------------------------

/// Connector whose connections do nothing until the test pushes events into
/// them through the recorded [`ScriptedLink`]s.
#[derive(Default)]
pub struct ScriptedConnector {
    pub connect_delay: Duration,
    pub auto_open: bool,
    failures_left: AtomicUsize,
    connects: AtomicUsize,
    links: Mutex<Vec<Arc<ScriptedLink>>>,
}

#[allow(dead_code)]
impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn auto_open(mut self) -> Self {
        self.auto_open = true;
        self
    }

    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn links(&self, tenant: &str) -> Vec<Arc<ScriptedLink>> {
        self.links
            .lock()
            .iter()
            .filter(|l| l.tenant.as_str() == tenant)
            .cloned()
            .collect()
    }

    /// Drops every recorded link, closing their event streams.
    pub fn drop_links(&self) {
        self.links.lock().clear();
    }

    pub fn last_link(&self, tenant: &str) -> Arc<ScriptedLink> {
        self.links(tenant)
            .pop()
            .unwrap_or_else(|| panic!("no connection opened for {tenant}"))
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        tenant: &TenantKey,
        credentials: CredentialBundle,
    ) -> Result<Connection, ProtocolError> {
        if !self.connect_delay.is_zero() {
            sleep(self.connect_delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProtocolError::Connect("scripted failure".into()));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        let handle = Arc::new(ScriptedHandle::default());
        let link = Arc::new(ScriptedLink {
            tenant: tenant.clone(),
            credentials: credentials.expose().to_vec(),
            handle: handle.clone(),
            events: tx,
        });

        if self.auto_open {
            link.open().await;
        }

        self.links.lock().push(link);

        Ok(Connection { handle, events: rx })
    }
}

// -----------------------------------------------------------------------------
// ----- ScriptedLink ----------------------------------------------------------

pub struct ScriptedLink {
    pub tenant: TenantKey,
    pub credentials: Vec<u8>,
    pub handle: Arc<ScriptedHandle>,
    events: mpsc::Sender<ConnectionEvent>,
}

#[allow(dead_code)]
impl ScriptedLink {
    pub async fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event).await;
    }

    pub async fn open(&self) {
        self.handle.ready.store(true, Ordering::SeqCst);
        self.emit(ConnectionEvent::Open).await;
    }

    pub async fn challenge(&self, data: &str) {
        self.emit(ConnectionEvent::PairingChallenge(data.to_string()))
            .await;
    }

    pub async fn rotate_credentials(&self, data: &[u8]) {
        self.emit(ConnectionEvent::CredentialsUpdated(
            CredentialBundle::from_bytes(data.to_vec()),
        ))
        .await;
    }

    pub async fn lose(&self) {
        self.handle.ready.store(false, Ordering::SeqCst);
        self.emit(ConnectionEvent::Closed(DisconnectReason::Lost(
            "stream errored".into(),
        )))
        .await;
    }

    pub async fn logout(&self) {
        self.handle.ready.store(false, Ordering::SeqCst);
        self.emit(ConnectionEvent::Closed(DisconnectReason::LoggedOut))
            .await;
    }
}

// -----------------------------------------------------------------------------
// ----- ScriptedHandle --------------------------------------------------------

#[derive(Default)]
pub struct ScriptedHandle {
    pub ready: AtomicBool,
    pub closed: AtomicBool,
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ProtocolHandle for ScriptedHandle {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<MessageReceipt, ProtocolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProtocolError::Closed);
        }
        if !self.ready.load(Ordering::SeqCst) {
            return Err(ProtocolError::NotReady);
        }

        let mut sent = self.sent.lock();
        sent.push((recipient.to_string(), text.to_string()));
        Ok(MessageReceipt {
            id: format!("MSG-{}", sent.len()),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// ----- Registry helpers ------------------------------------------------------

pub const RECONNECT_DELAY: Duration = Duration::from_millis(3_000);

#[allow(dead_code)]
pub fn settings() -> RegistrySettings {
    RegistrySettings {
        reconnect_delay: RECONNECT_DELAY,
        limits: SendLimits {
            ready_timeout: Duration::from_millis(200),
            send_timeout: Duration::from_secs(1),
        },
    }
}

#[allow(dead_code)]
pub fn registry(connector: Arc<ScriptedConnector>, sessions_dir: &Path) -> SessionRegistry {
    registry_with_store(connector, Arc::new(FileCredentialStore::new(sessions_dir)))
}

#[allow(dead_code)]
pub fn registry_with_store(
    connector: Arc<ScriptedConnector>,
    credentials: Arc<dyn CredentialStore>,
) -> SessionRegistry {
    SessionRegistry::new(
        connector,
        credentials,
        PairingStore::new(Arc::new(NullRenderer)),
        settings(),
    )
}

// -----------------------------------------------------------------------------
// ----- SlowClearStore --------------------------------------------------------

/// File store whose `clear` takes `delay` before touching the disk.
pub struct SlowClearStore {
    pub inner: FileCredentialStore,
    pub delay: Duration,
}

#[async_trait]
impl CredentialStore for SlowClearStore {
    async fn load(&self, tenant: &TenantKey) -> Result<CredentialBundle, CredentialError> {
        self.inner.load(tenant).await
    }

    async fn save(
        &self,
        tenant: &TenantKey,
        bundle: &CredentialBundle,
    ) -> Result<(), CredentialError> {
        self.inner.save(tenant, bundle).await
    }

    async fn clear(&self, tenant: &TenantKey) -> Result<(), CredentialError> {
        sleep(self.delay).await;
        self.inner.clear(tenant).await
    }
}

/// Polls `check` until it holds, failing the test after ~5s of (virtual) time.
#[allow(dead_code)]
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
