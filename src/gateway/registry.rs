use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::{OnceCell, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::session::{SendLimits, Session, SessionExit};
use crate::credentials::CredentialStore;
use crate::errors::GatewayError;
use crate::pairing::PairingStore;
use crate::protocol::{Connection, ConnectionEvent, Connector, DisconnectReason};
use crate::shared_types::{SessionStatus, TenantKey};

// -----------------------------------------------------------------------------
// ----- RegistrySettings ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Delay between a lost connection and the replacement session.
    pub reconnect_delay: Duration,
    pub limits: SendLimits,
}

// -----------------------------------------------------------------------------
// ----- SessionRegistry -------------------------------------------------------

/// Process-wide map from tenant key to its live [`Session`].
///
/// Cloning is cheap; all clones share the same map. At most one session per
/// tenant exists at any time: a slot is reserved under the lock before any
/// slow work starts, and concurrent callers for the same key wait on that
/// slot instead of opening a second connection.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialStore>,
    pairing: PairingStore,
    settings: RegistrySettings,
    next_generation: AtomicU64,
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<TenantKey, Slot>,
    retired: HashMap<TenantKey, Retired>,
    reconnects: HashMap<TenantKey, CancellationToken>,
}

#[derive(Clone)]
struct Slot {
    generation: u64,
    cell: Arc<OnceCell<Arc<Session>>>,
}

/// Last known state of a tenant whose session left the registry.
struct Retired {
    status: SessionStatus,
    error: Option<String>,
}

/// One line of the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub tenant: TenantKey,
    pub status: SessionStatus,
    pub error: Option<String>,

    /// Whether the tenant currently holds a registry entry.
    pub live: bool,
}

enum OpenError {
    /// The slot was released while we were waiting on it; start over.
    Superseded,
    Failed(GatewayError),
}

// -----------------------------------------------------------------------------
// ----- SessionRegistry: Static -----------------------------------------------

impl SessionRegistry {
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialStore>,
        pairing: PairingStore,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState::default()),
                connector,
                credentials,
                pairing,
                settings,
                next_generation: AtomicU64::new(1),
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SessionRegistry: Public -----------------------------------------------

impl SessionRegistry {
    /// Returns the tenant's session, creating it on first use.
    ///
    /// An existing session is returned untouched, whatever its status.
    /// Creation only fails when credentials cannot be loaded or the
    /// connector cannot produce a handle; everything that happens on the
    /// connection afterwards is reported through the session status.
    pub async fn get_or_create(&self, tenant: &TenantKey) -> Result<Arc<Session>, GatewayError> {
        loop {
            let slot = self.reserve(tenant);

            let opened = slot
                .cell
                .get_or_try_init(|| self.open_session(tenant, slot.generation))
                .await;

            match opened {
                Ok(session) => return Ok(session.clone()),
                Err(OpenError::Superseded) => continue,
                Err(OpenError::Failed(err)) => return Err(err),
            }
        }
    }

    /// Looks a session up without creating one.
    pub fn get(&self, tenant: &TenantKey) -> Option<Arc<Session>> {
        let state = self.inner.state.lock();
        state.slots.get(tenant).and_then(|s| s.cell.get().cloned())
    }

    /// Deletes the tenant's registry entry. The session itself is not closed.
    pub fn remove(&self, tenant: &TenantKey) -> Option<Arc<Session>> {
        let slot = self.inner.state.lock().slots.remove(tenant)?;
        slot.cell.get().cloned()
    }

    /// Snapshot of every tenant the registry knows about, sorted by key.
    /// Tenants that left the registry keep their last status.
    pub fn list(&self) -> Vec<SessionReport> {
        let mut reports = {
            let state = self.inner.state.lock();
            let mut reports = Vec::with_capacity(state.slots.len() + state.retired.len());

            for (tenant, slot) in &state.slots {
                let status = slot
                    .cell
                    .get()
                    .map(|s| s.status())
                    .unwrap_or(SessionStatus::Connecting);
                reports.push(SessionReport {
                    tenant: tenant.clone(),
                    status,
                    error: None,
                    live: true,
                });
            }

            for (tenant, retired) in &state.retired {
                if state.slots.contains_key(tenant) {
                    continue;
                }
                reports.push(SessionReport {
                    tenant: tenant.clone(),
                    status: retired.status,
                    error: retired.error.clone(),
                    live: false,
                });
            }

            reports
        };

        reports.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        reports
    }

    pub fn status(&self, tenant: &TenantKey) -> Option<SessionStatus> {
        let state = self.inner.state.lock();
        if let Some(slot) = state.slots.get(tenant) {
            return Some(
                slot.cell
                    .get()
                    .map(|s| s.status())
                    .unwrap_or(SessionStatus::Connecting),
            );
        }
        state.retired.get(tenant).map(|r| r.status)
    }

    /// Number of tenants currently holding a registry entry.
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    pub fn reconnect_pending(&self, tenant: &TenantKey) -> bool {
        self.inner.state.lock().reconnects.contains_key(tenant)
    }

    pub fn pairing(&self) -> &PairingStore {
        &self.inner.pairing
    }
}

// -----------------------------------------------------------------------------
// ----- SessionRegistry: Private ----------------------------------------------

impl SessionRegistry {
    fn reserve(&self, tenant: &TenantKey) -> Slot {
        let mut state = self.inner.state.lock();
        if let Some(slot) = state.slots.get(tenant) {
            return slot.clone();
        }

        let slot = Slot {
            generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed),
            cell: Arc::new(OnceCell::new()),
        };
        state.slots.insert(tenant.clone(), slot.clone());

        // A fresh session makes any pending reconnect for this key redundant.
        if let Some(pending) = state.reconnects.remove(tenant) {
            pending.cancel();
        }

        slot
    }

    fn is_current(&self, tenant: &TenantKey, generation: u64) -> bool {
        let state = self.inner.state.lock();
        state
            .slots
            .get(tenant)
            .is_some_and(|s| s.generation == generation)
    }

    fn release(&self, tenant: &TenantKey, generation: u64) {
        let mut state = self.inner.state.lock();
        if state
            .slots
            .get(tenant)
            .is_some_and(|s| s.generation == generation)
        {
            state.slots.remove(tenant);
        }
    }

    /// Runs while holding the slot's init permit. A failed attempt releases
    /// the slot before the permit is dropped, so waiters on that cell always
    /// see it superseded and reserve a new generation.
    async fn open_session(
        &self,
        tenant: &TenantKey,
        generation: u64,
    ) -> Result<Arc<Session>, OpenError> {
        if !self.is_current(tenant, generation) {
            return Err(OpenError::Superseded);
        }

        info!("creating session for {tenant}");

        match self.connect_session(tenant, generation).await {
            Ok(session) => Ok(session),
            Err(err) => {
                self.release(tenant, generation);
                Err(OpenError::Failed(err))
            }
        }
    }

    async fn connect_session(
        &self,
        tenant: &TenantKey,
        generation: u64,
    ) -> Result<Arc<Session>, GatewayError> {
        let credentials = self.inner.credentials.load(tenant).await.map_err(|source| {
            GatewayError::Credentials {
                tenant: tenant.clone(),
                source,
            }
        })?;

        let Connection { handle, events } = self
            .inner
            .connector
            .connect(tenant, credentials)
            .await
            .map_err(|source| GatewayError::Connect {
                tenant: tenant.clone(),
                source,
            })?;

        let session = Arc::new(Session::new(
            tenant.clone(),
            generation,
            handle,
            self.inner.credentials.clone(),
            self.inner.pairing.clone(),
            self.inner.settings.limits,
        ));

        self.inner.state.lock().retired.remove(tenant);

        tokio::spawn(self.clone().drive(session.clone(), events));

        Ok(session)
    }

    /// Feeds one session's events through its state machine, strictly in
    /// order, then acts on the reason the stream stopped.
    async fn drive(self, session: Arc<Session>, mut events: mpsc::Receiver<ConnectionEvent>) {
        let exit = loop {
            let event = match events.recv().await {
                Some(event) => event,
                None => ConnectionEvent::Closed(DisconnectReason::Lost(
                    "event stream ended".into(),
                )),
            };

            if let Some(exit) = session.apply(event).await {
                break exit;
            }
        };

        session.close().await;
        let tenant = session.tenant().clone();

        match exit {
            SessionExit::Reconnect(_) => {
                if self.retire(&session, None) {
                    self.schedule_reconnect(tenant);
                }
            }
            SessionExit::LoggedOut => {
                // The revoked credentials go before the slot does; until then
                // callers keep getting this logged-out session.
                if let Err(e) = self.inner.credentials.clear(&tenant).await {
                    error!("failed to clear credentials for {tenant}: {e}");
                }
                if self.retire(&session, None) {
                    self.cancel_reconnect(&tenant);
                }
            }
            SessionExit::PersistFailed(reason) => {
                if self.retire(&session, Some(format!("credential persistence failed: {reason}"))) {
                    self.cancel_reconnect(&tenant);
                }
            }
        }
    }

    /// Removes the session's entry if it is still the current one and records
    /// its final status. Returns whether the entry was removed.
    fn retire(&self, session: &Session, error: Option<String>) -> bool {
        let tenant = session.tenant();
        let mut state = self.inner.state.lock();

        let current = state
            .slots
            .get(tenant)
            .is_some_and(|s| s.generation == session.generation());
        if !current {
            return false;
        }

        state.slots.remove(tenant);
        state.retired.insert(
            tenant.clone(),
            Retired {
                status: session.status(),
                error,
            },
        );
        true
    }

    fn schedule_reconnect(&self, tenant: TenantKey) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .inner
            .state
            .lock()
            .reconnects
            .insert(tenant.clone(), token.clone())
        {
            previous.cancel();
        }

        let delay = self.inner.settings.reconnect_delay;
        info!(
            "reconnecting {tenant} in {}",
            humantime::format_duration(delay)
        );

        let registry = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if let Err(e) = registry.get_or_create(&tenant).await {
                warn!("reconnect for {tenant} failed: {e}");
                registry.schedule_reconnect(tenant);
            }
        });
    }

    fn cancel_reconnect(&self, tenant: &TenantKey) {
        if let Some(pending) = self.inner.state.lock().reconnects.remove(tenant) {
            pending.cancel();
        }
    }
}
