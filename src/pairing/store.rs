use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::SystemTime};
use tokio::task;
use tracing::{error, info, warn};

use super::{ChallengeRenderer, RenderOutcome};
use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- PairingChallenge ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingChallenge {
    pub tenant: TenantKey,
    pub data: String,
    pub issued_at: SystemTime,
}

// -----------------------------------------------------------------------------
// ----- PairingStore ----------------------------------------------------------

/// Holds at most one pending challenge per tenant. A newer challenge replaces
/// the older one outright.
#[derive(Clone)]
pub struct PairingStore {
    challenges: Arc<Mutex<HashMap<TenantKey, PairingChallenge>>>,
    renderer: Arc<dyn ChallengeRenderer>,
}

impl PairingStore {
    pub fn new(renderer: Arc<dyn ChallengeRenderer>) -> Self {
        Self {
            challenges: Arc::new(Mutex::new(HashMap::new())),
            renderer,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PairingStore: Public --------------------------------------------------

impl PairingStore {
    /// Stores `data` as the tenant's current challenge and renders it on the
    /// blocking pool. The render outcome is informational; callers may ignore it.
    pub async fn set(&self, tenant: &TenantKey, data: impl Into<String>) -> RenderOutcome {
        let challenge = PairingChallenge {
            tenant: tenant.clone(),
            data: data.into(),
            issued_at: SystemTime::now(),
        };
        let rendered_from = challenge.data.clone();

        self.challenges.lock().insert(tenant.clone(), challenge);

        let renderer = self.renderer.clone();
        let key = tenant.clone();
        let outcome = task::spawn_blocking(move || renderer.render(&key, &rendered_from))
            .await
            .unwrap_or_else(|e| RenderOutcome::Failed(format!("render task failed: {e}")));

        match &outcome {
            RenderOutcome::Rendered(path) => {
                info!("pairing challenge for {tenant} written to {}", path.display())
            }
            RenderOutcome::Skipped => info!("pairing challenge issued for {tenant}"),
            RenderOutcome::Failed(reason) => {
                error!("failed to render pairing challenge for {tenant}: {reason}")
            }
        }
        outcome
    }

    pub async fn clear(&self, tenant: &TenantKey) -> Option<PairingChallenge> {
        let removed = self.challenges.lock().remove(tenant)?;

        let renderer = self.renderer.clone();
        let key = tenant.clone();
        if let Err(e) = task::spawn_blocking(move || renderer.discard(&key)).await {
            warn!("failed to discard pairing artifact for {tenant}: {e}");
        }

        Some(removed)
    }

    pub fn get(&self, tenant: &TenantKey) -> Option<PairingChallenge> {
        self.challenges.lock().get(tenant).cloned()
    }

    pub fn len(&self) -> usize {
        self.challenges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::{NullRenderer, QrSvgRenderer};

    #[derive(Default)]
    struct Recording {
        rendered: Mutex<Vec<String>>,
        discarded: Mutex<Vec<TenantKey>>,
    }

    impl ChallengeRenderer for Recording {
        fn render(&self, _tenant: &TenantKey, challenge: &str) -> RenderOutcome {
            self.rendered.lock().push(challenge.to_string());
            RenderOutcome::Failed("disk full".into())
        }

        fn discard(&self, tenant: &TenantKey) {
            self.discarded.lock().push(tenant.clone());
        }
    }

    #[tokio::test]
    async fn newer_challenge_replaces_older() {
        let store = PairingStore::new(Arc::new(NullRenderer));
        let tenant = TenantKey::new("acme");

        store.set(&tenant, "first").await;
        store.set(&tenant, "second").await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&tenant).unwrap().data, "second");
    }

    #[tokio::test]
    async fn render_failure_still_stores_challenge() {
        let renderer = Arc::new(Recording::default());
        let store = PairingStore::new(renderer.clone());
        let tenant = TenantKey::new("acme");

        let outcome = store.set(&tenant, "abc").await;
        assert_eq!(outcome, RenderOutcome::Failed("disk full".into()));
        assert_eq!(store.get(&tenant).unwrap().data, "abc");
        assert_eq!(renderer.rendered.lock().as_slice(), ["abc".to_string()]);
    }

    #[tokio::test]
    async fn clear_removes_and_discards_only_when_present() {
        let renderer = Arc::new(Recording::default());
        let store = PairingStore::new(renderer.clone());
        let tenant = TenantKey::new("acme");

        assert!(store.clear(&tenant).await.is_none());
        assert!(renderer.discarded.lock().is_empty());

        store.set(&tenant, "abc").await;
        assert_eq!(store.clear(&tenant).await.unwrap().data, "abc");
        assert!(store.get(&tenant).is_none());
        assert_eq!(renderer.discarded.lock().len(), 1);
    }

    #[tokio::test]
    async fn svg_artifact_follows_the_challenge() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = Arc::new(QrSvgRenderer::new(dir.path()));
        let store = PairingStore::new(renderer.clone());
        let tenant = TenantKey::new("acme");

        let outcome = store.set(&tenant, "2@abc").await;
        assert_eq!(outcome, RenderOutcome::Rendered(renderer.artifact_path(&tenant)));
        assert!(renderer.artifact_path(&tenant).is_file());

        store.clear(&tenant).await;
        assert!(!renderer.artifact_path(&tenant).exists());
    }
}
