use async_trait::async_trait;
use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use super::{CredentialBundle, CredentialError, CredentialStore};
use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const BUNDLE_FILE: &str = "creds.bin";

// -----------------------------------------------------------------------------
// ----- FileCredentialStore ---------------------------------------------------

/// One directory per tenant under `root`, holding a single `creds.bin`.
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a reader never observes a half-written bundle.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn tenant_dir(&self, tenant: &TenantKey) -> PathBuf {
        self.root.join(tenant.storage_name())
    }

    fn bundle_path(&self, tenant: &TenantKey) -> PathBuf {
        self.tenant_dir(tenant).join(BUNDLE_FILE)
    }
}

// -----------------------------------------------------------------------------
// ----- FileCredentialStore: CredentialStore ----------------------------------

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, tenant: &TenantKey) -> Result<CredentialBundle, CredentialError> {
        let dir = self.tenant_dir(tenant);
        fs::create_dir_all(&dir).await.map_err(|e| CredentialError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let path = self.bundle_path(tenant);
        match fs::read(&path).await {
            Ok(data) => {
                debug!("loaded {} credential bytes for {tenant}", data.len());
                Ok(CredentialBundle::from_bytes(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CredentialBundle::empty()),
            Err(e) => Err(CredentialError::Io { path, source: e }),
        }
    }

    async fn save(
        &self,
        tenant: &TenantKey,
        bundle: &CredentialBundle,
    ) -> Result<(), CredentialError> {
        let dir = self.tenant_dir(tenant);
        let path = self.bundle_path(tenant);
        let data = bundle.expose().to_vec();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &data))
            .await
            .map_err(|e| CredentialError::Background(e.to_string()))?
    }

    async fn clear(&self, tenant: &TenantKey) -> Result<(), CredentialError> {
        let dir = self.tenant_dir(tenant);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CredentialError::Io {
                path: dir,
                source: e,
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> Result<(), CredentialError> {
    let io_err = |source: std::io::Error| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(data).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_for_new_tenant_is_empty_and_creates_dir() {
        let root = TempDir::new().unwrap();
        let store = FileCredentialStore::new(root.path());
        let tenant = TenantKey::new("acme");

        let bundle = store.load(&tenant).await.unwrap();
        assert!(bundle.is_empty());
        assert!(store.tenant_dir(&tenant).is_dir());
    }

    #[tokio::test]
    async fn save_overwrites_and_load_reads_back() {
        let root = TempDir::new().unwrap();
        let store = FileCredentialStore::new(root.path());
        let tenant = TenantKey::new("acme");

        store
            .save(&tenant, &CredentialBundle::from_bytes(b"first".to_vec()))
            .await
            .unwrap();
        store
            .save(&tenant, &CredentialBundle::from_bytes(b"second".to_vec()))
            .await
            .unwrap();

        let bundle = store.load(&tenant).await.unwrap();
        assert_eq!(bundle.expose(), b"second");
    }

    #[tokio::test]
    async fn tenants_do_not_share_locations() {
        let root = TempDir::new().unwrap();
        let store = FileCredentialStore::new(root.path());
        let a = TenantKey::new("a/b");
        let b = TenantKey::new("a b");

        store
            .save(&a, &CredentialBundle::from_bytes(b"alpha".to_vec()))
            .await
            .unwrap();

        assert!(store.load(&b).await.unwrap().is_empty());
        assert_eq!(store.load(&a).await.unwrap().expose(), b"alpha");
        assert!(store.tenant_dir(&a).starts_with(root.path()));
    }

    #[tokio::test]
    async fn clear_forgets_bundle_and_tolerates_missing() {
        let root = TempDir::new().unwrap();
        let store = FileCredentialStore::new(root.path());
        let tenant = TenantKey::new("acme");

        store.clear(&tenant).await.unwrap();
        store
            .save(&tenant, &CredentialBundle::from_bytes(b"x".to_vec()))
            .await
            .unwrap();
        store.clear(&tenant).await.unwrap();

        assert!(store.load(&tenant).await.unwrap().is_empty());
    }
}
