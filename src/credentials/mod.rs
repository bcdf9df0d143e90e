//! Durable per-tenant authentication material.

pub mod bundle;
pub mod file_store;

pub use bundle::CredentialBundle;
pub use file_store::FileCredentialStore;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- CredentialStore -------------------------------------------------------

/// Loads and persists one credential bundle per tenant. Storage locations must
/// never collide across tenant keys.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the stored bundle, or an empty one for a tenant never seen
    /// before. Creating the tenant's location is part of loading.
    async fn load(&self, tenant: &TenantKey) -> Result<CredentialBundle, CredentialError>;

    /// Overwrites the stored bundle. Returns once the write is durable.
    async fn save(
        &self,
        tenant: &TenantKey,
        bundle: &CredentialBundle,
    ) -> Result<(), CredentialError>;

    /// Forgets the tenant's bundle so the next load starts from scratch.
    async fn clear(&self, tenant: &TenantKey) -> Result<(), CredentialError>;
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential io error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("credential write task failed: {0}")]
    Background(String),
}
