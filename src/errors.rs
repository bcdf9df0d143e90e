use std::time::Duration;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::protocol::ProtocolError;
use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

/// Everything the registry and the HTTP surface can fail with. Every variant is
/// reported to API callers as a 500 carrying the display text.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("failed to load credentials for {tenant}: {source}")]
    Credentials {
        tenant: TenantKey,
        source: CredentialError,
    },

    #[error("failed to open session for {tenant}: {source}")]
    Connect {
        tenant: TenantKey,
        source: ProtocolError,
    },

    #[error("send to {recipient} failed: {source}")]
    Send {
        recipient: String,
        source: ProtocolError,
    },

    #[error(
        "send to {recipient} timed out after {}",
        humantime::format_duration(*.after)
    )]
    SendTimeout { recipient: String, after: Duration },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
