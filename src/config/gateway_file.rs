use serde::Deserialize;
use std::{path::Path, time::Duration};
use thiserror::Error;
use tokio::fs;

use crate::api::address::DEFAULT_ADDRESS_SUFFIX;
use crate::shared_types::DEFAULT_TENANT;

// -----------------------------------------------------------------------------
// ----- Defaults --------------------------------------------------------------

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3_000);
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_PAIR_AFTER: Duration = Duration::from_secs(30);
const DEFAULT_CLIENT_NAME: &str = "wagate";

// -----------------------------------------------------------------------------
// ----- GatewayFile -----------------------------------------------------------

/// Optional `--config` TOML file. Every table and key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayFile {
    pub sessions: SessionSettings,
    pub api: ApiSettings,
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    #[serde(deserialize_with = "de_duration")]
    pub reconnect_delay: Duration,

    #[serde(deserialize_with = "de_duration")]
    pub ready_timeout: Duration,

    #[serde(deserialize_with = "de_duration")]
    pub send_timeout: Duration,

    /// Loopback backend only: how long an unpaired tenant stays in `pending_qr`.
    #[serde(deserialize_with = "de_duration")]
    pub pair_after: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            pair_after: DEFAULT_PAIR_AFTER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    pub default_tenant: String,
    pub address_suffix: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            default_tenant: DEFAULT_TENANT.to_string(),
            address_suffix: DEFAULT_ADDRESS_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    /// Identity advertised to the protocol layer.
    pub name: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayFile: Static ---------------------------------------------------

impl GatewayFile {
    pub async fn from_file_async(path: &Path) -> Result<GatewayFile, ConfigFileError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigFileError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<GatewayFile, ConfigFileError> {
        let doc: GatewayFile =
            toml::from_str(raw).map_err(|e| ConfigFileError::Toml { source: e })?;
        validate(&doc)?;
        Ok(doc)
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn validate(doc: &GatewayFile) -> Result<(), ConfigFileError> {
    if doc.api.default_tenant.trim().is_empty() {
        return Err(ConfigFileError::InvalidField("api.default_tenant".into()));
    }
    if doc.api.address_suffix.trim().is_empty() || doc.api.address_suffix.contains('@') {
        return Err(ConfigFileError::InvalidField("api.address_suffix".into()));
    }
    if doc.sessions.send_timeout.is_zero() {
        return Err(ConfigFileError::InvalidField("sessions.send_timeout".into()));
    }
    Ok(())
}

/// Accepts integer milliseconds (`3000`) or a humantime string (`"3s"`).
fn de_duration<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error, Unexpected, Visitor};
    use std::fmt;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("integer milliseconds (e.g., 3000) or a duration string (e.g., \"3s\")")
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            if v < 0 {
                return Err(E::invalid_value(Unexpected::Signed(v), &self));
            }
            Ok(Duration::from_millis(v as u64))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            humantime::parse_duration(v).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_any(DurationVisitor)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
