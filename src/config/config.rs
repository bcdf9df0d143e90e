use parking_lot::RwLock;
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use super::{
    cli::CliConfig,
    gateway_file::{ApiSettings, ClientSettings, GatewayFile, SessionSettings},
    types::LogLevel,
};
use crate::gateway::{RegistrySettings, SendLimits};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: LogLevel,
    pub sessions_dir: PathBuf,
    pub sessions: SessionSettings,
    pub api: ApiSettings,
    pub client: ClientSettings,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Async because the optional config file is read with non-blocking IO.
    pub async fn init() {
        CliConfig::init();

        Self::load().await;
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }

    pub fn from_parts(cli: CliConfig, file: GatewayFile) -> Config {
        Config {
            listen_addr: cli.listen_addr,
            log_level: cli.log_level,
            sessions_dir: cli.sessions_dir,
            sessions: file.sessions,
            api: file.api,
            client: file.client,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Public --------------------------------------------------------

impl Config {
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            reconnect_delay: self.sessions.reconnect_delay,
            limits: SendLimits {
                ready_timeout: self.sessions.ready_timeout,
                send_timeout: self.sessions.send_timeout,
            },
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    async fn load() {
        let cli = CliConfig::snapshot();

        let file = match &cli.config_file_location {
            Some(path) => GatewayFile::from_file_async(path)
                .await
                .unwrap_or_else(|e| panic!("failed to load config from {:?}: {e}", path)),
            None => GatewayFile::default(),
        };

        let config = Self::from_parts(cli, file);

        let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(config)));
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
