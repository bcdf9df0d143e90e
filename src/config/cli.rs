use clap::Parser;
use parking_lot::RwLock;
use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub listen_addr: SocketAddr,
    pub config_file_location: Option<PathBuf>,
    pub sessions_dir: PathBuf,
    pub log_level: LogLevel,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT)),
            config_file_location: None,
            sessions_dir: PathBuf::from(DEFAULT_SESSIONS_DIR),
            log_level: LogLevel::Info,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        let args = Args::try_parse().unwrap_or_else(|e| panic!("Invalid CLI/ENV: {e}"));
        Self::from(args)
    }

    fn validate(&self) {
        if let Some(path) = &self.config_file_location {
            must_exist_file(path, "--config / WAGATE_CONFIG_FILE");
        }
    }
}

impl From<Args> for CliConfig {
    fn from(args: Args) -> Self {
        Self {
            listen_addr: SocketAddr::from((args.host, args.port)),
            config_file_location: args.config_file,
            sessions_dir: args.sessions_dir,
            log_level: args.log_level,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

const DEFAULT_PORT: u16 = 3008;
const DEFAULT_SESSIONS_DIR: &str = "sessions";

#[derive(Parser, Debug)]
#[command(name = "wagate", version, about = "Multi-tenant messaging gateway")]
struct Args {
    // IPv4 or IPv6 literal (e.g., 0.0.0.0, 127.0.0.1, ::, ::1).
    #[arg(long = "host", short = 'H', env = "WAGATE_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long = "port", short = 'p', env = "WAGATE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", value_enum, default_value = "info")]
    log_level: LogLevel,

    // Optional; must exist when given.
    #[arg(long = "config", env = "WAGATE_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    // Credential directories and pairing artifacts live here.
    #[arg(long = "sessions-dir", env = "WAGATE_SESSIONS_DIR", default_value = DEFAULT_SESSIONS_DIR)]
    sessions_dir: PathBuf,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("config not initialized; call Config::init().await first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_3008() {
        let args = Args::try_parse_from(["wagate"]).unwrap();
        let cfg = CliConfig::from(args);
        assert_eq!(cfg.listen_addr.port(), 3008);
        assert_eq!(cfg.sessions_dir, PathBuf::from("sessions"));
        assert!(cfg.config_file_location.is_none());
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "wagate",
            "--host",
            "127.0.0.1",
            "-p",
            "9000",
            "--log",
            "debug",
            "--sessions-dir",
            "/var/lib/wagate",
        ])
        .unwrap();
        let cfg = CliConfig::from(args);
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.sessions_dir, PathBuf::from("/var/lib/wagate"));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
