pub mod cli;
pub mod config;
pub mod gateway_file;
pub mod types;

pub use cli::CliConfig;
pub use config::Config;
pub use gateway_file::{ApiSettings, ClientSettings, ConfigFileError, GatewayFile, SessionSettings};
pub use types::LogLevel;
