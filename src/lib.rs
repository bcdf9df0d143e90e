pub mod api;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod gateway;
pub mod pairing;
pub mod protocol;
pub mod shared_types;

pub use config::Config;
pub use errors::GatewayError;
pub use gateway::{Session, SessionRegistry};
pub use shared_types::{SessionStatus, TenantKey};
