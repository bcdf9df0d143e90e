//! Session orchestration: one protocol session per tenant and the registry
//! that owns them. Protocol specifics stay behind `crate::protocol`.

pub mod registry;
pub mod session;

pub use registry::{RegistrySettings, SessionRegistry, SessionReport};
pub use session::{SendLimits, Session};
