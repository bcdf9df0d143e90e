pub mod session_status;
pub mod tenant_key;

pub use session_status::SessionStatus;
pub use tenant_key::{DEFAULT_TENANT, TenantKey};
