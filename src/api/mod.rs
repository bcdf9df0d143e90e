//! HTTP surface: status page, message sending and pairing lookup. Handlers
//! only ever talk to the [`SessionRegistry`].

pub mod address;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod status_page;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ApiSettings;
use crate::gateway::SessionRegistry;
use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const API_KEY_HEADER: &str = "x-api-key";

// -----------------------------------------------------------------------------
// ----- ApiState --------------------------------------------------------------

#[derive(Clone)]
pub struct ApiState {
    pub registry: SessionRegistry,
    pub default_tenant: TenantKey,
    pub address_suffix: Arc<str>,
    pub port: u16,
}

impl ApiState {
    pub fn new(registry: SessionRegistry, settings: &ApiSettings, port: u16) -> Self {
        Self {
            registry,
            default_tenant: TenantKey::new(&settings.default_tenant),
            address_suffix: Arc::from(settings.address_suffix.as_str()),
            port,
        }
    }

    /// Tenant selected by `X-API-Key`, or the default tenant.
    pub fn tenant_from(&self, headers: &HeaderMap) -> TenantKey {
        let value = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        TenantKey::from_header(value, self.default_tenant.as_str())
    }
}

// -----------------------------------------------------------------------------
// ----- Router ----------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::status).fallback(handlers::not_found),
        )
        .route(
            "/status",
            get(handlers::status).fallback(handlers::not_found),
        )
        .route(
            "/v1/messages",
            post(handlers::send_message).fallback(handlers::not_found),
        )
        .route(
            "/v1/pairing",
            get(handlers::pairing).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn(cors::permissive))
        .layer(TraceLayer::new_for_http())
}
