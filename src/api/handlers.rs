use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::UNIX_EPOCH;
use tracing::error;

use super::{ApiState, address, error::ErrorBody, status_page};
use crate::errors::GatewayError;
use crate::gateway::SessionReport;
use crate::shared_types::{SessionStatus, TenantKey};

// -----------------------------------------------------------------------------
// ----- Request / Response bodies ---------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub number: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageAck {
    pub success: bool,
    pub message: &'static str,
    pub tenant: TenantKey,
    pub recipient: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub active_sessions: usize,
    pub sessions: Vec<StatusEntry>,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct StatusEntry {
    pub tenant: TenantKey,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PairingBody {
    pub tenant: TenantKey,
    pub challenge: String,
    pub issued_at: u64,
}

// -----------------------------------------------------------------------------
// ----- GET / and GET /status -------------------------------------------------

pub async fn status(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let reports = state.registry.list();
    let active = reports.iter().filter(|r| r.live).count();

    if wants_json(&headers) {
        let body = StatusBody {
            active_sessions: active,
            sessions: reports.into_iter().map(StatusEntry::from).collect(),
            port: state.port,
        };
        return Json(body).into_response();
    }

    Html(status_page::render(&reports, active, state.port)).into_response()
}

impl From<SessionReport> for StatusEntry {
    fn from(report: SessionReport) -> Self {
        Self {
            tenant: report.tenant,
            status: report.status,
            error: report.error,
        }
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

// -----------------------------------------------------------------------------
// ----- POST /v1/messages -----------------------------------------------------

pub async fn send_message(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tenant = state.tenant_from(&headers);

    match deliver(&state, &tenant, &body).await {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => {
            error!("error sending message for {tenant}: {e}");
            e.into_response()
        }
    }
}

async fn deliver(
    state: &ApiState,
    tenant: &TenantKey,
    body: &[u8],
) -> Result<SendMessageAck, GatewayError> {
    let request: SendMessageRequest = serde_json::from_slice(body)?;

    let session = state.registry.get_or_create(tenant).await?;
    let recipient = address::normalize_recipient(&request.number, &state.address_suffix);
    let receipt = session.send_text(&recipient, &request.message).await?;

    Ok(SendMessageAck {
        success: true,
        message: "message sent",
        tenant: tenant.clone(),
        recipient,
        id: receipt.id,
    })
}

// -----------------------------------------------------------------------------
// ----- GET /v1/pairing -------------------------------------------------------

pub async fn pairing(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let tenant = state.tenant_from(&headers);

    match state.registry.pairing().get(&tenant) {
        Some(challenge) => Json(PairingBody {
            tenant: challenge.tenant,
            challenge: challenge.data,
            issued_at: challenge
                .issued_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!("no pending pairing challenge for {tenant}"))),
        )
            .into_response(),
    }
}

// -----------------------------------------------------------------------------
// ----- Fallback --------------------------------------------------------------

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}
