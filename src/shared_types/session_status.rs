use serde::Serialize;
use std::fmt;

// -----------------------------------------------------------------------------
// ----- SessionStatus ---------------------------------------------------------

/// Lifecycle of one tenant session. Only the session's own event handling
/// moves it from one value to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the pairing challenge to be scanned.
    PendingQr,

    /// Initial state until the protocol layer reports anything.
    Connecting,

    Connected,

    /// Connection dropped; a new session is scheduled.
    Reconnecting,

    /// Remote logout (or unrecoverable local failure). Terminal.
    LoggedOut,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::PendingQr => "pending_qr",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Reconnecting => "reconnecting",
            SessionStatus::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
