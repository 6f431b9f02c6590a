//! Connection state machine and its health projection.

use serde::Serialize;
use std::fmt;

/// Lifecycle of one backend connection.
///
/// ```text
/// Uninitialized ──▶ Connecting ──▶ Connected
///       ▲              │  ▲            │
///       │              ▼  │            │
///       │            Failed            │
///       └──────────────────────────────┘  (teardown / reconnect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Whether the supervisor may move from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Uninitialized, Connecting)
                | (Failed, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Uninitialized)
        )
    }

    pub fn health(self) -> HealthStatus {
        match self {
            ConnectionState::Uninitialized => HealthStatus::Disconnected,
            ConnectionState::Connecting => HealthStatus::Connecting,
            ConnectionState::Connected => HealthStatus::Connected,
            ConnectionState::Failed => HealthStatus::Failed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a health-check handler reports for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Connected,
    Disconnected,
    Connecting,
    Failed,
}

impl HealthStatus {
    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Connected
    }
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        state.health()
    }
}
