//! Connection state of the primary control link
//!
//! The state is derived from the health monitor's fields rather than stored
//! separately, so "Failed" can never disagree with the attempt counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Connection state shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Backend unreachable or hardware offline, not currently retrying
    #[default]
    Disconnected,
    /// Reconnection attempts in progress
    Reconnecting,
    /// Last status fetch succeeded and reported the hardware connected
    Connected,
    /// Attempts exhausted; waiting for the cooldown to elapse
    Failed,
}

impl ConnectionState {
    /// Short label for status displays
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Reconnecting => "Reconnecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed, retrying after cooldown",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the reconnection bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Whether the last status fetch reported the hardware connected
    pub connected: bool,
    /// Whether the monitor is in reconnection mode
    pub reconnecting: bool,
    /// Reconnection attempts in the current burst
    pub attempts: u32,
    /// Upper bound on attempts per burst
    pub max_attempts: u32,
    /// When the last reconnection attempt was issued
    pub last_attempt: Option<Instant>,
}

impl ConnectionStatus {
    /// Derive the display state
    pub fn state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else if self.attempts >= self.max_attempts {
            ConnectionState::Failed
        } else if self.reconnecting {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Disconnected
        }
    }
}
