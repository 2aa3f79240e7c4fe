//! Connection health monitor
//!
//! Tracks whether the control backend reports the hardware connected and
//! drives a bounded reconnection policy:
//!
//! - a status query on every poll tick
//! - while disconnected, one attempt per reconnect tick, at most
//!   `max_attempts` per burst
//! - after a burst is exhausted, no attempt until `cooldown` has passed
//!   since the last one; then a fresh burst starts
//!
//! The monitor performs no I/O. Every transition goes through
//! [`HealthMonitor::update`], which tells the caller which query to issue.

use crate::api::StatusResponse;
use std::time::Duration;
use tokio::time::Instant;
use xytable_core::{ConnectionState, ConnectionStatus, Position, Result};

/// Timing and retry bounds of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Interval between routine status queries
    pub poll_interval: Duration,
    /// Interval between reconnection attempts
    pub reconnect_interval: Duration,
    /// Pause after `max_attempts` failed attempts
    pub cooldown: Duration,
    /// Attempts per burst
    pub max_attempts: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(2),
            cooldown: Duration::from_secs(30),
            max_attempts: 12,
        }
    }
}

/// Which timer requested a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Poll,
    Reconnect,
}

/// Input to the monitor
#[derive(Debug)]
pub enum HealthInput {
    /// The poll interval elapsed
    PollTick,
    /// The reconnect interval elapsed
    ReconnectTick,
    /// A status query completed
    StatusResult {
        origin: FetchOrigin,
        result: Result<StatusResponse>,
    },
}

/// What the caller must do after an update
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HealthOutcome {
    /// Issue one status query
    pub fetch: Option<FetchOrigin>,
    /// The connected flag changed to this value
    pub connected_changed: Option<bool>,
    /// The display state changed to this value
    pub state_changed: Option<ConnectionState>,
    /// Message for the operator
    pub banner: Option<String>,
    /// The reported position changed
    pub position_changed: Option<Position>,
}

/// Owner of the connection bookkeeping
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthConfig,
    connected: bool,
    reconnecting: bool,
    attempts: u32,
    last_attempt: Option<Instant>,
    last_status: Option<StatusResponse>,
    last_error: Option<String>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            connected: false,
            reconnecting: false,
            attempts: 0,
            last_attempt: None,
            last_status: None,
            last_error: None,
        }
    }

    /// Apply one input
    pub fn update(&mut self, input: HealthInput, now: Instant) -> HealthOutcome {
        let was_connected = self.connected;
        let previous_state = self.state();
        let mut outcome = HealthOutcome::default();

        match input {
            HealthInput::PollTick => outcome.fetch = Some(FetchOrigin::Poll),
            HealthInput::ReconnectTick => self.reconnect_tick(now, &mut outcome),
            HealthInput::StatusResult { origin, result } => {
                self.apply_status(origin, result, &mut outcome)
            }
        }

        if self.connected != was_connected {
            outcome.connected_changed = Some(self.connected);
        }
        let state = self.state();
        if state != previous_state {
            tracing::info!("Connection state: {} -> {}", previous_state, state);
            outcome.state_changed = Some(state);
        }
        outcome
    }

    fn reconnect_tick(&mut self, now: Instant, outcome: &mut HealthOutcome) {
        if self.connected {
            self.attempts = 0;
            self.reconnecting = false;
            return;
        }

        if self.attempts >= self.config.max_attempts {
            let since_last = self
                .last_attempt
                .map(|at| now.saturating_duration_since(at))
                .unwrap_or(self.config.cooldown);
            if since_last < self.config.cooldown {
                return;
            }
            tracing::info!(
                "Reconnection cooldown of {:?} elapsed, starting a new burst",
                self.config.cooldown
            );
            self.attempts = 0;
        }

        self.reconnecting = true;
        self.attempts += 1;
        self.last_attempt = Some(now);
        tracing::debug!(
            "Reconnection attempt {}/{}",
            self.attempts,
            self.config.max_attempts
        );
        outcome.fetch = Some(FetchOrigin::Reconnect);
    }

    fn apply_status(
        &mut self,
        origin: FetchOrigin,
        result: Result<StatusResponse>,
        outcome: &mut HealthOutcome,
    ) {
        match result {
            Ok(status) => {
                let position = status.current_position;
                if self.last_status.as_ref().map(|s| s.current_position) != Some(position) {
                    outcome.position_changed = Some(position);
                }

                self.connected = status.connected;
                if status.connected {
                    if self.reconnecting {
                        tracing::info!("Reconnected after {} attempts", self.attempts);
                    }
                    self.attempts = 0;
                    self.reconnecting = false;
                    self.last_error = None;
                }
                self.last_status = Some(status);
            }
            Err(e) => {
                let reason = e.to_string();
                self.connected = false;
                if self.reconnecting {
                    tracing::debug!("Status query ({:?}) failed: {}", origin, reason);
                } else {
                    tracing::warn!("Status query failed: {}", reason);
                    outcome.banner = Some(format!("Connection error: {}", reason));
                }
                self.last_error = Some(reason);
            }
        }
    }

    /// Reconnection bookkeeping snapshot
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.connected,
            reconnecting: self.reconnecting,
            attempts: self.attempts,
            max_attempts: self.config.max_attempts,
            last_attempt: self.last_attempt,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status().state()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Last successful status reply
    pub fn last_status(&self) -> Option<&StatusResponse> {
        self.last_status.as_ref()
    }

    pub fn position(&self) -> Position {
        self.last_status
            .as_ref()
            .map(|s| s.current_position)
            .unwrap_or_default()
    }

    pub fn emergency_stop(&self) -> bool {
        self.last_status
            .as_ref()
            .map(|s| s.emergency_stop)
            .unwrap_or(false)
    }

    /// Reason of the last failed status query, cleared on reconnection
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
