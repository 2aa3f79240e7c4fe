//! Jog link wire messages
//!
//! Outbound: `{"action":"start"|"stop","axis":"x"|"y","direction":1|-1,"speed":n}`.
//! Inbound: `{"status":"ok"|"error","message":...}` acknowledgements.

use serde::{Deserialize, Serialize};
use xytable_core::{Axis, Direction};

/// Jog action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JogAction {
    Start,
    Stop,
}

/// A start or stop command sent over the jog link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JogCommand {
    pub action: JogAction,
    pub axis: Axis,
    pub direction: Direction,
    pub speed: f64,
}

impl JogCommand {
    /// Start continuous motion on `axis`
    pub fn start(axis: Axis, direction: Direction, speed: f64) -> Self {
        Self {
            action: JogAction::Start,
            axis,
            direction,
            speed,
        }
    }

    /// Stop motion on `axis`
    ///
    /// Direction and speed are ignored by the backend but always present
    /// on the wire.
    pub fn stop(axis: Axis) -> Self {
        Self {
            action: JogAction::Stop,
            axis,
            direction: Direction::Positive,
            speed: 0.0,
        }
    }

    pub fn is_start(&self) -> bool {
        self.action == JogAction::Start
    }
}

/// Acknowledgement received on the jog link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JogReply {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl JogReply {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_wire_format() {
        let cmd = JogCommand::start(Axis::Y, Direction::Positive, 0.01);
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"action":"start","axis":"y","direction":1,"speed":0.01}"#
        );
    }

    #[test]
    fn test_stop_wire_format() {
        let cmd = JogCommand::stop(Axis::X);
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"action":"stop","axis":"x","direction":1,"speed":0.0}"#
        );
        assert!(!cmd.is_start());
    }

    #[test]
    fn test_reply_parsing() {
        let reply: JogReply =
            serde_json::from_str(r#"{"status":"error","message":"Invalid start jog parameters"}"#)
                .unwrap();
        assert!(!reply.is_ok());
        assert_eq!(reply.message, "Invalid start jog parameters");
    }
}
