//! Request and response bodies of the control backend's HTTP API

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use xytable_core::{Axis, DigitalOutput, Position};

/// Reply of `GET /status`
///
/// Unknown fields such as `table_limits` or `mesa_status` are tolerated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the motion hardware is reachable from the backend
    #[serde(default)]
    pub connected: bool,
    /// Current table position
    #[serde(default)]
    pub current_position: Position,
    /// Whether the emergency stop is latched
    #[serde(default)]
    pub emergency_stop: bool,
    /// Whether a move is executing
    #[serde(default)]
    pub movement_in_progress: bool,
}

/// Travel limits of one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    /// Lowest reachable coordinate
    pub min: f64,
    /// Highest reachable coordinate
    pub max: f64,
    /// Maximum axis speed
    #[serde(default)]
    pub max_speed: Option<f64>,
}

impl AxisLimits {
    /// Whether a coordinate lies within the travel range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Backend movement defaults reported alongside the limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementDefaults {
    /// Speed used when a move omits one
    pub default_speed: f64,
    /// Tolerance for reaching a target position
    pub position_tolerance: f64,
}

/// Reply of `GET /limits`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitsResponse {
    /// X-axis limits
    pub x_axis: AxisLimits,
    /// Y-axis limits
    pub y_axis: AxisLimits,
    /// Movement defaults
    #[serde(default)]
    pub movement: Option<MovementDefaults>,
}

impl LimitsResponse {
    /// Limits of the given axis
    pub fn axis(&self, axis: Axis) -> &AxisLimits {
        match axis {
            Axis::X => &self.x_axis,
            Axis::Y => &self.y_axis,
        }
    }
}

/// Body of `POST /move`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub axis: Axis,
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Body of `POST /move_to`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Body of `POST /set_io`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetIoRequest {
    pub io_name: DigitalOutput,
    pub state: bool,
}

/// Success reply shared by the command endpoints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    /// `"ok"` on success
    #[serde(default)]
    pub status: String,
    /// Human readable outcome
    #[serde(default, alias = "detail")]
    pub message: String,
    /// Position after the command, when the endpoint reports one
    #[serde(default, alias = "new_position", alias = "current_position")]
    pub position: Option<Position>,
}

/// One entry of `GET /programs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub name: String,
    #[serde(default)]
    pub created: Option<NaiveDateTime>,
    #[serde(default)]
    pub modified: Option<NaiveDateTime>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command_count: usize,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Reply of `GET /programs`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgramList {
    pub programs: Vec<ProgramSummary>,
    pub total: usize,
}

/// One step of a stored program
///
/// The console stores and forwards steps without interpreting them, so
/// step-specific fields are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub step: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A stored motion program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    #[serde(default)]
    pub program: Vec<ProgramStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
