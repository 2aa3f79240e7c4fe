//! One-shot request/response API of the control backend
//!
//! [`ControlApi`] is the seam between the console and the backend; the
//! production implementation is [`HttpControlClient`].

pub mod http;
pub mod types;

pub use http::{extract_detail, HttpControlClient};
pub use types::{
    AxisLimits, CommandResponse, LimitsResponse, MoveRequest, MovementDefaults, PositionRequest,
    Program, ProgramList, ProgramStep, ProgramSummary, SetIoRequest, StatusResponse,
};

use async_trait::async_trait;
use xytable_core::{Axis, DigitalOutput, Result};

/// Operations offered by the control backend
///
/// Every call resolves to either a reply, a `ConnectionError` (the request
/// never completed) or a `CommandError::Rejected` carrying the backend's
/// reason verbatim.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Query connection state and position
    async fn status(&self) -> Result<StatusResponse>;

    /// Query travel limits
    async fn limits(&self) -> Result<LimitsResponse>;

    /// Move one axis by a relative distance; `None` speed uses the backend default
    async fn move_relative(
        &self,
        axis: Axis,
        distance: f64,
        speed: Option<f64>,
    ) -> Result<CommandResponse>;

    /// Move both axes to an absolute position
    async fn move_absolute(&self, x: f64, y: f64, speed: Option<f64>) -> Result<CommandResponse>;

    async fn emergency_stop(&self) -> Result<CommandResponse>;

    async fn clear_emergency_stop(&self) -> Result<CommandResponse>;

    /// Start homing both axes
    async fn home(&self) -> Result<CommandResponse>;

    /// Switch a digital output
    async fn set_output(&self, output: DigitalOutput, state: bool) -> Result<CommandResponse>;

    async fn list_programs(&self) -> Result<ProgramList>;

    async fn load_program(&self, name: &str) -> Result<Program>;

    /// Store a program, overwriting one with the same name
    async fn save_program(&self, program: &Program) -> Result<CommandResponse>;

    /// Replace an existing program; the backend keeps its creation time
    async fn update_program(&self, name: &str, program: &Program) -> Result<CommandResponse>;

    async fn delete_program(&self, name: &str) -> Result<CommandResponse>;
}
