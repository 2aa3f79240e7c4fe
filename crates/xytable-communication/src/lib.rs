//! # XY Table Communication
//!
//! Everything the console exchanges with the control backend:
//! - the one-shot HTTP control API ([`ControlApi`], [`HttpControlClient`])
//! - the persistent jog link ([`JogLinkManager`] over a [`JogTransport`])
//! - the connection health monitor ([`HealthMonitor`])

pub mod api;
pub mod health;
pub mod jog_link;

pub use api::{
    AxisLimits, CommandResponse, ControlApi, HttpControlClient, LimitsResponse, Program,
    ProgramList, ProgramStep, ProgramSummary, StatusResponse,
};
pub use health::{FetchOrigin, HealthConfig, HealthInput, HealthMonitor, HealthOutcome};
pub use jog_link::{
    websocket_url, JogAction, JogCommand, JogLinkManager, JogReply, JogTransport, LinkEvent,
    LinkEventKind, LinkHandle, LinkId, LinkOutcome, WebSocketTransport, DEFAULT_JOG_PATH,
};
