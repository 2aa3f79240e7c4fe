//! # XY Table Core
//!
//! Core types and utilities shared by the XY table operator console.
//! Provides the axis/direction model, the quick-move increments, the
//! connection state labels, the error taxonomy and the console event
//! dispatcher.

pub mod connection;
pub mod error;
pub mod event;
pub mod types;

pub use connection::{ConnectionState, ConnectionStatus};
pub use error::{CommandError, ConnectionError, Error, Result};
pub use event::{ConsoleEvent, EventDispatcher};
pub use types::{Axis, AxisKey, DigitalOutput, Direction, Position, QuickMoveIncrement};
