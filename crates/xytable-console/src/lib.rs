//! # XY Table Console
//!
//! The operator console: a single-owner runtime tying connection health,
//! the jog link and key translation together, plus a terminal frontend.

pub mod runtime;
pub mod tui;

pub use runtime::{Console, ConsoleConfig, ConsoleHandle, ConsoleInput, ConsoleSnapshot};
pub use tui::run_terminal;
