//! # XY Table
//!
//! Operator console for an XY motion table driven by a remote control
//! service over HTTP and a WebSocket jog link.
//!
//! ## Architecture
//!
//! The console is organized as a workspace with multiple crates:
//!
//! 1. **xytable-core** - Core types, connection state, errors, events
//! 2. **xytable-communication** - HTTP control client, jog link, health monitor
//! 3. **xytable-input** - Key-to-motion translation
//! 4. **xytable-settings** - Configuration files
//! 5. **xytable-console** - Console runtime and terminal frontend
//! 6. **xytable** - Main binary with the command line interface

pub mod cli;

pub use xytable_communication::{ControlApi, HealthConfig, HealthMonitor, HttpControlClient};
pub use xytable_console::{Console, ConsoleConfig, ConsoleHandle, ConsoleInput, ConsoleSnapshot};
pub use xytable_core::{ConnectionState, ConsoleEvent, Error, Position, Result};
pub use xytable_settings::Config;

use std::path::Path;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Logs go to `log_file` when given, otherwise to stderr. `RUST_LOG`
/// directives are applied on top of `level`.
pub fn init_logging(log_file: Option<&Path>, level: tracing::Level) -> anyhow::Result<()> {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let fmt_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_thread_names(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
        None => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_line_number(true)
                .pretty();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}
