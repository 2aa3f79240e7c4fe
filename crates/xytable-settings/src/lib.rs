//! XY Table Settings Crate
//!
//! Handles console configuration: file formats, defaults, validation and
//! the platform directories the console reads from and writes to.

pub mod config;
pub mod error;

pub use config::{
    config_dir, default_config_path, default_log_path, BackendSettings, Config, HealthSettings,
    JogSettings, APP_DIR,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
