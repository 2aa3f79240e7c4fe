//! Configuration for the XY table console
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats stored in the platform configuration directory.
//!
//! Configuration is organized into logical sections:
//! - Backend settings (control API address, jog link path, timeouts)
//! - Health settings (status polling and reconnection policy)
//! - Jog settings (hold detection, link reopen delay, increment, output)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use xytable_core::{DigitalOutput, QuickMoveIncrement};

/// Application directory name under the platform config and data dirs
pub const APP_DIR: &str = "xytable";

/// Control backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Root URL of the control API
    pub base_url: String,
    /// Path of the jog link on the backend
    pub jog_path: String,
    /// Timeout of one-shot requests in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            jog_path: "/ws/jog".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Connection health settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Status poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Reconnection attempt interval in milliseconds
    pub reconnect_interval_ms: u64,
    /// Pause after an exhausted burst in milliseconds
    pub cooldown_ms: u64,
    /// Reconnection attempts per burst
    pub max_attempts: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            reconnect_interval_ms: 2000,
            cooldown_ms: 30_000,
            max_attempts: 12,
        }
    }
}

impl HealthSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Keyboard jog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JogSettings {
    /// Press duration before a key starts jogging, in milliseconds
    pub hold_delay_ms: u64,
    /// Delay before reopening a closed jog link, in milliseconds
    pub reopen_delay_ms: u64,
    /// Increment selected at startup
    pub default_increment: QuickMoveIncrement,
    /// Output switched by the `.` and `,` keys
    pub output: DigitalOutput,
}

impl Default for JogSettings {
    fn default() -> Self {
        Self {
            hold_delay_ms: 400,
            reopen_delay_ms: 2000,
            default_increment: QuickMoveIncrement::default(),
            output: DigitalOutput::default(),
        }
    }
}

impl JogSettings {
    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    pub fn reopen_delay(&self) -> Duration {
        Duration::from_millis(self.reopen_delay_ms)
    }
}

/// File formats accepted for the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(format!(
                "{} (config file must be .json or .toml)",
                other.unwrap_or("no extension")
            ))
            .into()),
        }
    }
}

/// Complete console configuration
///
/// Missing sections and keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend settings
    pub backend: BackendSettings,
    /// Health settings
    pub health: HealthSettings,
    /// Jog settings
    pub jog: JogSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content).map_err(ConfigError::from)?,
            Format::Toml => toml::from_str(&content).map_err(ConfigError::from)?,
        };

        config.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Load config from file, or defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!(
                "No settings file at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::from_path(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self).map_err(ConfigError::from)?,
            Format::Toml => toml::to_string_pretty(self).map_err(ConfigError::from)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let url = self.backend.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::invalid(
                "backend.base_url",
                format!("must be an http or https URL, got \"{}\"", url),
            ));
        }
        if !self.backend.jog_path.starts_with('/') {
            return Err(SettingsError::invalid(
                "backend.jog_path",
                "must start with '/'",
            ));
        }
        if self.backend.request_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "backend.request_timeout_ms",
                "must be > 0",
            ));
        }

        if self.health.poll_interval_ms == 0 || self.health.reconnect_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "health",
                "poll and reconnect intervals must be > 0",
            ));
        }
        if self.health.max_attempts == 0 {
            return Err(SettingsError::invalid("health.max_attempts", "must be > 0"));
        }

        if self.jog.hold_delay_ms == 0 {
            return Err(SettingsError::invalid("jog.hold_delay_ms", "must be > 0"));
        }

        Ok(())
    }

    /// Replace the backend URL, keeping the other settings
    pub fn with_backend_url(mut self, url: impl Into<String>) -> SettingsResult<Self> {
        self.backend.base_url = url.into();
        self.validate()?;
        Ok(self)
    }
}

/// Platform configuration directory of the console
pub fn config_dir() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| SettingsError::ConfigDirectory("no config directory on this platform".into()))
}

/// Default settings file: `<config dir>/xytable/config.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default console log file: `<data dir>/xytable/console.log`
pub fn default_log_path() -> SettingsResult<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("console.log"))
        .ok_or_else(|| SettingsError::ConfigDirectory("no data directory on this platform".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.health.max_attempts, 12);
        assert_eq!(config.health.cooldown(), Duration::from_secs(30));
        assert_eq!(config.jog.hold_delay(), Duration::from_millis(400));
        assert_eq!(config.jog.default_increment, QuickMoveIncrement::Hundredth);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            base_url = "http://192.168.1.50:8000"

            [jog]
            default_increment = 0.001
            output = "start"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "http://192.168.1.50:8000");
        assert_eq!(config.backend.jog_path, "/ws/jog");
        assert_eq!(config.jog.default_increment, QuickMoveIncrement::Thousandth);
        assert_eq!(config.jog.output, DigitalOutput::Start);
        assert_eq!(config.health, HealthSettings::default());
    }

    #[test]
    fn test_invalid_increment_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[jog]\ndefault_increment = 0.5\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.health.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { ref key, .. }) if key == "health.max_attempts"
        ));

        assert!(Config::default().with_backend_url("localhost:8000").is_err());
        assert!(Config::default()
            .with_backend_url("https://table.local")
            .is_ok());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Config::default()
            .save_to_file(Path::new("settings.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Config(ConfigError::UnsupportedFormat(_))
        ));
    }
}
