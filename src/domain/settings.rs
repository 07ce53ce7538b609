use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::binder::BindConfig;
use crate::domain::controller::ControllerConfig;
use crate::domain::lifecycle::POLL_INTERVAL;
use crate::error::SettingsError;
use crate::infrastructure::bluetooth::protocol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "Logs".to_string()
}
fn default_prefix() -> String {
    "lighthouse_power".to_string()
}
fn default_rotation() -> String {
    "never".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Device Matching
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,
    /// Extra characteristic queries allowed while access is denied; unlimited when absent
    #[serde(default)]
    pub access_denied_retry_limit: Option<u32>,

    // Host Runtime
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub activate_on_attach: bool,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name_pattern: default_name_pattern(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            access_denied_retry_limit: None,
            poll_interval_ms: default_poll_interval_ms(),
            activate_on_attach: true,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_name_pattern() -> String {
    protocol::NAME_PATTERN.to_string()
}
fn default_service_uuid() -> String {
    protocol::SERVICE_UUID.to_string()
}
fn default_characteristic_uuid() -> String {
    protocol::CHARACTERISTIC_UUID.to_string()
}
fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL.as_millis() as u64
}

impl Settings {
    /// Validate and convert into the controller's runtime configuration
    pub fn controller_config(&self) -> Result<ControllerConfig, SettingsError> {
        let parse = |value: &str| {
            protocol::parse_uuid(value).map_err(|source| SettingsError::Uuid {
                value: value.to_string(),
                source,
            })
        };

        Ok(ControllerConfig {
            bind: BindConfig {
                name_pattern: Regex::new(&self.name_pattern)?,
                service_id: parse(&self.service_uuid)?,
                characteristic_id: parse(&self.characteristic_uuid)?,
                access_denied_retry_limit: self.access_denied_retry_limit,
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            activate_on_attach: self.activate_on_attach,
        })
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the per-user config directory
    pub fn new() -> Result<Self, SettingsError> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from an explicit path, falling back to defaults
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Settings::default()
            }
            Err(e) => {
                warn!(
                    "Ignoring settings at {}: {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> Result<PathBuf, SettingsError> {
        let mut path = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        path.push("LighthousePowerControl");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> Result<Settings, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
