//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; an empty file yields the
//! defaults below.
//!
//! ```toml
//! [link]
//! host = "127.0.0.1:8080"
//! path = "/ws/"
//! reconnect_interval_ms = 1000
//! connect_timeout_ms = 5000
//! heartbeat_interval_ms = 5000
//! peer_timeout_ms = 10000
//!
//! [input]
//! sample_interval_ms = 50
//!
//! [coalescer]
//! interval_ms = 100
//!
//! [gamepad]
//! enabled = true
//! device_path = ""          # empty: auto-detect
//! deadzone = 0.2
//! fullscreen_button = 9
//! axis_codes = [0, 1, 3, 4] # ABS_X, ABS_Y, ABS_RX, ABS_RY
//!
//! [touch]
//! deadzone = 0.05
//!
//! [logging]
//! level = "info"
//! # directory = "./logs"
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::control::Deadzone;
use crate::error::{LinkError, Result};
use crate::input::evdev_pad::DEFAULT_AXIS_CODES;
use crate::input::gamepad::{AXIS_COUNT, BUTTON_COUNT, BUTTON_START};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub input: InputConfig,
    pub coalescer: CoalescerConfig,
    pub gamepad: GamepadConfig,
    pub touch: TouchConfig,
    pub logging: LoggingConfig,
}

/// Control channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
}

/// Input sampling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

/// Rate limiter configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CoalescerConfig {
    #[serde(default = "default_coalesce_interval_ms")]
    pub interval_ms: u64,
}

/// Gamepad configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GamepadConfig {
    #[serde(default = "default_gamepad_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_gamepad_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_fullscreen_button")]
    pub fullscreen_button: usize,

    #[serde(default = "default_axis_codes")]
    pub axis_codes: [u16; AXIS_COUNT],
}

/// Touch joystick configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TouchConfig {
    #[serde(default = "default_touch_deadzone")]
    pub deadzone: f32,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write daily-rolling log files here when set
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// Default value functions
fn default_host() -> String { "127.0.0.1:8080".to_string() }
fn default_path() -> String { "/ws/".to_string() }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_heartbeat_interval_ms() -> u64 { 5000 }
fn default_peer_timeout_ms() -> u64 { 10000 }

fn default_sample_interval_ms() -> u64 { 50 }

fn default_coalesce_interval_ms() -> u64 { 100 }

fn default_gamepad_enabled() -> bool { true }
fn default_gamepad_deadzone() -> f32 { 0.2 }
fn default_fullscreen_button() -> usize { BUTTON_START }
fn default_axis_codes() -> [u16; AXIS_COUNT] { DEFAULT_AXIS_CODES }

fn default_touch_deadzone() -> f32 { 0.05 }

fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            path: default_path(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            peer_timeout_ms: default_peer_timeout_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_coalesce_interval_ms(),
        }
    }
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: default_gamepad_enabled(),
            device_path: String::new(),
            deadzone: default_gamepad_deadzone(),
            fullscreen_button: default_fullscreen_button(),
            axis_codes: default_axis_codes(),
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            deadzone: default_touch_deadzone(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> LinkError {
    LinkError::Config(toml::de::Error::custom(message))
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use teleop_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.link.host.trim().is_empty() {
            return Err(invalid("link host cannot be empty"));
        }

        // Timing fields
        check_range("reconnect_interval_ms", self.link.reconnect_interval_ms, 1, 60000)?;
        check_range("connect_timeout_ms", self.link.connect_timeout_ms, 1, 60000)?;
        check_range("heartbeat_interval_ms", self.link.heartbeat_interval_ms, 1, 60000)?;
        check_range("peer_timeout_ms", self.link.peer_timeout_ms, 1, 60000)?;
        if self.link.peer_timeout_ms <= self.link.heartbeat_interval_ms {
            return Err(invalid("peer_timeout_ms must exceed heartbeat_interval_ms"));
        }
        check_range("sample_interval_ms", self.input.sample_interval_ms, 1, 10000)?;
        check_range("coalescer interval_ms", self.coalescer.interval_ms, 1, 10000)?;

        // Deadzones
        Deadzone::new(self.gamepad.deadzone)
            .map_err(|_| invalid("gamepad deadzone must be in [0.0, 1.0)"))?;
        Deadzone::new(self.touch.deadzone)
            .map_err(|_| invalid("touch deadzone must be in [0.0, 1.0)"))?;

        if self.gamepad.fullscreen_button >= BUTTON_COUNT {
            return Err(invalid(format!(
                "fullscreen_button {} is out of bounds (must be 0-{})",
                self.gamepad.fullscreen_button,
                BUTTON_COUNT - 1
            )));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }

    /// Gamepad device path, or `None` to auto-detect.
    #[must_use]
    pub fn gamepad_device(&self) -> Option<PathBuf> {
        if self.gamepad.device_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.gamepad.device_path))
        }
    }

    /// Gamepad deadzone.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if the value is out of range.
    pub fn gamepad_deadzone(&self) -> Result<Deadzone> {
        Deadzone::new(self.gamepad.deadzone)
    }

    /// Touch joystick deadzone.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if the value is out of range.
    pub fn touch_deadzone(&self) -> Result<Deadzone> {
        Deadzone::new(self.touch.deadzone)
    }
}
