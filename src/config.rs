//! Session configuration using Figment
//!
//! A `SessionConfig` bundles everything a controller session needs at construction: the
//! controller model, the serial line settings, motion-wait behaviour and the pulse field
//! dialect. It can be built in code, or layered from:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables (prefixed with OPTOSIGMA_, nested keys split on `__`)
//!
//! Nothing is written back; the loaded value is simply handed to the session.
//!
//! # Example
//! ```no_run
//! use optosigma::config::SessionConfig;
//!
//! let config = SessionConfig::load_from("config/stage.toml")?;
//! config.validate()?;
//! println!("Port: {}", config.port.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::StageError;
use crate::hardware::command::PulseFormat;
use crate::hardware::types::ControllerModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    /// Port path (e.g., "/dev/ttyUSB0", "COM3")
    pub name: String,
    pub baud_rate: u32,
    /// 5 to 8
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// How long to wait for a response terminator
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            name: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Motion-completion behaviour of axis views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Block after every motion command until the axis is ready
    pub auto_wait: bool,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            auto_wait: true,
            poll_interval: Duration::from_millis(50),
            wait_timeout: Duration::from_secs(60),
        }
    }
}

/// Top-level session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub model: ControllerModel,
    #[serde(default)]
    pub port: PortSettings,
    #[serde(default)]
    pub motion: MotionSettings,
    #[serde(default)]
    pub pulse_format: PulseFormat,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SessionConfig {
    /// Defaults for `model` on `port_name`.
    pub fn new(model: ControllerModel, port_name: impl Into<String>) -> Self {
        Self {
            model,
            port: PortSettings {
                name: port_name.into(),
                ..Default::default()
            },
            motion: MotionSettings::default(),
            pulse_format: PulseFormat::default(),
            log_level: default_log_level(),
        }
    }

    pub fn with_motion(mut self, motion: MotionSettings) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_pulse_format(mut self, format: PulseFormat) -> Self {
        self.pulse_format = format;
        self
    }

    /// Layer defaults, the TOML file at `path` (if it exists) and `OPTOSIGMA_*` variables.
    ///
    /// Example override: `OPTOSIGMA_PORT__NAME=/dev/ttyS1`
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::new(ControllerModel::SingleAxis, "/dev/ttyUSB0")))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OPTOSIGMA_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), StageError> {
        let invalid = |msg: String| Err(StageError::InvalidParameter(msg));

        if self.port.name.trim().is_empty() {
            return invalid("port name must not be empty".to_string());
        }
        if self.port.baud_rate == 0 {
            return invalid("baud rate must be positive".to_string());
        }
        if !(5..=8).contains(&self.port.data_bits) {
            return invalid(format!(
                "data bits must be 5-8, got {}",
                self.port.data_bits
            ));
        }
        if self.port.read_timeout.is_zero() {
            return invalid("read timeout must be positive".to_string());
        }
        if self.motion.poll_interval.is_zero() {
            return invalid("poll interval must be positive".to_string());
        }
        if self.motion.poll_interval > self.motion.wait_timeout {
            return invalid(format!(
                "poll interval {:?} exceeds wait timeout {:?}",
                self.motion.poll_interval, self.motion.wait_timeout
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        Ok(())
    }
}
