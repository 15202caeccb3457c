//! Configuration loading using Figment
//!
//! Configuration is loaded from:
//! 1. `config/xy_stage.toml` (or any path given to [`AppConfig::load_from`])
//! 2. Environment variables prefixed with `XY_STAGE_`, nested keys split on `__`
//!
//! Serial numbers read from the environment are taken verbatim, so
//! `XY_STAGE_MOTION__X_SERIAL=0042` selects controller `"0042"`, not `42`.
//!
//! # Example
//! ```no_run
//! use xy_stage::config::AppConfig;
//!
//! // XY_STAGE_MOTION__DIST_PER_STEP=34.6 overrides [motion] dist_per_step
//! let config = AppConfig::load()?;
//! println!("X stage: {}", config.motion.x_serial);
//! # Ok::<(), figment::Error>(())
//! ```

use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use stage_driver_mock::MockAxisConfig;
use std::path::Path;
use thiserror::Error;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/xy_stage.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "XY_STAGE_";

// Keys whose environment values must not be reinterpreted as numbers.
const SERIAL_KEYS: [&str; 2] = ["motion.x_serial", "motion.y_serial"];

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File or environment could not be parsed into [`AppConfig`].
    #[error("Configuration error: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Stage controllers and unit conversion
    pub motion: MotionConfig,
    /// Simulated controller settings, used when `motion.driver = "mock"`
    #[serde(default)]
    pub mock: MockAxisConfig,
    /// Coordinate path runs
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

/// Two-axis stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Driver factory name
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Serial number of the X-axis controller
    #[serde(deserialize_with = "serial_number")]
    pub x_serial: String,
    /// Serial number of the Y-axis controller
    #[serde(deserialize_with = "serial_number")]
    pub y_serial: String,
    /// Physical units per motor step
    pub dist_per_step: f64,
}

/// Coordinate path run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Time spent at each point, in seconds
    pub dwell_s: f64,
    /// Expected move and bookkeeping time per point, for run estimates
    pub move_overhead_s: f64,
    /// Move to (0, 0) before the first point
    pub start_at_origin: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            dwell_s: 3.0,
            move_overhead_s: 0.5,
            start_at_origin: true,
        }
    }
}

// Serial numbers are printed on the controllers as integers but are opaque text.
#[derive(Deserialize)]
#[serde(untagged)]
enum SerialRepr {
    Number(u64),
    Text(String),
}

fn serial_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match SerialRepr::deserialize(deserializer)? {
        SerialRepr::Number(n) => n.to_string(),
        SerialRepr::Text(s) => s,
    })
}

fn default_name() -> String {
    "xy-stage".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_driver() -> String {
    "mock".to_string()
}

impl AppConfig {
    /// Load configuration from the default path and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path and environment variables
    ///
    /// A missing file is not an error by itself; the environment may supply
    /// every required key.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Load and validate in one step.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from(path).map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// The provider stack used by [`AppConfig::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        let env = || Env::prefixed(ENV_PREFIX).split("__");

        let mut figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(env().ignore(&SERIAL_KEYS));

        // Env parses values ("0042" -> 42); serials are merged as raw text instead
        for (key, value) in env().only(&SERIAL_KEYS).iter() {
            let key = key.as_str().to_ascii_lowercase();
            figment = figment.merge(Serialized::default(&key, value));
        }
        figment
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let motion = &self.motion;
        if motion.dist_per_step == 0.0 || !motion.dist_per_step.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "dist_per_step must be finite and non-zero, got {}",
                motion.dist_per_step
            )));
        }

        if motion.x_serial.trim().is_empty() || motion.y_serial.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "x_serial and y_serial must not be empty".to_string(),
            ));
        }

        if motion.x_serial == motion.y_serial {
            return Err(ConfigError::Invalid(format!(
                "x_serial and y_serial must differ (both are {})",
                motion.x_serial
            )));
        }

        let speed = self.mock.speed_steps_per_sec;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "mock.speed_steps_per_sec must be finite and positive, got {}",
                speed
            )));
        }

        let runner = &self.runner;
        for (name, value) in [
            ("dwell_s", runner.dwell_s),
            ("move_overhead_s", runner.move_overhead_s),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "runner.{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
