//! Runtime configuration shared by the firmware and the simulator

use std::time::Duration;

use derive_more::{Display, Error};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::gesture::{GestureTiming, DOUBLE_PRESS_WINDOW, LONG_PRESS, POLL_INTERVAL};
use crate::render::{ChaseSettings, PAINT_DIM, TRAIL_LENGTH};
use crate::state::{DEFAULT_SPEED, MAX_SPEED};

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

/// A configuration value that cannot be used
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ConfigError {
    #[display("led_count must be at least 1")]
    NoLeds,
    #[display("paint_dim {value} is outside 0.0..=1.0")]
    PaintDim { value: f32 },
    #[display("default_speed {value} is outside 1..=100")]
    DefaultSpeed { value: u8 },
    #[display("double_press_ms must be non-zero")]
    DoublePressWindow,
    #[display("poll_interval_ms must be non-zero")]
    PollInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChaseConfig {
    #[serde(default = "default_led_count")]
    pub led_count: usize,
    /// Fading pixels behind the head
    #[serde(default = "default_trail_length")]
    pub trail_length: usize,
    /// Brightness of painted pixels (0.0-1.0)
    #[serde(default = "default_paint_dim")]
    pub paint_dim: f32,
    /// Start speed, also restored when resuming from pause (1-100)
    #[serde(default = "default_speed")]
    pub default_speed: u8,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    #[serde(default = "default_double_press_ms")]
    pub double_press_ms: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub log_level: LogLevel,
}

const fn default_led_count() -> usize {
    50
}

const fn default_trail_length() -> usize {
    TRAIL_LENGTH
}

const fn default_paint_dim() -> f32 {
    PAINT_DIM
}

const fn default_speed() -> u8 {
    DEFAULT_SPEED
}

#[allow(clippy::cast_possible_truncation)]
const fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation)]
const fn default_long_press_ms() -> u64 {
    LONG_PRESS.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation)]
const fn default_double_press_ms() -> u64 {
    DOUBLE_PRESS_WINDOW.as_millis() as u64
}

const fn default_http_port() -> u16 {
    80
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            led_count: default_led_count(),
            trail_length: default_trail_length(),
            paint_dim: default_paint_dim(),
            default_speed: default_speed(),
            poll_interval_ms: default_poll_interval_ms(),
            long_press_ms: default_long_press_ms(),
            double_press_ms: default_double_press_ms(),
            http_port: default_http_port(),
            log_level: LogLevel::default(),
        }
    }
}

impl ChaseConfig {
    /// Check that every value can drive the tasks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.led_count == 0 {
            return Err(ConfigError::NoLeds);
        }
        if !(0.0..=1.0).contains(&self.paint_dim) {
            return Err(ConfigError::PaintDim {
                value: self.paint_dim,
            });
        }
        if !(1..=MAX_SPEED).contains(&self.default_speed) {
            return Err(ConfigError::DefaultSpeed {
                value: self.default_speed,
            });
        }
        if self.double_press_ms == 0 {
            return Err(ConfigError::DoublePressWindow);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::PollInterval);
        }
        Ok(())
    }

    pub fn settings(&self) -> ChaseSettings {
        ChaseSettings {
            led_count: self.led_count,
            trail_length: self.trail_length,
            paint_dim: self.paint_dim,
        }
    }

    pub fn timing(&self) -> GestureTiming {
        GestureTiming {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            long_press: Duration::from_millis(self.long_press_ms),
            double_press_window: Duration::from_millis(self.double_press_ms),
        }
    }
}
