//! Growbox Core Library
//!
//! Control-plane core for a single-node grow-chamber controller running on a
//! Linux single-board computer.
//!
//! # Features
//!
//! - **Typed configuration**: validated `param.json` snapshot with atomic
//!   persistence and live reload
//! - **Decision engine**: daily wall-clock windows, staged-fan hysteresis
//!   banding, heater deadband — pure functions, no hardware required
//! - **Hardware access**: sysfs GPIO relay outputs, the four-line fan
//!   interlock, kernel-exported sensor reads (iio / 1-Wire)
//! - **Extrema tracking**: persisted running min/max per sensor
//!
//! # Module Structure
//!
//! - `data/` - Configuration snapshot, persistence, validation, extrema store
//! - `engine/` - Control decision logic (window, fan banding, heater deadband)
//! - `hw/` - Hardware interaction (GPIO outputs, fan, sensor drivers)
//! - `sensors` - Sensor identifiers and the failure-tolerant access layer

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod sensors;

// Re-export primary types from data/
pub use data::{
    ConfigSnapshot, CyclicSettings, DailyTimerSettings, GpioSettings, HeaterSettings,
    LifePeriodSettings, MotorSettings, NetworkSettings, SensorStateSettings,
    TemperatureSettings,
};

// Re-export persistence functions from data/
pub use data::{load_config, resolve_config_dir, save_config, update_config};

// Re-export extrema types from data/
pub use data::{ExtremaRecord, ExtremaStore};

// Re-export engine types
pub use engine::{fan::FanMode, heater::HeaterBand, window::DailyWindow};

// Re-export hardware types
pub use hw::{fan::Fan, gpio::GpioChip, gpio::Output};

// Re-export sensor access layer
pub use sensors::{SensorHub, SensorId, SensorKind};

// Re-export error types
pub use gb_error::{GrowboxError, Result};
