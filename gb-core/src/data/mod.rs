//! Data types, configuration, and persistence for Growbox

pub mod config;
pub mod extrema;
pub mod persistence;

pub use config::{
    ConfigSnapshot, CyclicSettings, DailyTimerSettings, GpioSettings, HeaterSettings,
    LifePeriodSettings, MotorSettings, NetworkSettings, SensorStateSettings,
    TemperatureSettings,
};
pub use extrema::{ExtremaRecord, ExtremaStore};
pub use persistence::{load_config, resolve_config_dir, save_config, update_config};
