//! Shared daemon state
//!
//! The explicit `AppState` value every task holds an `Arc` of. Readers
//! snapshot the configuration freely; the HTTP facade is the only writer
//! and persists under its write lock, so controllers always observe a
//! complete document.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::RwLock;
use tracing::warn;

use gb_core::data::config::ConfigSnapshot;
use gb_core::data::persistence::save_config;
use gb_core::sensors::{SensorHub, SensorId};

/// Sentinel for "no fan tick has published a speed yet".
const MOTOR_SPEED_UNKNOWN: u8 = u8::MAX;

pub struct AppState {
    /// Current configuration snapshot. Single writer (the HTTP facade).
    pub config: RwLock<ConfigSnapshot>,
    /// Where the snapshot persists to.
    pub config_path: PathBuf,
    /// Sensor access layer with the extrema tracker attached.
    pub hub: SensorHub,
    /// Last speed published by the fan controller.
    motor_speed: AtomicU8,
    /// Result of the one-shot startup ping of the time-series host.
    pub host_reachable: AtomicBool,
    /// Cooperative shutdown flag checked by every control loop.
    pub shutdown: AtomicBool,
}

impl AppState {
    pub fn new(config: ConfigSnapshot, config_path: PathBuf, hub: SensorHub) -> Self {
        Self {
            config: RwLock::new(config),
            config_path,
            hub,
            motor_speed: AtomicU8::new(MOTOR_SPEED_UNKNOWN),
            host_reachable: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> ConfigSnapshot {
        self.config.read().await.clone()
    }

    /// Failure-tolerant sensor read honoring the current enable flags.
    pub async fn read_sensor(&self, id: SensorId) -> Option<f64> {
        let states = self.config.read().await.sensors;
        self.hub.read(id, &states)
    }

    pub fn motor_speed(&self) -> Option<u8> {
        match self.motor_speed.load(Ordering::SeqCst) {
            MOTOR_SPEED_UNKNOWN => None,
            s => Some(s),
        }
    }

    pub fn publish_motor_speed(&self, speed: u8) {
        self.motor_speed.store(speed, Ordering::SeqCst);
    }

    pub fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Persist a snapshot. A mid-run write failure is logged and the
    /// in-memory snapshot retained; the next change retries.
    pub fn persist(&self, snapshot: &ConfigSnapshot) {
        if let Err(e) = save_config(&self.config_path, snapshot) {
            warn!(
                "Failed to persist configuration ({}); keeping in-memory snapshot",
                e
            );
        }
    }
}
