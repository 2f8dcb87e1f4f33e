//! Constants and configuration values for Growbox
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! This is the SINGLE SOURCE OF TRUTH for all configuration values.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// System paths
pub mod paths {
    use std::path::PathBuf;

    /// Base path for the sysfs GPIO interface
    pub const GPIO_BASE: &str = "/sys/class/gpio";

    /// Base path for Industrial I/O devices (I²C sensor chips bound to
    /// kernel drivers export their channels here)
    pub const IIO_BASE: &str = "/sys/bus/iio/devices";

    /// Base path for 1-Wire slave devices (DS18B20 probes)
    pub const W1_BASE: &str = "/sys/bus/w1/devices";

    /// System-wide configuration directory
    pub const CONFIG_DIR: &str = "/etc/growbox";

    /// Configuration file name
    pub const CONFIG_FILE: &str = "param.json";

    /// Sensor extrema file name
    pub const EXTREMA_FILE: &str = "sensor_stats.json";

    /// Environment variable overriding the configuration directory
    pub const CONFIG_DIR_ENV: &str = "GROWBOX_CONFIG_DIR";

    /// Resolve the configuration directory.
    ///
    /// Order: `GROWBOX_CONFIG_DIR` env override, then `/etc/growbox` when it
    /// exists, then the user config dir (`~/.config/growbox`).
    pub fn config_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return PathBuf::from(dir);
        }
        let system = PathBuf::from(CONFIG_DIR);
        if system.is_dir() {
            return system;
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("growbox")
    }
}

/// Control-loop timing
pub mod timing {
    use super::Duration;

    /// Daily window controller tick period
    pub const DAILY_SAMPLING: Duration = Duration::from_secs(60);

    /// Staged-fan controller tick period in auto mode
    pub const FAN_SAMPLING: Duration = Duration::from_secs(15);

    /// Staged-fan controller tick period in manual mode
    pub const FAN_MANUAL_SAMPLING: Duration = Duration::from_secs(60);

    /// Heater controller tick period
    pub const HEATER_SAMPLING: Duration = Duration::from_secs(30);

    /// Time-series sink push period
    pub const SINK_INTERVAL: Duration = Duration::from_secs(60);

    /// Dwell between fan relay transitions (protects downstream contactors)
    pub const FAN_DWELL: Duration = Duration::from_secs(1);

    /// One-shot startup ping timeout for the time-series host
    pub const SINK_PING_TIMEOUT: Duration = Duration::from_secs(5);
}

/// HTTP facade parameters
pub mod http {
    use super::Duration;

    /// Listen port
    pub const PORT: u16 = 8123;

    /// Bind address
    pub const BIND_ADDR: &str = "0.0.0.0";

    /// Per-line read timeout; expired reads close the connection
    pub const READ_TIMEOUT: Duration = Duration::from_secs(20);

    /// Response write timeout
    pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Maximum concurrent client connections
    pub const MAX_CONNECTIONS: usize = 16;
}

/// Range limits
pub mod limits {
    /// Number of fan speed stages (0 = off)
    pub const MAX_FAN_SPEED: u8 = 4;

    /// Consecutive failures between repeated WARN logs for one sensor
    pub const SENSOR_WARN_EVERY: u32 = 10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        std::env::set_var(paths::CONFIG_DIR_ENV, "/tmp/growbox-test-conf");
        let dir = paths::config_dir();
        std::env::remove_var(paths::CONFIG_DIR_ENV);
        assert_eq!(dir, std::path::PathBuf::from("/tmp/growbox-test-conf"));
    }

    #[test]
    fn dwell_is_at_least_one_second() {
        assert!(timing::FAN_DWELL >= Duration::from_secs(1));
    }
}
