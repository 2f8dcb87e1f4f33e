//! Typed configuration snapshot
//!
//! The single JSON document (`param.json`) that drives every controller.
//! Top-level key names are part of the external contract and must round-trip
//! byte-identically, including the `"enabled"`/`"disabled"` string encoding
//! of the heater and sensor state booleans.

use serde::{Deserialize, Serialize};

use crate::engine::fan::FanMode;
use crate::engine::window::DailyWindow;
use gb_error::{GrowboxError, Result};

/// Serde codec for booleans stored as the strings `"enabled"`/`"disabled"`.
pub mod state_string {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(if *value { "enabled" } else { "disabled" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
        let s = String::deserialize(de)?;
        match s.as_str() {
            "enabled" => Ok(true),
            "disabled" => Ok(false),
            other => Err(D::Error::custom(format!(
                "expected \"enabled\" or \"disabled\", got {:?}",
                other
            ))),
        }
    }
}

/// The validated, immutable in-memory copy of the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(rename = "Life_Period", default)]
    pub life_period: LifePeriodSettings,
    #[serde(rename = "DailyTimer1_Settings", default = "DailyTimerSettings::default_timer1")]
    pub daily_timer1: DailyTimerSettings,
    #[serde(rename = "DailyTimer2_Settings", default)]
    pub daily_timer2: DailyTimerSettings,
    #[serde(rename = "Cyclic1_Settings", default)]
    pub cyclic1: CyclicSettings,
    #[serde(rename = "Cyclic2_Settings", default)]
    pub cyclic2: CyclicSettings,
    #[serde(rename = "Temperature_Settings", default)]
    pub temperature: TemperatureSettings,
    #[serde(rename = "Heater_Settings", default)]
    pub heater: HeaterSettings,
    #[serde(rename = "Network_Settings", default)]
    pub network: NetworkSettings,
    #[serde(rename = "GPIO_Settings", default)]
    pub gpio: GpioSettings,
    #[serde(rename = "Motor_Settings", default)]
    pub motor: MotorSettings,
    #[serde(rename = "Sensor_State", default)]
    pub sensors: SensorStateSettings,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            life_period: LifePeriodSettings::default(),
            daily_timer1: DailyTimerSettings::default_timer1(),
            daily_timer2: DailyTimerSettings::default(),
            cyclic1: CyclicSettings::default(),
            cyclic2: CyclicSettings::default(),
            temperature: TemperatureSettings::default(),
            heater: HeaterSettings::default(),
            network: NetworkSettings::default(),
            gpio: GpioSettings::default(),
            motor: MotorSettings::default(),
            sensors: SensorStateSettings::default(),
        }
    }
}

/// Free-text growth stage ("seedling", "vegetative", "flowering", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifePeriodSettings {
    #[serde(default)]
    pub stage: String,
}

impl Default for LifePeriodSettings {
    fn default() -> Self {
        Self {
            stage: "vegetative".into(),
        }
    }
}

/// A daily on/off window in wall-clock time. May wrap midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyTimerSettings {
    #[serde(default)]
    pub start_hour: u8,
    #[serde(default)]
    pub start_minute: u8,
    #[serde(default)]
    pub stop_hour: u8,
    #[serde(default)]
    pub stop_minute: u8,
}

impl DailyTimerSettings {
    fn default_timer1() -> Self {
        // Lights 06:00-22:00.
        Self {
            start_hour: 6,
            start_minute: 0,
            stop_hour: 22,
            stop_minute: 0,
        }
    }

    pub fn window(&self) -> DailyWindow {
        DailyWindow::new(
            (self.start_hour, self.start_minute),
            (self.stop_hour, self.stop_minute),
        )
    }

    fn validate(&self, block: &str) -> Result<()> {
        for (name, hour) in [("start_hour", self.start_hour), ("stop_hour", self.stop_hour)] {
            if hour > 23 {
                return Err(GrowboxError::invalid_config(
                    format!("{}.{}", block, name),
                    format!("hour out of range (0-23): {}", hour),
                ));
            }
        }
        for (name, minute) in [
            ("start_minute", self.start_minute),
            ("stop_minute", self.stop_minute),
        ] {
            if minute > 59 {
                return Err(GrowboxError::invalid_config(
                    format!("{}.{}", block, name),
                    format!("minute out of range (0-59): {}", minute),
                ));
            }
        }
        Ok(())
    }
}

impl Default for DailyTimerSettings {
    fn default() -> Self {
        // Second outlet mirrors a shorter evening window by default.
        Self {
            start_hour: 18,
            start_minute: 0,
            stop_hour: 23,
            stop_minute: 0,
        }
    }
}

/// Periodic ON pulse: OFF for `period_minutes`, ON for
/// `action_duration_seconds`, repeated. The ON segment is not counted
/// against the OFF segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CyclicSettings {
    #[serde(default = "CyclicSettings::default_period")]
    pub period_minutes: u32,
    #[serde(default = "CyclicSettings::default_duration")]
    pub action_duration_seconds: u32,
}

impl CyclicSettings {
    fn default_period() -> u32 {
        60
    }

    fn default_duration() -> u32 {
        10
    }

    /// Period with non-positive values clamped to 1.
    pub fn period_min(&self) -> u32 {
        self.period_minutes.max(1)
    }

    /// ON duration with non-positive values clamped to 1.
    pub fn action_sec(&self) -> u32 {
        self.action_duration_seconds.max(1)
    }
}

impl Default for CyclicSettings {
    fn default() -> Self {
        Self {
            period_minutes: Self::default_period(),
            action_duration_seconds: Self::default_duration(),
        }
    }
}

/// Heater temperature limits, split into day and night bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemperatureSettings {
    pub min_day: f64,
    pub max_day: f64,
    pub min_night: f64,
    pub max_night: f64,
    #[serde(default = "TemperatureSettings::default_offset")]
    pub hysteresis_offset: f64,
}

impl TemperatureSettings {
    fn default_offset() -> f64 {
        0.5
    }
}

impl Default for TemperatureSettings {
    fn default() -> Self {
        Self {
            min_day: 22.0,
            max_day: 26.0,
            min_night: 18.0,
            max_night: 21.0,
            hysteresis_offset: Self::default_offset(),
        }
    }
}

/// Heater master switch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeaterSettings {
    #[serde(with = "state_string")]
    pub enabled: bool,
}

impl Default for HeaterSettings {
    fn default() -> Self {
        Self { enabled: false }
    }
}

/// Network identity and the time-series sink endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub host_addr: String,
    #[serde(default)]
    pub host_reachable: bool,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_pass: String,
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host_addr: "192.168.1.10".into(),
            host_reachable: false,
            db_port: 8086,
            db_name: "growbox".into(),
            db_user: String::new(),
            db_pass: String::new(),
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
        }
    }
}

/// GPIO pin numbers. Immutable for the life of the process: edits persist
/// but only apply at the next start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpioSettings {
    pub daily1_pin: u32,
    pub daily2_pin: u32,
    pub cyclic1_pin: u32,
    pub cyclic2_pin: u32,
    pub heater_pin: u32,
    pub fan1_pin: u32,
    pub fan2_pin: u32,
    pub fan3_pin: u32,
    pub fan4_pin: u32,
    pub i2c_sda_pin: u32,
    pub i2c_scl_pin: u32,
    pub onewire_pin: u32,
}

impl GpioSettings {
    pub fn fan_pins(&self) -> [u32; 4] {
        [self.fan1_pin, self.fan2_pin, self.fan3_pin, self.fan4_pin]
    }

    /// Look up a pin field by its query-string name (`daily1_pin`, ...).
    pub fn set_pin(&mut self, field: &str, value: u32) -> bool {
        let slot = match field {
            "daily1_pin" => &mut self.daily1_pin,
            "daily2_pin" => &mut self.daily2_pin,
            "cyclic1_pin" => &mut self.cyclic1_pin,
            "cyclic2_pin" => &mut self.cyclic2_pin,
            "heater_pin" => &mut self.heater_pin,
            "fan1_pin" => &mut self.fan1_pin,
            "fan2_pin" => &mut self.fan2_pin,
            "fan3_pin" => &mut self.fan3_pin,
            "fan4_pin" => &mut self.fan4_pin,
            "i2c_sda_pin" => &mut self.i2c_sda_pin,
            "i2c_scl_pin" => &mut self.i2c_scl_pin,
            "onewire_pin" => &mut self.onewire_pin,
            _ => return false,
        };
        *slot = value;
        true
    }
}

impl Default for GpioSettings {
    fn default() -> Self {
        // BCM numbering on a Raspberry Pi header.
        Self {
            daily1_pin: 17,
            daily2_pin: 27,
            cyclic1_pin: 22,
            cyclic2_pin: 23,
            heater_pin: 24,
            fan1_pin: 5,
            fan2_pin: 6,
            fan3_pin: 13,
            fan4_pin: 19,
            i2c_sda_pin: 2,
            i2c_scl_pin: 3,
            onewire_pin: 4,
        }
    }
}

/// Staged-fan policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotorSettings {
    pub mode: FanMode,
    pub user_speed: u8,
    pub target_temp: f64,
    pub hysteresis: f64,
    pub min_speed: u8,
    pub max_speed: u8,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            mode: FanMode::Auto,
            user_speed: 0,
            target_temp: 25.0,
            hysteresis: 2.0,
            min_speed: 1,
            max_speed: 4,
        }
    }
}

/// One enable flag per sensor kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorStateSettings {
    #[serde(with = "state_string")]
    pub bme280: bool,
    #[serde(with = "state_string")]
    pub ds18b20: bool,
    #[serde(with = "state_string")]
    pub tsl2591: bool,
    #[serde(with = "state_string")]
    pub veml6075: bool,
    #[serde(with = "state_string")]
    pub mlx90614: bool,
    #[serde(with = "state_string")]
    pub vl53l0x: bool,
    #[serde(with = "state_string")]
    pub hcsr04: bool,
}

impl SensorStateSettings {
    /// Look up an enable flag by its query-string name (`bme280_state`, ...).
    pub fn set_state(&mut self, field: &str, value: bool) -> bool {
        let slot = match field {
            "bme280_state" => &mut self.bme280,
            "ds18b20_state" => &mut self.ds18b20,
            "tsl2591_state" => &mut self.tsl2591,
            "veml6075_state" => &mut self.veml6075,
            "mlx90614_state" => &mut self.mlx90614,
            "vl53l0x_state" => &mut self.vl53l0x,
            "hcsr04_state" => &mut self.hcsr04,
            _ => return false,
        };
        *slot = value;
        true
    }
}

impl Default for SensorStateSettings {
    fn default() -> Self {
        Self {
            bme280: true,
            ds18b20: true,
            tsl2591: true,
            veml6075: false,
            mlx90614: false,
            vl53l0x: false,
            hcsr04: false,
        }
    }
}

impl ConfigSnapshot {
    /// Validate the snapshot invariants: hours 0-23, minutes 0-59, speeds
    /// 0-4 with `min_speed <= max_speed`, and a syntactically valid sink
    /// host IP. Returns the first violation.
    pub fn validate(&self) -> Result<()> {
        self.daily_timer1.validate("DailyTimer1_Settings")?;
        self.daily_timer2.validate("DailyTimer2_Settings")?;

        for (field, speed) in [
            ("Motor_Settings.user_speed", self.motor.user_speed),
            ("Motor_Settings.min_speed", self.motor.min_speed),
            ("Motor_Settings.max_speed", self.motor.max_speed),
        ] {
            if speed > crate::constants::limits::MAX_FAN_SPEED {
                return Err(GrowboxError::invalid_config(
                    field,
                    format!("speed out of range (0-4): {}", speed),
                ));
            }
        }
        if self.motor.min_speed > self.motor.max_speed {
            return Err(GrowboxError::invalid_config(
                "Motor_Settings.min_speed",
                format!(
                    "min_speed {} exceeds max_speed {}",
                    self.motor.min_speed, self.motor.max_speed
                ),
            ));
        }

        if self.network.host_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(GrowboxError::invalid_config(
                "Network_Settings.host_addr",
                format!("not a valid IP address: {:?}", self.network.host_addr),
            ));
        }

        Ok(())
    }
}
