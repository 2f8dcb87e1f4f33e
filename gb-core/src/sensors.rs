//! Sensor identifiers and the failure-tolerant access layer
//!
//! Controllers and the HTTP facade never talk to a driver directly: every
//! read goes through [`SensorHub::read`], which yields `Option<f64>` and
//! never panics. A sensor that is disabled in the configuration, missing
//! from the bus, or mid-failure simply reads as `None`; the first failure
//! is logged at WARN and repeats are demoted so a dead probe cannot flood
//! the log.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::constants::limits::SENSOR_WARN_EVERY;
use crate::constants::paths;
use crate::data::config::SensorStateSettings;
use crate::data::extrema::ExtremaStore;
use crate::hw::drivers::{find_iio_device, find_w1_therms, IioChannel, W1Therm};
use gb_error::Result;

/// The closed set of sensor channels. The string form exists only for the
/// HTTP boundary and the persisted extrema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorId {
    Bme280Temp,
    Bme280Humidity,
    Bme280Pressure,
    Ds18b1,
    Ds18b2,
    Ds18b3,
    TslLux,
    TslIr,
    VemlUva,
    VemlUvb,
    VemlUvIndex,
    MlxAmbient,
    MlxObject,
    Vl53Distance,
    HcsrDistance,
}

impl SensorId {
    pub const ALL: [SensorId; 15] = [
        SensorId::Bme280Temp,
        SensorId::Bme280Humidity,
        SensorId::Bme280Pressure,
        SensorId::Ds18b1,
        SensorId::Ds18b2,
        SensorId::Ds18b3,
        SensorId::TslLux,
        SensorId::TslIr,
        SensorId::VemlUva,
        SensorId::VemlUvb,
        SensorId::VemlUvIndex,
        SensorId::MlxAmbient,
        SensorId::MlxObject,
        SensorId::Vl53Distance,
        SensorId::HcsrDistance,
    ];

    /// Channels whose extremes are tracked and persisted.
    pub const TRACKED: [SensorId; 8] = [
        SensorId::Bme280Temp,
        SensorId::Bme280Humidity,
        SensorId::Bme280Pressure,
        SensorId::Ds18b1,
        SensorId::Ds18b2,
        SensorId::Ds18b3,
        SensorId::TslLux,
        SensorId::MlxAmbient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorId::Bme280Temp => "BME280T",
            SensorId::Bme280Humidity => "BME280H",
            SensorId::Bme280Pressure => "BME280P",
            SensorId::Ds18b1 => "DS18B#1",
            SensorId::Ds18b2 => "DS18B#2",
            SensorId::Ds18b3 => "DS18B#3",
            SensorId::TslLux => "TSL-LUX",
            SensorId::TslIr => "TSL-IR",
            SensorId::VemlUva => "VEML-UVA",
            SensorId::VemlUvb => "VEML-UVB",
            SensorId::VemlUvIndex => "VEML-UVINDEX",
            SensorId::MlxAmbient => "MLX-AMB",
            SensorId::MlxObject => "MLX-OBJ",
            SensorId::Vl53Distance => "VL53-DIST",
            SensorId::HcsrDistance => "HCSR-DIST",
        }
    }

    pub fn parse(s: &str) -> Option<SensorId> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }

    /// The physical chip this channel belongs to.
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorId::Bme280Temp | SensorId::Bme280Humidity | SensorId::Bme280Pressure => {
                SensorKind::Bme280
            }
            SensorId::Ds18b1 | SensorId::Ds18b2 | SensorId::Ds18b3 => SensorKind::Ds18b20,
            SensorId::TslLux | SensorId::TslIr => SensorKind::Tsl2591,
            SensorId::VemlUva | SensorId::VemlUvb | SensorId::VemlUvIndex => SensorKind::Veml6075,
            SensorId::MlxAmbient | SensorId::MlxObject => SensorKind::Mlx90614,
            SensorId::Vl53Distance => SensorKind::Vl53l0x,
            SensorId::HcsrDistance => SensorKind::Hcsr04,
        }
    }

    pub fn is_tracked(&self) -> bool {
        Self::TRACKED.contains(self)
    }
}

/// Physical sensor chips; each has one enable flag in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Bme280,
    Ds18b20,
    Tsl2591,
    Veml6075,
    Mlx90614,
    Vl53l0x,
    Hcsr04,
}

impl SensorKind {
    pub fn enabled_in(&self, states: &SensorStateSettings) -> bool {
        match self {
            SensorKind::Bme280 => states.bme280,
            SensorKind::Ds18b20 => states.ds18b20,
            SensorKind::Tsl2591 => states.tsl2591,
            SensorKind::Veml6075 => states.veml6075,
            SensorKind::Mlx90614 => states.mlx90614,
            SensorKind::Vl53l0x => states.vl53l0x,
            SensorKind::Hcsr04 => states.hcsr04,
        }
    }
}

/// Uniform access to every sensor channel, with extrema tracking attached.
pub struct SensorHub {
    iio: HashMap<&'static str, PathBuf>,
    w1: Vec<W1Therm>,
    extrema: Mutex<ExtremaStore>,
    fail_counts: Mutex<HashMap<SensorId, u32>>,
}

/// iio device `name` attribute values the hub looks for.
const IIO_NAMES: [&str; 5] = ["bme280", "tsl2591", "veml6075", "mlx90614", "vl53l0x"];
/// The HC-SR04 ranger binds to the srf04 iio driver.
const HCSR_NAME: &str = "srf04";

impl SensorHub {
    /// Scan the standard sysfs bases and load the extrema file.
    pub fn discover(extrema_path: &Path) -> Self {
        Self::discover_at(
            Path::new(paths::IIO_BASE),
            Path::new(paths::W1_BASE),
            extrema_path,
        )
    }

    /// Scan alternate bases. Test seam.
    pub fn discover_at(iio_base: &Path, w1_base: &Path, extrema_path: &Path) -> Self {
        let mut iio = HashMap::new();
        for name in IIO_NAMES.into_iter().chain([HCSR_NAME]) {
            if let Some(dir) = find_iio_device(iio_base, name) {
                debug!("Found iio device {} at {:?}", name, dir);
                iio.insert(name, dir);
            }
        }

        let w1 = find_w1_therms(w1_base);
        if !w1.is_empty() {
            debug!("Found {} DS18B20 probe(s)", w1.len());
        }

        Self {
            iio,
            w1,
            extrema: Mutex::new(ExtremaStore::load(extrema_path)),
            fail_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Read one channel. Disabled, absent, and failing sensors all read as
    /// `None`; this never panics and never blocks beyond the file read.
    pub fn read(&self, id: SensorId, states: &SensorStateSettings) -> Option<f64> {
        if !id.kind().enabled_in(states) {
            debug!("Sensor {} is disabled", id.as_str());
            return None;
        }

        match self.read_raw(id) {
            Some(Ok(value)) => {
                self.fail_counts.lock().remove(&id);
                if id.is_tracked() {
                    if let Err(e) = self.extrema.lock().observe(id.as_str(), value) {
                        warn!("Failed to persist extrema for {}: {}", id.as_str(), e);
                    }
                }
                Some(value)
            }
            Some(Err(e)) => {
                self.note_failure(id, &e.to_string());
                None
            }
            None => {
                self.note_failure(id, "driver not present");
                None
            }
        }
    }

    /// Route the id to its driver. `None` when the driver was not found at
    /// discovery time.
    fn read_raw(&self, id: SensorId) -> Option<Result<f64>> {
        let iio = |name: &str, attr: &'static str, scale: f64| {
            self.iio
                .get(name)
                .map(|dir| IioChannel::new(dir.clone(), attr, scale).read())
        };

        match id {
            // Millidegrees -> °C
            SensorId::Bme280Temp => iio("bme280", "in_temp_input", 0.001),
            // Milli-%RH -> %RH
            SensorId::Bme280Humidity => iio("bme280", "in_humidityrelative_input", 0.001),
            // kPa -> hPa
            SensorId::Bme280Pressure => iio("bme280", "in_pressure_input", 10.0),
            SensorId::Ds18b1 => self.w1.first().map(W1Therm::read),
            SensorId::Ds18b2 => self.w1.get(1).map(W1Therm::read),
            SensorId::Ds18b3 => self.w1.get(2).map(W1Therm::read),
            SensorId::TslLux => iio("tsl2591", "in_illuminance_input", 1.0),
            SensorId::TslIr => iio("tsl2591", "in_intensity_ir_raw", 1.0),
            SensorId::VemlUva => iio("veml6075", "in_intensity_uva_raw", 1.0),
            SensorId::VemlUvb => iio("veml6075", "in_intensity_uvb_raw", 1.0),
            SensorId::VemlUvIndex => iio("veml6075", "in_uvindex_input", 1.0),
            SensorId::MlxAmbient => iio("mlx90614", "in_temp_ambient_input", 0.001),
            SensorId::MlxObject => iio("mlx90614", "in_temp_object_input", 0.001),
            // Meters -> millimeters
            SensorId::Vl53Distance => iio("vl53l0x", "in_distance_input", 1000.0),
            SensorId::HcsrDistance => iio(HCSR_NAME, "in_distance_input", 1000.0),
        }
    }

    fn note_failure(&self, id: SensorId, reason: &str) {
        let mut counts = self.fail_counts.lock();
        let count = counts.entry(id).or_insert(0);
        *count += 1;
        if *count == 1 || *count % SENSOR_WARN_EVERY == 0 {
            warn!(
                "Sensor {} read failed (count {}): {}",
                id.as_str(),
                count,
                reason
            );
        } else {
            debug!("Sensor {} read failed: {}", id.as_str(), reason);
        }
    }

    /// Snapshot of the extrema records for the monitor page.
    pub fn extrema_snapshot(&self) -> Vec<(String, crate::data::extrema::ExtremaRecord)> {
        self.extrema
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Reset the extrema record for one sensor id string.
    pub fn reset_extrema(&self, sensor_id: &str) -> Result<()> {
        self.extrema.lock().reset(sensor_id)
    }
}
