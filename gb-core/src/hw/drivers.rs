//! Kernel-exported sensor drivers
//!
//! The chamber's I²C chips are bound to their in-kernel drivers, which
//! publish readings as Industrial I/O attribute files under
//! `/sys/bus/iio/devices`; the DS18B20 probes hang off the 1-Wire bus under
//! `/sys/bus/w1/devices`. This module only reads those attribute files —
//! the chip protocols themselves stay in the kernel.

use std::fs;
use std::path::{Path, PathBuf};

use gb_error::{GrowboxError, Result};

/// One scaled channel of an iio device.
#[derive(Debug, Clone)]
pub struct IioChannel {
    device_dir: PathBuf,
    attr: &'static str,
    scale: f64,
}

impl IioChannel {
    pub fn new(device_dir: PathBuf, attr: &'static str, scale: f64) -> Self {
        Self {
            device_dir,
            attr,
            scale,
        }
    }

    /// Read and scale the channel value.
    pub fn read(&self) -> Result<f64> {
        let path = self.device_dir.join(self.attr);
        let raw = fs::read_to_string(&path).map_err(|e| {
            GrowboxError::sensor_read(self.attr, format!("{:?}: {}", path, e))
        })?;
        let value: f64 = raw.trim().parse().map_err(|_| {
            GrowboxError::sensor_read(self.attr, format!("unparseable value {:?}", raw.trim()))
        })?;
        Ok(value * self.scale)
    }
}

/// A DS18B20 probe exposed through the w1_therm kernel driver.
#[derive(Debug, Clone)]
pub struct W1Therm {
    slave_path: PathBuf,
}

impl W1Therm {
    pub fn new(slave_path: PathBuf) -> Self {
        Self { slave_path }
    }

    /// Parse the two-line `w1_slave` format:
    ///
    /// ```text
    /// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
    /// 72 01 4b 46 7f ff 0e 10 57 t=23125
    /// ```
    ///
    /// The CRC verdict on the first line gates the temperature on the
    /// second (millidegrees Celsius).
    pub fn read(&self) -> Result<f64> {
        let name = self.slave_path.display().to_string();
        let raw = fs::read_to_string(&self.slave_path)
            .map_err(|e| GrowboxError::sensor_read(name.as_str(), e.to_string()))?;

        let mut lines = raw.lines();
        let crc_line = lines
            .next()
            .ok_or_else(|| GrowboxError::sensor_read(name.as_str(), "empty w1_slave"))?;
        if !crc_line.trim_end().ends_with("YES") {
            return Err(GrowboxError::sensor_read(name.as_str(), "CRC check failed"));
        }

        let temp_line = lines
            .next()
            .ok_or_else(|| GrowboxError::sensor_read(name.as_str(), "missing temperature line"))?;
        let milli: i32 = temp_line
            .rsplit_once("t=")
            .and_then(|(_, t)| t.trim().parse().ok())
            .ok_or_else(|| {
                GrowboxError::sensor_read(name.as_str(), format!("no t= field in {:?}", temp_line))
            })?;

        Ok(f64::from(milli) / 1000.0)
    }
}

/// Find the iio device directory whose `name` attribute matches.
pub fn find_iio_device(base: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(base).ok()?;
    for entry in entries.flatten() {
        let dir = entry.path();
        if let Ok(dev_name) = fs::read_to_string(dir.join("name")) {
            if dev_name.trim() == name {
                return Some(dir);
            }
        }
    }
    None
}

/// Enumerate DS18B20 slaves (`28-*` family), sorted by id so `DS18B#1`
/// always maps to the same probe.
pub fn find_w1_therms(base: &Path) -> Vec<W1Therm> {
    let mut slaves: Vec<PathBuf> = match fs::read_dir(base) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("28-"))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    slaves.sort();
    slaves
        .into_iter()
        .map(|p| W1Therm::new(p.join("w1_slave")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iio_channel_scales() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("in_temp_input"), "23125\n").unwrap();

        let ch = IioChannel::new(tmp.path().to_path_buf(), "in_temp_input", 0.001);
        assert!((ch.read().unwrap() - 23.125).abs() < 1e-9);
    }

    #[test]
    fn iio_channel_missing_attr_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let ch = IioChannel::new(tmp.path().to_path_buf(), "in_temp_input", 1.0);
        assert!(ch.read().is_err());
    }

    #[test]
    fn w1_parses_valid_slave() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("w1_slave");
        std::fs::write(
            &path,
            "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n",
        )
        .unwrap();

        let probe = W1Therm::new(path);
        assert!((probe.read().unwrap() - 23.125).abs() < 1e-9);
    }

    #[test]
    fn w1_rejects_bad_crc() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("w1_slave");
        std::fs::write(
            &path,
            "72 01 4b 46 7f ff 0e 10 00 : crc=57 NO\n72 01 4b 46 7f ff 0e 10 57 t=23125\n",
        )
        .unwrap();

        assert!(W1Therm::new(path).read().is_err());
    }

    #[test]
    fn w1_handles_negative_temperatures() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("w1_slave");
        std::fs::write(
            &path,
            "f8 ff 4b 46 7f ff 0e 10 aa : crc=aa YES\nf8 ff 4b 46 7f ff 0e 10 aa t=-500\n",
        )
        .unwrap();

        assert!((W1Therm::new(path).read().unwrap() + 0.5).abs() < 1e-9);
    }

    #[test]
    fn iio_discovery_matches_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dev0 = tmp.path().join("iio:device0");
        let dev1 = tmp.path().join("iio:device1");
        std::fs::create_dir_all(&dev0).unwrap();
        std::fs::create_dir_all(&dev1).unwrap();
        std::fs::write(dev0.join("name"), "tsl2591\n").unwrap();
        std::fs::write(dev1.join("name"), "bme280\n").unwrap();

        assert_eq!(find_iio_device(tmp.path(), "bme280"), Some(dev1));
        assert_eq!(find_iio_device(tmp.path(), "veml6075"), None);
    }

    #[test]
    fn w1_discovery_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["28-0316a2c4", "28-0117b1aa", "w1_bus_master1"] {
            std::fs::create_dir_all(tmp.path().join(name)).unwrap();
        }

        let probes = find_w1_therms(tmp.path());
        assert_eq!(probes.len(), 2);
    }
}
