//! Sysfs GPIO output lines
//!
//! Relay boards on the chamber are active-LOW: energizing a relay means
//! driving its line low. That polarity is a property of [`Output`], not of
//! the controllers — they speak logical ON/OFF and never see the inversion.
//!
//! Every `get()` re-reads the `value` attribute; nothing is cached, so the
//! readback always reflects the hardware.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::constants::paths::GPIO_BASE;
use gb_error::{GrowboxError, Result};

/// Handle to a sysfs GPIO tree (`/sys/class/gpio` in production, a tempdir
/// in tests).
#[derive(Debug, Clone)]
pub struct GpioChip {
    base: PathBuf,
}

impl GpioChip {
    pub fn new() -> Self {
        Self {
            base: PathBuf::from(GPIO_BASE),
        }
    }

    /// Use an alternate sysfs root. Test seam.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Claim a pin as an output, driven to logical OFF (electrically HIGH).
    ///
    /// Fails when the kernel refuses the export — typically because the pin
    /// is already claimed by another process or the caller lacks permission.
    pub fn output(&self, pin: u32) -> Result<Output> {
        let dir = self.base.join(format!("gpio{}", pin));

        if !dir.is_dir() {
            let export = self.base.join("export");
            fs::write(&export, pin.to_string()).map_err(|e| GrowboxError::GpioExport {
                pin,
                reason: e.to_string(),
            })?;
        }

        if !dir.is_dir() {
            return Err(GrowboxError::GpioExport {
                pin,
                reason: format!("{:?} did not appear after export", dir),
            });
        }

        // "high" = output mode with the line driven high, i.e. relay off.
        fs::write(dir.join("direction"), "high").map_err(|e| GrowboxError::GpioExport {
            pin,
            reason: format!("setting direction: {}", e),
        })?;

        debug!("Claimed GPIO {} as output (off)", pin);
        Ok(Output {
            pin,
            dir,
            base: self.base.clone(),
        })
    }
}

impl Default for GpioChip {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned GPIO output line with active-low relay polarity.
#[derive(Debug)]
pub struct Output {
    pin: u32,
    dir: PathBuf,
    base: PathBuf,
}

impl Output {
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Drive the line. Logical ON writes `0` (LOW), logical OFF writes `1`.
    pub fn set(&mut self, on: bool) -> Result<()> {
        let level = if on { "0" } else { "1" };
        fs::write(self.dir.join("value"), level)
            .map_err(|e| GrowboxError::GpioWrite { pin: self.pin, source: e })
    }

    /// Read the line back from the hardware. True iff it reads LOW.
    pub fn get(&self) -> Result<bool> {
        let raw = fs::read_to_string(self.dir.join("value"))
            .map_err(|e| GrowboxError::GpioRead { pin: self.pin, source: e })?;
        Ok(raw.trim() == "0")
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        // Leave the relay de-energized and release the pin.
        let _ = fs::write(self.dir.join("value"), "1");
        match fs::write(self.base.join("unexport"), self.pin.to_string()) {
            Ok(()) => debug!("Released GPIO {}", self.pin),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => debug!("Unexport of GPIO {} failed: {}", self.pin, e),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// Build a fake sysfs GPIO tree inside `base` for the given pins.
    pub fn fake_gpio_tree(base: &Path, pins: &[u32]) -> Vec<PathBuf> {
        std::fs::write(base.join("export"), "").unwrap();
        std::fs::write(base.join("unexport"), "").unwrap();
        pins.iter()
            .map(|pin| {
                let dir = base.join(format!("gpio{}", pin));
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("direction"), "in").unwrap();
                std::fs::write(dir.join("value"), "1").unwrap();
                dir
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::fake_gpio_tree;
    use super::*;

    #[test]
    fn construction_drives_off() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = fake_gpio_tree(tmp.path(), &[17]);
        let chip = GpioChip::with_base(tmp.path());

        let out = chip.output(17).unwrap();
        assert_eq!(
            std::fs::read_to_string(dirs[0].join("direction")).unwrap(),
            "high"
        );
        assert!(!out.get().unwrap());
    }

    #[test]
    fn logical_on_drives_low() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = fake_gpio_tree(tmp.path(), &[17]);
        let chip = GpioChip::with_base(tmp.path());

        let mut out = chip.output(17).unwrap();
        out.set(true).unwrap();
        assert_eq!(std::fs::read_to_string(dirs[0].join("value")).unwrap(), "0");
        assert!(out.get().unwrap());

        out.set(false).unwrap();
        assert_eq!(std::fs::read_to_string(dirs[0].join("value")).unwrap(), "1");
        assert!(!out.get().unwrap());
    }

    #[test]
    fn export_failure_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        // No export file, no gpio dir: construction must fail cleanly.
        let chip = GpioChip::with_base(tmp.path());
        assert!(matches!(
            chip.output(5),
            Err(GrowboxError::GpioExport { pin: 5, .. })
        ));
    }

    #[test]
    fn drop_de_energizes() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = fake_gpio_tree(tmp.path(), &[17]);
        let chip = GpioChip::with_base(tmp.path());

        {
            let mut out = chip.output(17).unwrap();
            out.set(true).unwrap();
        }
        assert_eq!(std::fs::read_to_string(dirs[0].join("value")).unwrap(), "1");
    }
}
