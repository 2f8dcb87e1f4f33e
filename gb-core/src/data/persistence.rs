//! JSON persistence for the configuration document
//!
//! Readers must never observe a partial document, so every save goes
//! through a sibling temp file, fsync, and an atomic rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::paths;
use crate::data::config::ConfigSnapshot;
use gb_error::{GrowboxError, Result};

/// Resolve the directory holding `param.json` and `sensor_stats.json`.
pub fn resolve_config_dir() -> PathBuf {
    paths::config_dir()
}

/// Load and validate the configuration document.
///
/// A missing or structurally invalid file is an error; startup treats it as
/// fatal, the HTTP facade never calls this with an unvalidated path.
pub fn load_config(path: &Path) -> Result<ConfigSnapshot> {
    let contents = fs::read_to_string(path).map_err(|e| GrowboxError::ConfigParse {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;

    let snapshot: ConfigSnapshot =
        serde_json::from_str(&contents).map_err(|e| GrowboxError::ConfigParse {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

    snapshot.validate()?;

    info!("Loaded configuration from {:?}", path);
    Ok(snapshot)
}

/// Atomically replace the configuration file with the given snapshot.
pub fn save_config(path: &Path, snapshot: &ConfigSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    write_atomic(path, json.as_bytes())?;

    debug!("Saved configuration to {:?}", path);
    Ok(())
}

/// Load, apply one mutation, validate, and save — the smallest change unit.
///
/// The mutation is discarded when the result fails validation.
pub fn update_config(
    path: &Path,
    mutate: impl FnOnce(&mut ConfigSnapshot),
) -> Result<ConfigSnapshot> {
    let mut snapshot = load_config(path)?;
    mutate(&mut snapshot);
    snapshot.validate()?;
    save_config(path, &snapshot)?;
    Ok(snapshot)
}

/// Write-to-temp, fsync, rename. Shared by the config and extrema stores.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).map_err(|e| GrowboxError::ConfigWrite {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(bytes).map_err(|e| GrowboxError::ConfigWrite {
        path: temp_path.clone(),
        source: e,
    })?;

    file.sync_all().map_err(|e| GrowboxError::ConfigWrite {
        path: temp_path.clone(),
        source: e,
    })?;

    drop(file);

    fs::rename(&temp_path, path).map_err(|e| GrowboxError::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");

        let mut cfg = ConfigSnapshot::default();
        cfg.daily_timer1.start_hour = 17;
        cfg.daily_timer1.start_minute = 30;
        cfg.heater.enabled = true;

        save_config(&path, &cfg).unwrap();
        let back = load_config(&path).unwrap();

        assert_eq!(back.daily_timer1.start_hour, 17);
        assert_eq!(back.daily_timer1.start_minute, 30);
        assert!(back.heater.enabled);
    }

    #[test]
    fn saved_bytes_use_state_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");

        let mut cfg = ConfigSnapshot::default();
        cfg.heater.enabled = true;
        save_config(&path, &cfg).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""enabled": "enabled""#));
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, GrowboxError::ConfigParse { .. }));
    }

    #[test]
    fn load_rejects_invalid_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");
        std::fs::write(&path, "{\"DailyTimer1_Settings\": 5}").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn load_rejects_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");

        let mut cfg = ConfigSnapshot::default();
        save_config(&path, &cfg).unwrap();

        // Corrupt the stored hour out of range, bypassing validation.
        cfg.daily_timer1.start_hour = 99;
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        std::fs::write(&path, json).unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn update_applies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");
        save_config(&path, &ConfigSnapshot::default()).unwrap();

        update_config(&path, |cfg| cfg.cyclic1.period_minutes = 5).unwrap();

        let back = load_config(&path).unwrap();
        assert_eq!(back.cyclic1.period_minutes, 5);
    }

    #[test]
    fn update_rejects_invalid_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");
        save_config(&path, &ConfigSnapshot::default()).unwrap();

        let err = update_config(&path, |cfg| cfg.motor.max_speed = 9).unwrap_err();
        assert!(matches!(err, GrowboxError::InvalidConfig { .. }));

        // File untouched by the failed update.
        let back = load_config(&path).unwrap();
        assert_eq!(back.motor.max_speed, 4);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.json");
        save_config(&path, &ConfigSnapshot::default()).unwrap();
        assert!(!dir.path().join("param.json.tmp").exists());
    }
}
