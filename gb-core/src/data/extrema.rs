//! Persistent min/max tracking for sensor readings
//!
//! Each tracked sensor keeps its observed extremes together with the local
//! timestamp of the observation. The store is rewritten (atomically) after
//! every update so a power cut never loses more than the last sample.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::persistence::write_atomic;
use gb_error::{GrowboxError, Result};

/// Extremes for one sensor. `min`/`max` are null before the first
/// observation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtremaRecord {
    pub min: Option<f64>,
    pub min_date: Option<String>,
    pub max: Option<f64>,
    pub max_date: Option<String>,
}

impl ExtremaRecord {
    /// Fold one observation into the record. Returns true when either
    /// extreme moved.
    fn observe(&mut self, value: f64, stamp: &str) -> bool {
        let mut changed = false;
        if self.min.map_or(true, |m| value < m) {
            self.min = Some(value);
            self.min_date = Some(stamp.to_string());
            changed = true;
        }
        if self.max.map_or(true, |m| value > m) {
            self.max = Some(value);
            self.max_date = Some(stamp.to_string());
            changed = true;
        }
        changed
    }
}

/// All extrema records, keyed by sensor id, backed by `sensor_stats.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExtremaStore {
    #[serde(flatten)]
    records: BTreeMap<String, ExtremaRecord>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl ExtremaStore {
    /// Load the store, or start empty when the file does not exist yet.
    /// A corrupt file is replaced rather than fatal — extrema are
    /// best-effort statistics, not configuration.
    pub fn load(path: &Path) -> Self {
        let mut store = if path.exists() {
            match fs::read_to_string(path)
                .map_err(GrowboxError::from)
                .and_then(|s| serde_json::from_str::<ExtremaStore>(&s).map_err(GrowboxError::from))
            {
                Ok(store) => store,
                Err(e) => {
                    warn!("Extrema file {:?} unreadable ({}), starting fresh", path, e);
                    ExtremaStore::default()
                }
            }
        } else {
            debug!("No extrema file at {:?}, starting fresh", path);
            ExtremaStore::default()
        };
        store.path = Some(path.to_path_buf());
        store
    }

    /// Record an observation at the current local time and persist.
    pub fn observe(&mut self, sensor_id: &str, value: f64) -> Result<()> {
        self.observe_at(sensor_id, value, Local::now())
    }

    /// Record an observation with an explicit timestamp (test seam).
    pub fn observe_at(
        &mut self,
        sensor_id: &str,
        value: f64,
        now: DateTime<Local>,
    ) -> Result<()> {
        let stamp = now.format("%Y-%m-%dT%H:%M:%S").to_string();
        let changed = self
            .records
            .entry(sensor_id.to_string())
            .or_default()
            .observe(value, &stamp);
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    /// Drop the record for one sensor and persist. Unknown ids are a no-op.
    pub fn reset(&mut self, sensor_id: &str) -> Result<()> {
        if self.records.remove(sensor_id).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn get(&self, sensor_id: &str) -> Option<&ExtremaRecord> {
        self.records.get(sensor_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtremaRecord)> {
        self.records.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(()); // In-memory store (tests).
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }
}
