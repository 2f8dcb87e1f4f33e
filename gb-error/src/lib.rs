//! Unified error handling for Growbox
//!
//! This crate provides the single error type used across all Growbox
//! components. It uses thiserror for ergonomic error definitions with proper
//! Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using GrowboxError
pub type Result<T> = std::result::Result<T, GrowboxError>;

/// Unified error type for all Growbox operations
#[derive(thiserror::Error, Debug)]
pub enum GrowboxError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse configuration {path}: {cause}")]
    ConfigParse {
        path: PathBuf,
        cause: String,
    },

    #[error("Failed to persist configuration {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // GPIO / Hardware Errors
    // ============================================================================
    #[error("Failed to export GPIO {pin}: {reason}")]
    GpioExport {
        pin: u32,
        reason: String,
    },

    #[error("Failed to write GPIO {pin}: {source}")]
    GpioWrite {
        pin: u32,
        source: io::Error,
    },

    #[error("Failed to read GPIO {pin}: {source}")]
    GpioRead {
        pin: u32,
        source: io::Error,
    },

    // ============================================================================
    // Sensor Errors
    // ============================================================================
    #[error("Failed to read sensor {sensor}: {reason}")]
    SensorRead {
        sensor: String,
        reason: String,
    },

    #[error("Sensor {0} is not available")]
    SensorUnavailable(String),

    // ============================================================================
    // HTTP / Sink Errors
    // ============================================================================
    #[error("Malformed HTTP request: {0}")]
    Protocol(String),

    #[error("Time-series sink error: {0}")]
    Sink(String),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl GrowboxError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a field validation error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a sensor read error
    pub fn sensor_read(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SensorRead {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }
}

// Allow converting from String to GrowboxError
impl From<String> for GrowboxError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to GrowboxError
impl From<&str> for GrowboxError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_carry_context() {
        let e = GrowboxError::invalid_config("dt1start", "hour out of range");
        assert_eq!(
            e.to_string(),
            "Invalid configuration value for dt1start: hour out of range"
        );

        let e = GrowboxError::GpioExport {
            pin: 17,
            reason: "Device or resource busy".into(),
        };
        assert!(e.to_string().contains("GPIO 17"));
    }

    #[test]
    fn string_conversion() {
        let e: GrowboxError = "boom".into();
        assert_eq!(e.to_string(), "boom");
    }
}
