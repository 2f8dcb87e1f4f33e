//! Shared types and parsers for the Growbox HTTP boundary.
//!
//! The daemon's HTTP facade speaks plain HTTP/1.1 with query-string
//! parameters; this crate holds the wire documents (`/status` report,
//! sensor reading maps) next to the parsing and validation helpers that
//! guard them, so the daemon and the core agree on one definition of
//! "valid input".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum accepted HTTP request-line length in bytes.
pub const MAX_REQUEST_LINE: usize = 4 * 1024;

// ============================================================================
// /status document
// ============================================================================

/// The `/status` JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// "Enabled" or "Disabled" (heater block state).
    pub component_state: String,
    /// Current motor speed 0..=4, or null before the first fan tick.
    pub motor_speed: Option<u8>,
    pub dailytimer1: WindowReport,
    pub cyclic: CycleReport,
}

/// A daily window rendered as wall-clock strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub stop: String,
}

impl WindowReport {
    pub fn new(start: (u8, u8), stop: (u8, u8)) -> Self {
        Self {
            start: format!("{:02}:{:02}", start.0, start.1),
            stop: format!("{:02}:{:02}", stop.0, stop.1),
        }
    }
}

/// A cyclic schedule rendered for `/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Period in minutes.
    pub period: u32,
    /// ON duration in seconds.
    pub duration: u32,
}

/// Reading map served by `/temperature`, `/hygrometry` and `/pressure`:
/// sensor id → scalar reading or null.
pub type ReadingMap = BTreeMap<String, Option<f64>>;

// ============================================================================
// Query-string parsing
// ============================================================================

/// Split a raw query string into decoded key/value pairs.
///
/// Pairs without '=' become `(key, "")`. Order is preserved so field
/// application stays deterministic.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_percent(k), decode_percent(v)),
            None => (decode_percent(pair), String::new()),
        })
        .collect()
}

/// Minimal percent-decoding for query values ('+' becomes a space).
///
/// Invalid escapes are passed through verbatim rather than rejected; the
/// field-level parsers reject anything that doesn't parse afterwards.
pub fn decode_percent(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let decoded = bytes
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(v) => {
                        out.push(v);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// Field parsers
// ============================================================================

/// Parse an "HH:MM" wall-clock value, rejecting out-of-range components.
pub fn parse_hhmm(s: &str) -> Result<(u8, u8), String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got {:?}", s))?;
    let hour: u8 = h
        .parse()
        .map_err(|_| format!("invalid hour in {:?}", s))?;
    let minute: u8 = m
        .parse()
        .map_err(|_| format!("invalid minute in {:?}", s))?;
    if hour >= 24 {
        return Err(format!("hour out of range (0-23): {}", hour));
    }
    if minute >= 60 {
        return Err(format!("minute out of range (0-59): {}", minute));
    }
    Ok((hour, minute))
}

/// Parse a boolean flag from its accepted spellings.
///
/// Returns `None` for anything not recognized so the caller can reject the
/// field without guessing.
pub fn parse_bool_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "enabled" | "on" | "yes" => Some(true),
        "0" | "false" | "disabled" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a positive integer (≥ 1) for cyclic period/duration fields.
pub fn parse_positive_u32(s: &str) -> Result<u32, String> {
    let v: u32 = s
        .parse()
        .map_err(|_| format!("expected an integer, got {:?}", s))?;
    if v == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(v)
}

/// Parse a fan speed index (0..=4).
pub fn parse_speed(s: &str) -> Result<u8, String> {
    let v: u8 = s
        .parse()
        .map_err(|_| format!("expected an integer, got {:?}", s))?;
    if v > 4 {
        return Err(format!("speed out of range (0-4): {}", v));
    }
    Ok(v)
}

// ============================================================================
// Time-series line protocol
// ============================================================================

/// Encode one line-protocol sample: `measurement field1=v1,field2=v2`.
///
/// Field keys are sanitized to the line-protocol bare-key alphabet; the
/// sensor-id characters '#' and '-' become '_'.
pub fn encode_line(measurement: &str, fields: &[(String, f64)]) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", sanitize_field_key(k), v))
        .collect::<Vec<_>>()
        .join(",");
    Some(format!("{} {}", measurement, body))
}

fn sanitize_field_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c
            } else {
                '_'
            }
        })
        .collect()
}
