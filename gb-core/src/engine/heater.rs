//! Heater deadband decision
//!
//! The heater is banded, not proportional: below `lo` it turns on, above
//! `hi` it turns off, and inside `[lo, hi]` it retains whatever state it
//! already has. Day and night use separate limit pairs; the hysteresis
//! offset widens the band symmetrically.

use crate::data::config::TemperatureSettings;

/// The deadband `[lo, hi]` active for the current day/night phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterBand {
    pub lo: f64,
    pub hi: f64,
}

/// Compute the deadband for day (`true`) or night (`false`).
pub fn band_for(day: bool, temps: &TemperatureSettings) -> HeaterBand {
    let off = temps.hysteresis_offset;
    let (min, max) = if day {
        (temps.min_day, temps.max_day)
    } else {
        (temps.min_night, temps.max_night)
    };
    HeaterBand {
        lo: min - off,
        hi: max + off,
    }
}

/// Decide the heater state for a reading, retaining the current state
/// inside the deadband.
pub fn decide(band: HeaterBand, t: f64, currently_on: bool) -> bool {
    if t < band.lo {
        true
    } else if t > band.hi {
        false
    } else {
        currently_on
    }
}
