//! Staged-fan speed selection
//!
//! Maps an ambient temperature onto one of the four relay-selected fan
//! speeds using hysteresis banding around a set-point. The bands step the
//! speed up from `min_speed` as the temperature climbs past the target in
//! increments of the hysteresis width; `max_speed` caps every band.

use serde::{Deserialize, Serialize};

use crate::constants::limits::MAX_FAN_SPEED;
use crate::data::config::MotorSettings;

/// Fan operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    /// The user-selected speed is applied as-is.
    Manual,
    /// Speed follows the temperature banding below.
    Auto,
}

/// Select the speed stage for a temperature reading in auto mode.
///
/// The reading is rounded to one decimal first so jitter below 0.05 °C
/// cannot flip a band. The lower band boundary is non-strict: `t == target`
/// already selects the first step above `min_speed`.
pub fn select_speed(t: f64, motor: &MotorSettings) -> u8 {
    let t = round1(t);
    let mn = motor.min_speed.min(MAX_FAN_SPEED);
    let mx = motor.max_speed.min(MAX_FAN_SPEED);
    let target = motor.target_temp;
    let h = motor.hysteresis;

    let speed = if t < target {
        mn
    } else if t < target + h {
        (mn + 1).min(mx)
    } else if t < target + 2.0 * h {
        (mn + 2).min(mx)
    } else {
        mx
    };

    speed.clamp(mn.min(mx), mx).min(MAX_FAN_SPEED)
}

fn round1(t: f64) -> f64 {
    (t * 10.0).round() / 10.0
}
