//! Staged-fan controller
//!
//! In manual mode the user-selected speed is applied as-is. In auto mode
//! the ambient temperature is banded around the set-point and the fan
//! stepped between `min_speed` and `max_speed`. A failed reading holds the
//! current speed — a fan stuck at its last stage is safer than one that
//! hunts on garbage data.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use gb_core::constants::timing::{FAN_MANUAL_SAMPLING, FAN_SAMPLING};
use gb_core::engine::fan::{select_speed, FanMode};
use gb_core::hw::fan::Fan;
use gb_core::sensors::SensorId;

use crate::state::AppState;

pub async fn run_fan_loop(state: Arc<AppState>, mut fan: Fan) {
    info!("fan: controller started");

    while !state.shutting_down() {
        let motor = state.config.read().await.motor;

        let delay = match motor.mode {
            FanMode::Manual => {
                let target = motor.user_speed.min(4);
                apply_speed(&state, &mut fan, target);
                FAN_MANUAL_SAMPLING
            }
            FanMode::Auto => {
                match state.read_sensor(SensorId::Bme280Temp).await {
                    Some(t) => {
                        let target = select_speed(t, &motor);
                        debug!("fan: t={:.1} -> stage {}", t, target);
                        apply_speed(&state, &mut fan, target);
                    }
                    None => {
                        // Hold the current speed; the access layer already
                        // logged the failure.
                        warn!("fan: no ambient reading, holding speed");
                    }
                }
                FAN_SAMPLING
            }
        };

        tokio::time::sleep(delay).await;
    }
    info!("fan: controller stopped");
}

/// Drive the bank to `target` if it is not already there, then publish the
/// readback for `/status`.
fn apply_speed(state: &AppState, fan: &mut Fan, target: u8) {
    let current = fan.current_speed().ok();

    if current != Some(target) {
        match fan.set_speed(target) {
            Ok(()) => info!("fan: speed {} -> {}", current.unwrap_or(0), target),
            Err(e) => {
                error!("fan: speed change failed: {}", e);
                return;
            }
        }
    }

    match fan.current_speed() {
        Ok(speed) => state.publish_motor_speed(speed),
        Err(e) => warn!("fan: readback failed: {}", e),
    }
}
