//! Daily window controller
//!
//! Holds an outlet inside a wall-clock on/off window. The control is
//! level-based, not edge-based: the output is reasserted to the correct
//! state on every tick, so a relay toggled behind our back is corrected
//! within one sampling period.

use std::sync::Arc;

use tracing::{info, warn};

use gb_core::constants::timing::DAILY_SAMPLING;
use gb_core::engine::window::DailyWindow;
use gb_core::hw::gpio::Output;

use crate::controllers::now_minute_of_day;
use crate::state::AppState;

/// Which of the two daily timers this task follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    One,
    Two,
}

impl Timer {
    fn label(&self) -> &'static str {
        match self {
            Timer::One => "daily1",
            Timer::Two => "daily2",
        }
    }
}

/// Reassert the output against the window. Returns whether the logical
/// state changed relative to `last`, for logging only.
pub fn apply_window(
    output: &mut Output,
    window: DailyWindow,
    now_min: u16,
    last: &mut Option<bool>,
) -> gb_core::Result<bool> {
    let inside = window.contains(now_min);
    output.set(inside)?;
    let changed = *last != Some(inside);
    *last = Some(inside);
    Ok(changed)
}

pub async fn run_daily_loop(timer: Timer, state: Arc<AppState>, mut output: Output) {
    info!("{}: controller started (pin {})", timer.label(), output.pin());
    let mut last: Option<bool> = None;

    // First evaluation happens before the first sleep, so the output never
    // sits in an indeterminate state after startup.
    while !state.shutting_down() {
        let settings = {
            let cfg = state.config.read().await;
            match timer {
                Timer::One => cfg.daily_timer1,
                Timer::Two => cfg.daily_timer2,
            }
        };

        match apply_window(&mut output, settings.window(), now_minute_of_day(), &mut last) {
            Ok(true) => {
                let on = last.unwrap_or(false);
                info!("{}: switched {}", timer.label(), if on { "ON" } else { "OFF" });
            }
            Ok(false) => {}
            Err(e) => {
                // Write failure is not fatal; the next tick retries.
                warn!("{}: output write failed: {}", timer.label(), e);
            }
        }

        tokio::time::sleep(DAILY_SAMPLING).await;
    }
    info!("{}: controller stopped", timer.label());
}
