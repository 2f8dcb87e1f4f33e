//! Cyclic duty controller
//!
//! Two-state machine: `Idle` (output OFF) for `period_min` minutes, then
//! `Active` (output ON) for `action_sec` seconds, repeated. The ON segment
//! is not counted against the OFF segment. Period and duration are read at
//! the transition boundaries, so a hot edit applies on the next cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use gb_core::hw::gpio::Output;

use crate::state::AppState;

/// Which of the two cyclic outlets this task drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlet {
    One,
    Two,
}

impl Outlet {
    fn label(&self) -> &'static str {
        match self {
            Outlet::One => "cyclic1",
            Outlet::Two => "cyclic2",
        }
    }
}

pub async fn run_cyclic_loop(outlet: Outlet, state: Arc<AppState>, mut output: Output) {
    info!("{}: controller started (pin {})", outlet.label(), output.pin());

    // Known-good state before the first idle period.
    if let Err(e) = output.set(false) {
        warn!("{}: initial output write failed: {}", outlet.label(), e);
    }

    while !state.shutting_down() {
        // Idle: read the period at the transition into the state.
        let period_min = {
            let cfg = state.config.read().await;
            match outlet {
                Outlet::One => cfg.cyclic1,
                Outlet::Two => cfg.cyclic2,
            }
            .period_min()
        };
        debug!("{}: idle for {} min", outlet.label(), period_min);
        tokio::time::sleep(Duration::from_secs(u64::from(period_min) * 60)).await;
        if state.shutting_down() {
            break;
        }

        // Active: read the duration at the transition into the state.
        let action_sec = {
            let cfg = state.config.read().await;
            match outlet {
                Outlet::One => cfg.cyclic1,
                Outlet::Two => cfg.cyclic2,
            }
            .action_sec()
        };
        if let Err(e) = output.set(true) {
            warn!("{}: output write failed: {}", outlet.label(), e);
        } else {
            info!("{}: pulse ON for {} s", outlet.label(), action_sec);
        }
        tokio::time::sleep(Duration::from_secs(u64::from(action_sec))).await;

        if let Err(e) = output.set(false) {
            warn!("{}: output write failed: {}", outlet.label(), e);
        } else {
            debug!("{}: pulse OFF", outlet.label());
        }
    }
    info!("{}: controller stopped", outlet.label());
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_core::data::config::ConfigSnapshot;
    use crate::test_util::fake_gpio_tree;
    use gb_core::hw::gpio::GpioChip;
    use gb_core::sensors::SensorHub;
    use std::path::Path;

    fn test_state(tmp: &Path, mut cfg: ConfigSnapshot) -> Arc<AppState> {
        cfg.cyclic1.period_minutes = 1;
        cfg.cyclic1.action_duration_seconds = 10;
        let hub = SensorHub::discover_at(
            &tmp.join("iio"),
            &tmp.join("w1"),
            &tmp.join("sensor_stats.json"),
        );
        Arc::new(AppState::new(cfg, tmp.join("param.json"), hub))
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_timing_matches_schedule() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = fake_gpio_tree(tmp.path(), &[22]);
        let chip = GpioChip::with_base(tmp.path());
        let output = chip.output(22).unwrap();
        let state = test_state(tmp.path(), ConfigSnapshot::default());

        let task = tokio::spawn(run_cyclic_loop(Outlet::One, state, output));
        let pin_value = || std::fs::read_to_string(dirs[0].join("value")).unwrap();

        // [T0, T0+60): OFF.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(pin_value(), "1");

        // [T0+60, T0+70): ON.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pin_value(), "0"); // T0+61
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(pin_value(), "0"); // T0+69

        // [T0+70, T0+130): OFF again.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pin_value(), "1"); // T0+71

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn on_segment_not_counted_against_off() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = fake_gpio_tree(tmp.path(), &[22]);
        let chip = GpioChip::with_base(tmp.path());
        let output = chip.output(22).unwrap();
        let state = test_state(tmp.path(), ConfigSnapshot::default());

        let task = tokio::spawn(run_cyclic_loop(Outlet::One, state, output));
        let pin_value = || std::fs::read_to_string(dirs[0].join("value")).unwrap();

        // Second pulse starts at T0+130 (60 idle + 10 on + 60 idle), not at
        // T0+120.
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(pin_value(), "1");
        tokio::time::sleep(Duration::from_secs(7)).await; // T0+132
        assert_eq!(pin_value(), "0");

        task.abort();
    }
}
