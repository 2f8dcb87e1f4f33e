//! Heater controller
//!
//! Maintains the chamber temperature inside a day/night deadband. Day is
//! defined by the first daily window (same predicate as the lights). While
//! disabled the output is forced OFF on every tick so a stray relay state
//! cannot heat an unattended chamber.

use std::sync::Arc;

use tracing::{info, warn};

use gb_core::constants::timing::HEATER_SAMPLING;
use gb_core::engine::heater::{band_for, decide};
use gb_core::hw::gpio::Output;
use gb_core::sensors::SensorId;

use crate::controllers::now_minute_of_day;
use crate::state::AppState;

pub async fn run_heater_loop(state: Arc<AppState>, mut output: Output) {
    info!("heater: controller started (pin {})", output.pin());

    while !state.shutting_down() {
        heater_tick(&state, &mut output).await;
        tokio::time::sleep(HEATER_SAMPLING).await;
    }
    info!("heater: controller stopped");
}

async fn heater_tick(state: &AppState, output: &mut Output) {
    let (enabled, temps, window) = {
        let cfg = state.config.read().await;
        (cfg.heater.enabled, cfg.temperature, cfg.daily_timer1.window())
    };

    if !enabled {
        if let Err(e) = output.set(false) {
            warn!("heater: output write failed: {}", e);
        }
        return;
    }

    let day = window.contains(now_minute_of_day());
    let band = band_for(day, &temps);

    let Some(t) = state.read_sensor(SensorId::Bme280Temp).await else {
        // No reading: skip the tick, the deadband state stands.
        warn!("heater: no ambient reading, skipping tick");
        return;
    };

    let currently_on = match output.get() {
        Ok(on) => on,
        Err(e) => {
            warn!("heater: readback failed: {}", e);
            return;
        }
    };

    let want = decide(band, t, currently_on);
    if let Err(e) = output.set(want) {
        warn!("heater: output write failed: {}", e);
        return;
    }
    if want != currently_on {
        info!(
            "heater: t={:.1} band=[{:.1},{:.1}] ({}) -> {}",
            t,
            band.lo,
            band.hi,
            if day { "day" } else { "night" },
            if want { "ON" } else { "OFF" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_core::data::config::ConfigSnapshot;
    use crate::test_util::fake_gpio_tree;
    use gb_core::hw::gpio::GpioChip;
    use gb_core::sensors::SensorHub;
    use std::path::PathBuf;

    struct Fixture {
        _tmp: tempfile::TempDir,
        state: Arc<AppState>,
        output: Output,
        pin_dir: PathBuf,
        bme_dir: PathBuf,
    }

    // Day and night limits are set equal so the wall-clock phase cannot
    // influence the band under test.
    fn fixture(enabled: bool) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = fake_gpio_tree(tmp.path(), &[24]);
        let chip = GpioChip::with_base(tmp.path());
        let output = chip.output(24).unwrap();

        let iio = tmp.path().join("iio");
        let bme = iio.join("iio:device0");
        std::fs::create_dir_all(&bme).unwrap();
        std::fs::write(bme.join("name"), "bme280\n").unwrap();
        std::fs::write(bme.join("in_temp_input"), "25000\n").unwrap();

        let mut cfg = ConfigSnapshot::default();
        cfg.heater.enabled = enabled;
        cfg.temperature.min_night = cfg.temperature.min_day;
        cfg.temperature.max_night = cfg.temperature.max_day;

        let hub = SensorHub::discover_at(
            &iio,
            &tmp.path().join("w1"),
            &tmp.path().join("sensor_stats.json"),
        );
        let state = Arc::new(AppState::new(cfg, tmp.path().join("param.json"), hub));
        Fixture {
            state,
            output,
            pin_dir: dirs[0].clone(),
            bme_dir: bme,
            _tmp: tmp,
        }
    }

    impl Fixture {
        fn set_ambient(&self, milli: &str) {
            std::fs::write(self.bme_dir.join("in_temp_input"), milli).unwrap();
        }

        fn relay_on(&self) -> bool {
            std::fs::read_to_string(self.pin_dir.join("value")).unwrap() == "0"
        }
    }

    #[tokio::test]
    async fn deadband_scenario() {
        // min=22, max=26, off=0.5 -> band [21.5, 26.5].
        let mut f = fixture(true);

        f.set_ambient("21400\n"); // below lo -> ON
        heater_tick(&f.state, &mut f.output).await;
        assert!(f.relay_on());

        f.set_ambient("22000\n"); // inside, was ON -> stays ON
        heater_tick(&f.state, &mut f.output).await;
        assert!(f.relay_on());

        f.set_ambient("26400\n"); // still inside -> stays ON
        heater_tick(&f.state, &mut f.output).await;
        assert!(f.relay_on());

        f.set_ambient("26600\n"); // above hi -> OFF
        heater_tick(&f.state, &mut f.output).await;
        assert!(!f.relay_on());

        f.set_ambient("25000\n"); // inside, was OFF -> stays OFF
        heater_tick(&f.state, &mut f.output).await;
        assert!(!f.relay_on());
    }

    #[tokio::test]
    async fn disabled_forces_off() {
        let mut f = fixture(false);
        f.output.set(true).unwrap();

        heater_tick(&f.state, &mut f.output).await;
        assert!(!f.relay_on());
    }

    #[tokio::test]
    async fn missing_reading_retains_state() {
        let mut f = fixture(true);
        f.set_ambient("21000\n");
        heater_tick(&f.state, &mut f.output).await;
        assert!(f.relay_on());

        std::fs::remove_file(f.bme_dir.join("in_temp_input")).unwrap();
        heater_tick(&f.state, &mut f.output).await;
        assert!(f.relay_on()); // tick skipped, state stands
    }
}
