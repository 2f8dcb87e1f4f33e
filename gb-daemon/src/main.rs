//! Growbox Daemon (growboxd)
//!
//! Single-node grow-chamber controller for Linux single-board computers.
//! Drives mains outlets and a four-speed fan through GPIO relays, reads the
//! environment through kernel-exported sensor interfaces, and serves a tiny
//! HTTP surface for status and configuration.
//!
//! # Architecture
//! - **Scheduling**: one single-threaded cooperative runtime; every
//!   controller is a spawned task ending each tick in a sleep
//! - **Ownership**: each controller uniquely owns its GPIO outputs; the
//!   shared `AppState` carries the config snapshot and sensor hub
//! - **Failure policy**: configuration or GPIO failure at startup is fatal
//!   (non-zero exit); a task that dies mid-run stops the whole daemon via
//!   the supervision channel; sensor and sink failures stay local

mod controllers;
mod html;
mod server;
mod sink;
mod state;
#[cfg(test)]
mod test_util;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use gb_core::constants::http::PORT;
use gb_core::constants::paths::{CONFIG_FILE, EXTREMA_FILE};
use gb_core::data::persistence::{load_config, resolve_config_dir};
use gb_core::hw::fan::Fan;
use gb_core::hw::gpio::{GpioChip, Output};
use gb_core::sensors::SensorHub;

use controllers::cyclic::{run_cyclic_loop, Outlet};
use controllers::daily::{run_daily_loop, Timer};
use controllers::fan::run_fan_loop;
use controllers::heater::run_heater_loop;
use state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging to the systemd journal when available, stdout
/// otherwise. Level comes from `GROWBOX_LOG` (default `info`).
fn init_logging() {
    let log_level = std::env::var("GROWBOX_LOG").unwrap_or_else(|_| "info".to_string());

    let use_journald = std::path::Path::new("/run/systemd/journal/socket").exists();
    if use_journald {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();
}

/// Claim one output pin, treating failure as fatal.
fn claim_output(chip: &GpioChip, name: &str, pin: u32) -> Output {
    match chip.output(pin) {
        Ok(output) => output,
        Err(e) => {
            error!("STARTUP: cannot claim {} (GPIO {}): {}", name, pin, e);
            std::process::exit(1);
        }
    }
}

/// Forward the outcome of a spawned task to the supervision channel.
fn supervise(
    name: &'static str,
    handle: JoinHandle<()>,
    tx: mpsc::UnboundedSender<(&'static str, Option<String>)>,
) {
    tokio::spawn(async move {
        let panic_msg = handle.await.err().map(|e| e.to_string());
        let _ = tx.send((name, panic_msg));
    });
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // PHASE 0: Panic visibility before anything else runs. Panics in
    // spawned tasks additionally surface through the supervision channel.
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("PANIC at {}: {}", location, message);
    }));

    // PHASE 1: Logging.
    init_logging();
    info!("STARTUP: growboxd {} starting", VERSION);

    // PHASE 2: Privilege check. Sysfs GPIO usually needs root or the gpio
    // group; a failed export below is the authoritative error.
    // SAFETY: geteuid is always safe - it just returns the effective uid.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        warn!("STARTUP: running as uid {} (GPIO export may be denied)", euid);
    }

    // PHASE 3: Configuration. Missing or invalid is unrecoverable.
    let config_dir = resolve_config_dir();
    let config_path = config_dir.join(CONFIG_FILE);
    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("STARTUP: configuration load failed: {}", e);
            std::process::exit(1);
        }
    };
    info!("STARTUP: configuration loaded from {:?}", config_path);

    // PHASE 4: Claim the GPIO outputs. The pin map is immutable from here.
    let chip = GpioChip::new();
    let daily1_out = claim_output(&chip, "daily1", config.gpio.daily1_pin);
    let daily2_out = claim_output(&chip, "daily2", config.gpio.daily2_pin);
    let cyclic1_out = claim_output(&chip, "cyclic1", config.gpio.cyclic1_pin);
    let cyclic2_out = claim_output(&chip, "cyclic2", config.gpio.cyclic2_pin);
    let heater_out = claim_output(&chip, "heater", config.gpio.heater_pin);
    let fan = Fan::new(
        config
            .gpio
            .fan_pins()
            .map(|pin| claim_output(&chip, "fan", pin)),
    );
    info!("STARTUP: GPIO outputs claimed");

    // PHASE 5: Sensor discovery and extrema store.
    let hub = SensorHub::discover(&config_dir.join(EXTREMA_FILE));

    // PHASE 6: Shared state and the one-shot sink host ping.
    let network = config.network.clone();
    let state = Arc::new(AppState::new(config, config_path, hub));

    let reachable = sink::ping_host(&network.host_addr, network.db_port).await;
    state.host_reachable.store(reachable, Ordering::SeqCst);
    state.config.write().await.network.host_reachable = reachable;

    // PHASE 7: Spawn the controller and sink tasks under supervision.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tasks: [(&'static str, JoinHandle<()>); 7] = [
        ("daily1", tokio::spawn(run_daily_loop(Timer::One, state.clone(), daily1_out))),
        ("daily2", tokio::spawn(run_daily_loop(Timer::Two, state.clone(), daily2_out))),
        ("cyclic1", tokio::spawn(run_cyclic_loop(Outlet::One, state.clone(), cyclic1_out))),
        ("cyclic2", tokio::spawn(run_cyclic_loop(Outlet::Two, state.clone(), cyclic2_out))),
        ("fan", tokio::spawn(run_fan_loop(state.clone(), fan))),
        ("heater", tokio::spawn(run_heater_loop(state.clone(), heater_out))),
        ("sink", tokio::spawn(sink::run_sink_loop(state.clone()))),
    ];
    for (name, handle) in tasks {
        supervise(name, handle, tx.clone());
    }
    info!("STARTUP: controllers running, PID {}", std::process::id());

    // PHASE 8: Serve HTTP in the foreground until a signal or a task death.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGNAL: received SIGINT/SIGTERM - shutting down");
            state.shutdown.store(true, Ordering::SeqCst);
            info!("SHUTDOWN: daemon terminated gracefully");
            std::process::exit(0);
        }
        Some((name, panic_msg)) = rx.recv() => {
            match panic_msg {
                Some(msg) => error!("TASK FAILURE: '{}' died: {}", name, msg),
                None => error!("TASK FAILURE: '{}' exited unexpectedly", name),
            }
            std::process::exit(1);
        }
        result = server::run_server(state.clone(), PORT) => {
            if let Err(e) = result {
                error!("HTTP facade failed: {}", e);
            }
            std::process::exit(1);
        }
    }
}
