//! Shared test fixtures for the controller and server tests.

use std::path::{Path, PathBuf};

/// Build a fake sysfs GPIO tree inside `base` for the given pins, matching
/// the layout `GpioChip` expects: an `export`/`unexport` pair plus one
/// `gpioN` directory per pin with `direction` and `value` files.
pub fn fake_gpio_tree(base: &Path, pins: &[u32]) -> Vec<PathBuf> {
    std::fs::write(base.join("export"), "").unwrap();
    std::fs::write(base.join("unexport"), "").unwrap();
    pins.iter()
        .map(|pin| {
            let dir = base.join(format!("gpio{}", pin));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("direction"), "in").unwrap();
            std::fs::write(dir.join("value"), "1").unwrap();
            dir
        })
        .collect()
}
