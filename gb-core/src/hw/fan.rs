//! Four-speed fan relay bank
//!
//! The fan motor has four speed taps, each behind its own relay. Energizing
//! two taps at once shorts the motor windings, so the bank enforces a hard
//! interlock: every speed change first drives all four lines OFF, dwells,
//! then energizes at most one line, and dwells again before returning. The
//! dwell protects the downstream contactors.

use std::time::Duration;

use tracing::{debug, warn};

use crate::constants::limits::MAX_FAN_SPEED;
use crate::constants::timing::FAN_DWELL;
use crate::hw::gpio::Output;
use gb_error::Result;

/// The four speed-tap relays. At most one line is ever logically ON.
#[derive(Debug)]
pub struct Fan {
    lines: [Output; 4],
    dwell: Duration,
}

impl Fan {
    pub fn new(lines: [Output; 4]) -> Self {
        Self {
            lines,
            dwell: FAN_DWELL,
        }
    }

    /// Override the inter-transition dwell. Test seam; production keeps the
    /// 1 s default.
    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    /// Switch to speed `s` (0 = off). Values above 4 are clamped.
    ///
    /// Blocks for two dwell periods; at control cadence (seconds between
    /// ticks) this is acceptable on the single-threaded loop.
    pub fn set_speed(&mut self, s: u8) -> Result<()> {
        let s = s.min(MAX_FAN_SPEED);

        for line in &mut self.lines {
            line.set(false)?;
        }
        std::thread::sleep(self.dwell);

        if s > 0 {
            self.lines[usize::from(s) - 1].set(true)?;
        }
        std::thread::sleep(self.dwell);

        debug!("Fan speed set to {}", s);
        Ok(())
    }

    /// Read the speed back from the relay lines.
    ///
    /// Returns 0 when no line is ON. More than one line ON is an error
    /// condition (the interlock was bypassed externally); it is logged and
    /// also reported as 0.
    pub fn current_speed(&self) -> Result<u8> {
        let mut speed = 0u8;
        let mut on_count = 0u8;
        for (idx, line) in self.lines.iter().enumerate() {
            if line.get()? {
                on_count += 1;
                speed = idx as u8 + 1;
            }
        }
        if on_count > 1 {
            warn!(
                "Fan interlock violation: {} lines energized, reporting speed 0",
                on_count
            );
            return Ok(0);
        }
        Ok(speed)
    }
}
