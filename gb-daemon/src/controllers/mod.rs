//! Controller tasks
//!
//! One long-lived cooperative loop per physical concern. Every loop
//! re-reads its policy block from the shared snapshot at the top of each
//! tick, so configuration edits become effective within one tick period
//! without a restart.

pub mod cyclic;
pub mod daily;
pub mod fan;
pub mod heater;

use chrono::{Local, Timelike};
use gb_core::engine::window::minute_of_day;

/// Current wall-clock position as minutes since midnight.
pub(crate) fn now_minute_of_day() -> u16 {
    let now = Local::now();
    minute_of_day(now.hour() as u8, now.minute() as u8)
}
