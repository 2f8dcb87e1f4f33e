//! Control decision engine
//!
//! Pure functions deciding output states from policies and readings. No
//! hardware, no clocks, no I/O — the controller tasks in the daemon feed
//! these with fresh config and sensor values every tick.

pub mod fan;
pub mod heater;
pub mod window;

pub use fan::{select_speed, FanMode};
pub use heater::{band_for, decide, HeaterBand};
pub use window::DailyWindow;
