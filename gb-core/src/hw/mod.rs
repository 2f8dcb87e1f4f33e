//! Hardware interaction
//!
//! Everything that touches a kernel interface lives here: sysfs GPIO relay
//! outputs, the four-line fan interlock, and the sensor drivers reading
//! kernel-exported attribute files.

pub mod drivers;
pub mod fan;
pub mod gpio;

pub use fan::Fan;
pub use gpio::{GpioChip, Output};
