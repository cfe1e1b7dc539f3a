//! Platform abstraction traits
//!
//! This module defines the traits that platform implementations must provide.

pub mod gpio;
pub mod timer;

// Re-export trait interfaces
pub use gpio::GpioPort;
pub use timer::{CaptureTimer, CompareTimer};
