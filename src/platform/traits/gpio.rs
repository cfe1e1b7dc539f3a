//! GPIO port interface trait
//!
//! The signal engine works on whole-port snapshots and toggle masks rather
//! than individual pins: the edge ISR latches every monitored line in one
//! register read, and the pulse ISR fires several channel edges with a
//! single toggle write. Platform implementations map these operations onto
//! their port-level registers.

use crate::platform::Result;

/// Port-wide GPIO interface
///
/// A bit in a `mask` argument selects the line with that pin index on the
/// port. All operations are single register accesses on real hardware.
///
/// # Safety Invariants
///
/// - `toggle` may be called from interrupt context; every other mutating
///   method is task-context only.
/// - Output operations are only valid for lines whose output driver has been
///   enabled with `enable_output`.
pub trait GpioPort {
    /// Snapshot the current input level of every line on the port.
    ///
    /// Valid in any mode; bit N reflects the electrical level of pin N.
    fn read_levels(&self) -> u32;

    /// Invert the output level of every line in `mask` in one write.
    ///
    /// Lines without an enabled output driver are unaffected.
    fn toggle(&mut self, mask: u32);

    /// Drive every line in `mask` low.
    fn set_low(&mut self, mask: u32);

    /// Enable the output driver for every line in `mask`.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Gpio` if a line in `mask` cannot be driven.
    fn enable_output(&mut self, mask: u32) -> Result<()>;

    /// Disable the output driver for every line in `mask`, releasing it to
    /// high impedance.
    fn disable_output(&mut self, mask: u32) -> Result<()>;

    /// Configure every line in `mask` as a pulled-up input generating an
    /// interrupt on both edges.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Gpio` if a line in `mask` does not support
    /// edge interrupts.
    fn configure_input(&mut self, mask: u32) -> Result<()>;

    /// Clear pending edge-interrupt flags for every line in `mask`.
    ///
    /// Called from the edge ISR. An edge arriving after the clear raises a
    /// new interrupt, so no transition is lost.
    fn clear_edge_interrupt(&mut self, mask: u32);
}
