//! Timer interface traits
//!
//! Two independent hardware timer channels back the engine: a free-running
//! counter timestamping input edges, and a compare channel paced by the
//! pulse ISR. They share a tick rate but not an epoch.

use crate::io::time_base::Tick;

/// Free-running 16-bit counter read
///
/// The counter wraps at 2^16; consumers must use wraparound-safe
/// subtraction (see [`crate::io::time_base::elapsed`]) and never assume
/// monotonicity across more than one wrap.
pub trait CaptureTimer {
    /// Current counter value.
    fn now(&self) -> Tick;
}

// A capture timer is read-only hardware state, so sharing one instance by
// reference between the edge ISR and the decode task is sound.
impl<T: CaptureTimer + ?Sized> CaptureTimer for &T {
    fn now(&self) -> Tick {
        (**self).now()
    }
}

/// Compare/reload timer channel driving the pulse ISR
pub trait CompareTimer {
    /// Arm the next compare interrupt `ticks` from now.
    ///
    /// Writes the compare register, clears any pending compare flag and
    /// retriggers the counter from zero. Called from interrupt context;
    /// must be a bounded handful of register writes.
    fn program(&mut self, ticks: Tick);

    /// Start the counter.
    fn start(&mut self);

    /// Stop the counter; no further compare interrupts fire.
    fn stop(&mut self);
}
