//! Tick time base
//!
//! Both signal paths measure time in ticks of a free-running 16-bit
//! hardware counter. The counter wraps roughly every 35 ms at the board's
//! tick rate, so every duration is computed with wraparound-safe
//! subtraction and no delta may exceed one wrap.

use crate::platform::traits::CaptureTimer;

/// One count of the free-running hardware counter
pub type Tick = u16;

/// Peripheral clock feeding the timer block
pub const TIMER_INPUT_CLOCK_HZ: u32 = 60_000_000;

/// Prescaler between the peripheral clock and the tick counters
pub const TIMER_PRESCALER: u32 = 32;

/// Convert a duration in microseconds to timer ticks
///
/// 60 MHz / 32 = 1.875 ticks per microsecond.
pub const fn us_to_ticks(us: u32) -> Tick {
    ((TIMER_INPUT_CLOCK_HZ / 1_000_000) * us / TIMER_PRESCALER) as Tick
}

/// Convert timer ticks back to microseconds
pub const fn ticks_to_us(ticks: Tick) -> u32 {
    TIMER_PRESCALER * ticks as u32 / (TIMER_INPUT_CLOCK_HZ / 1_000_000)
}

/// Wraparound-safe elapsed time between two counter readings
///
/// Correct as long as fewer than 2^16 ticks passed between `since` and
/// `now`, regardless of how often the counter wrapped in absolute terms.
pub const fn elapsed(now: Tick, since: Tick) -> Tick {
    now.wrapping_sub(since)
}

/// A free-running counter bound to one signal path
///
/// The input and output paths each own one instance, backed by separate
/// hardware timer channels; the two do not share an epoch.
#[derive(Debug)]
pub struct TimeBase<T: CaptureTimer> {
    timer: T,
}

impl<T: CaptureTimer> TimeBase<T> {
    /// Wrap a hardware counter
    pub fn new(timer: T) -> Self {
        Self { timer }
    }

    /// Current counter value
    pub fn now(&self) -> Tick {
        self.timer.now()
    }

    /// Ticks elapsed since an earlier reading of this counter
    pub fn elapsed_since(&self, since: Tick) -> Tick {
        elapsed(self.now(), since)
    }
}
