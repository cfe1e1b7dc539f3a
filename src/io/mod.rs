//! Signal I/O engine
//!
//! The input path turns GPIO edges into per-channel pulse-width readings
//! (`edge_capture` + `ppm_input`); the output path turns per-channel pulse
//! commands into a precomputed GPIO toggle schedule executed by a single
//! timer/compare interrupt (`servo_out` + `schedule`).
//!
//! Channel classes plug into the control loop through the [`IoChannel`]
//! contract: `pre` before inputs are read, `get`/`set` per channel, `post`
//! after outputs are written, once per control cycle.

pub mod edge_capture;
pub mod ppm_input;
pub mod rc_value;
pub mod schedule;
pub mod servo_out;
pub mod time_base;

use time_base::Tick;

/// Absolute maximum number of servo channels the board can drive
pub const SERVO_MAX_NB: usize = 24;

/// Latest state of one input channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputReading {
    /// Measured pulse width in timer ticks
    pub value: Tick,
    /// Whether the source has shown recent activity
    pub active: bool,
}

/// Command for one output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputCommand {
    /// Desired pulse width in timer ticks
    pub value: Tick,
    /// Whether the channel should emit pulses this cycle
    pub active: bool,
}

/// Per-cycle contract between a channel class and the control loop
///
/// The external fixed-period control task calls `pre` on every input class,
/// then `get`/`set` per channel, then `post` on every output class. All
/// hooks run in task context; the interrupt halves of each class live in
/// separate handler objects.
pub trait IoChannel {
    /// Human-readable class name, for logs
    fn name(&self) -> &'static str;

    /// Input-side hook: drain captured events and refresh channel state.
    /// Called once per cycle before any `get`.
    fn pre(&mut self) {}

    /// Read the latest value of one channel.
    ///
    /// Returns `None` for a channel number this class does not provide.
    fn get(&self, channel_no: u8) -> Option<InputReading>;

    /// Write the target value of one channel.
    ///
    /// Out-of-range channel numbers are ignored.
    fn set(&mut self, channel_no: u8, cmd: &OutputCommand) {
        let _ = (channel_no, cmd);
    }

    /// Output-side hook: commit all values written this cycle.
    ///
    /// Returns `false` if the commit must be retried on a later cycle
    /// (previous commit not yet consumed); no data is lost either way.
    fn post(&mut self) -> bool {
        true
    }
}
