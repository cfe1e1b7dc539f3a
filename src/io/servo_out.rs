//! Multiplexed servo pulse output
//!
//! Up to 24 servo channels share one timer/compare unit. Enabled, active
//! channels are partitioned round-robin into a small number of lanes;
//! channels in a lane pulse back to back (one ends, the next starts in the
//! same step), so at most one pulse per lane is in flight at any instant
//! while the lanes overlap freely. The builder walks the lanes emitting a
//! step at every pulse boundary and pads the sequence to exactly one
//! refresh period.

use crate::io::schedule::{Schedule, SchedulePublisher, Step};
use crate::io::time_base::{us_to_ticks, Tick};
use crate::io::{InputReading, IoChannel, OutputCommand, SERVO_MAX_NB};
use crate::log_warn;
use crate::platform::error::{GpioError, PlatformError};
use crate::platform::traits::GpioPort;
use crate::platform::Result;

/// Number of servo lanes; pulses on different lanes overlap in time
pub const LANE_NB: usize = 5;

/// Send a pulse to every active servo this often
pub const REFRESH_PERIOD: Tick = us_to_ticks(14_000);

/// Protection against strange pulse values
pub const MAX_SERVO_PULSE: Tick = us_to_ticks(4000);
/// Lower clamp for commanded pulses
pub const MIN_SERVO_PULSE: Tick = us_to_ticks(100);

/// Neutral pulse loaded when a channel is first enabled
pub const DEFAULT_SERVO_PULSE: Tick = us_to_ticks(1520);

const LANE_CAPACITY: usize = SERVO_MAX_NB / LANE_NB + 1;

/// One lane: a chain of channels pulsing sequentially
#[derive(Debug, Default)]
struct Lane {
    servos: heapless::Vec<u8, LANE_CAPACITY>,
    cursor: usize,
}

impl Lane {
    fn current(&self) -> Option<u8> {
        self.servos.get(self.cursor).copied()
    }
}

/// Build one refresh period's worth of toggle steps
///
/// `enabled` and `active` are channel bitmasks; `widths` holds the clamped
/// pulse width per channel and `pin_mask` the port bit of each channel's
/// pin. Channels are partitioned into lanes only when both enabled and
/// active, so an inactive channel contributes neither toggles nor lane
/// time. The emitted steps always sum to exactly `REFRESH_PERIOD` ticks
/// (with a 1-tick floor on the pad when the lanes are overloaded).
pub fn build_schedule(
    schedule: &mut Schedule,
    enabled: u32,
    active: u32,
    widths: &[Tick; SERVO_MAX_NB],
    pin_mask: &[u32; SERVO_MAX_NB],
) {
    let mut lanes: [Lane; LANE_NB] = Default::default();
    let mut time_left = [0 as Tick; SERVO_MAX_NB];

    // round-robin partition of the participating channels
    let mut lane_no = 0;
    for ch in 0..SERVO_MAX_NB {
        let bit = 1u32 << ch;
        if enabled & bit != 0 && active & bit != 0 {
            // capacity: at most ceil(SERVO_MAX_NB / LANE_NB) per lane
            let _ = lanes[lane_no].servos.push(ch as u8);
            time_left[ch] = widths[ch];
            lane_no += 1;
            if lane_no >= LANE_NB {
                lane_no = 0;
            }
        }
    }

    schedule.clear();

    // first step raises the leading pulse of every non-empty lane
    let mut mask = 0;
    for lane in &lanes {
        if let Some(ch) = lane.current() {
            mask |= pin_mask[ch as usize];
        }
    }
    let mut pending = Step {
        gpio_toggle: mask,
        time_to_next: 0,
    };

    let mut consumed: u32 = 0;
    loop {
        // the next event is the earliest pulse end among the lanes
        let mut min_time_left = Tick::MAX;
        let mut any = false;
        for lane in &lanes {
            if let Some(ch) = lane.current() {
                any = true;
                if time_left[ch as usize] < min_time_left {
                    min_time_left = time_left[ch as usize];
                }
            }
        }
        if !any {
            break;
        }

        pending.time_to_next = min_time_left;
        schedule.push(pending);
        consumed += min_time_left as u32;

        // lower every finished pulse and raise its lane successor in the
        // same step, coalescing simultaneous toggles into one port write
        let mut mask = 0;
        for lane in lanes.iter_mut() {
            if let Some(ch) = lane.current() {
                time_left[ch as usize] -= min_time_left;
                if time_left[ch as usize] == 0 {
                    mask |= pin_mask[ch as usize];
                    lane.cursor += 1;
                    if let Some(next_ch) = lane.current() {
                        mask |= pin_mask[next_ch as usize];
                    }
                }
            }
        }
        pending = Step {
            gpio_toggle: mask,
            time_to_next: 0,
        };
    }

    // pad to the full refresh period; never re-arm with zero
    let pad = (REFRESH_PERIOD as u32).saturating_sub(consumed).max(1);
    pending.time_to_next = pad as Tick;
    schedule.push(pending);
}

/// Servo output channel class
///
/// Task-context half of the output path: per-channel configuration, the
/// clamp at the `set` boundary and the schedule build/publish in `post`.
/// The matching ISR half is [`crate::io::schedule::PulseTimer`].
pub struct ServoOut<'a> {
    /// Channels allocated to a physical pin
    enabled: u32,
    /// Channels commanded to pulse this cycle
    active: u32,
    /// Commanded pulse width per channel, clamped, in ticks
    timer_value: [Tick; SERVO_MAX_NB],
    /// Port bit of each channel's pin
    pin_mask: [u32; SERVO_MAX_NB],
    /// Channels backed by an entry in the board pin table
    channel_nb: usize,
    publisher: SchedulePublisher<'a>,
}

impl<'a> ServoOut<'a> {
    /// Create the output class over the board's servo pin table
    ///
    /// `pins` maps channel number to port pin; entries beyond
    /// `SERVO_MAX_NB` are ignored. All channels start disabled with the
    /// neutral pulse width.
    pub fn new(pins: &[u8], publisher: SchedulePublisher<'a>) -> Self {
        let channel_nb = pins.len().min(SERVO_MAX_NB);
        let mut pin_mask = [0u32; SERVO_MAX_NB];
        for (ch, &pin) in pins.iter().take(channel_nb).enumerate() {
            pin_mask[ch] = 1 << (pin & 0x1F);
        }
        Self {
            enabled: 0,
            active: 0,
            timer_value: [DEFAULT_SERVO_PULSE; SERVO_MAX_NB],
            pin_mask,
            channel_nb,
            publisher,
        }
    }

    /// Number of channels backed by a physical pin
    pub fn channel_nb(&self) -> usize {
        self.channel_nb
    }

    /// Allocate a channel to its pin: drive it low and enable its driver
    ///
    /// The channel reports the neutral pulse width until the first `set`.
    pub fn enable_channel<P: GpioPort>(&mut self, channel_no: u8, port: &mut P) -> Result<()> {
        let ch = channel_no as usize;
        if ch >= self.channel_nb {
            return Err(PlatformError::Gpio(GpioError::InvalidPin));
        }
        self.timer_value[ch] = DEFAULT_SERVO_PULSE;
        self.enabled |= 1 << ch;
        port.enable_output(self.pin_mask[ch])?;
        port.set_low(self.pin_mask[ch]);
        Ok(())
    }

    /// Release a channel: stop pulsing it and disable its output driver
    pub fn disable_channel<P: GpioPort>(&mut self, channel_no: u8, port: &mut P) -> Result<()> {
        let ch = channel_no as usize;
        if ch >= self.channel_nb {
            return Err(PlatformError::Gpio(GpioError::InvalidPin));
        }
        if self.enabled & (1 << ch) == 0 {
            log_warn!("servo {} was already disabled", channel_no);
            return Ok(());
        }
        self.enabled &= !(1 << ch);
        self.active &= !(1 << ch);
        port.disable_output(self.pin_mask[ch])?;
        Ok(())
    }

    /// Whether a channel is allocated to a pin
    pub fn is_enabled(&self, channel_no: u8) -> bool {
        (channel_no as usize) < SERVO_MAX_NB && self.enabled & (1 << channel_no) != 0
    }
}

impl IoChannel for ServoOut<'_> {
    fn name(&self) -> &'static str {
        "RC servo output"
    }

    fn get(&self, channel_no: u8) -> Option<InputReading> {
        let ch = channel_no as usize;
        if ch >= self.channel_nb {
            return None;
        }
        Some(InputReading {
            value: self.timer_value[ch],
            active: self.active & (1 << ch) != 0,
        })
    }

    fn set(&mut self, channel_no: u8, cmd: &OutputCommand) {
        let ch = channel_no as usize;
        if ch >= self.channel_nb {
            log_warn!("incorrect servo number {}", channel_no);
            return;
        }

        if cmd.active {
            // protection against excessive pulses, which would produce
            // strange results with the lane sequencing
            self.timer_value[ch] = cmd.value.clamp(MIN_SERVO_PULSE, MAX_SERVO_PULSE);
            self.active |= 1 << ch;
        } else {
            // keep the last width so reactivation resumes where it left off
            self.active &= !(1 << ch);
        }
    }

    fn post(&mut self) -> bool {
        let Self {
            publisher,
            enabled,
            active,
            timer_value,
            pin_mask,
            ..
        } = self;
        publisher.apply_with(|schedule| {
            build_schedule(schedule, *enabled, *active, timer_value, pin_mask)
        })
    }
}
