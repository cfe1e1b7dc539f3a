//! PPM receiver input
//!
//! A PPM stream carries several channel values on one line as successive
//! pulse widths separated by a long sync gap. The decoder replays the edge
//! events captured by the ISR, measures the width between falling edges,
//! and treats any width above the sync threshold as the start of a new
//! frame. An inactivity watchdog clears the activity flag when the line
//! goes quiet.

use crate::io::edge_capture::EdgeConsumer;
use crate::io::time_base::{elapsed, us_to_ticks, Tick, TimeBase};
use crate::io::{InputReading, IoChannel};
use crate::platform::traits::{CaptureTimer, GpioPort};
use crate::platform::Result;

/// Maximum number of channels in one PPM frame
pub const PPM_MAX_CHANNELS: usize = 16;

/// Pulse widths above this are the inter-frame sync gap
pub const FRAME_SYNC_THRESHOLD: Tick = us_to_ticks(3000);

/// No edge for this long means the receiver signal is gone
pub const INACTIVITY_TIMEOUT: Tick = us_to_ticks(25_000);

/// Neutral pulse width reported before the first frame arrives
pub const DEFAULT_PULSE: Tick = us_to_ticks(1500);

/// PPM frame reconstruction state
///
/// Mutated only by the decode task; the edge ISR never touches it.
#[derive(Debug)]
pub struct PpmDecoder {
    /// Mask of the monitored line in a port snapshot
    gpio_mask: u32,
    /// Level seen at the previous processed event
    prev_level: bool,
    /// Timestamp of the last falling edge
    last_toggle_time: Tick,
    /// Cursor into the current frame
    index: usize,
    /// Any activity lately on this line?
    active: bool,
    /// Last measured pulse width per channel, in ticks
    pulse_tick: [Tick; PPM_MAX_CHANNELS],
}

impl PpmDecoder {
    /// Create a decoder for the line selected by `gpio_mask`
    pub fn new(gpio_mask: u32, initial_level: bool) -> Self {
        Self {
            gpio_mask,
            prev_level: initial_level,
            last_toggle_time: 0,
            index: 0,
            active: false,
            pulse_tick: [DEFAULT_PULSE; PPM_MAX_CHANNELS],
        }
    }

    /// Feed one captured edge event into the frame state
    pub fn process_edge(&mut self, levels: u32, when: Tick) {
        let level = levels & self.gpio_mask != 0;

        // a line only carries information on level transitions; the port
        // snapshot may report edges of other lines
        if level == self.prev_level {
            return;
        }

        if !level {
            let pulse = elapsed(when, self.last_toggle_time);
            if pulse > FRAME_SYNC_THRESHOLD {
                // sync gap: next pulse starts a new frame
                self.index = 0;
            } else {
                self.pulse_tick[self.index] = pulse;
                self.index += 1;

                // a malformed frame can carry more pulses than channels
                if self.index >= PPM_MAX_CHANNELS {
                    self.index = 0;
                }
            }
            self.active = true;
            self.last_toggle_time = when;
        }

        self.prev_level = level;
    }

    /// Invalidate the signal if the line has been quiet too long
    pub fn check_activity(&mut self, now: Tick) {
        if self.active && elapsed(now, self.last_toggle_time) > INACTIVITY_TIMEOUT {
            self.active = false;
        }
    }

    /// Last measured width of one channel
    pub fn pulse(&self, channel_no: usize) -> Option<Tick> {
        self.pulse_tick.get(channel_no).copied()
    }

    /// Whether the line has shown recent activity
    pub fn active(&self) -> bool {
        self.active
    }

    /// Current cursor into the frame
    pub fn frame_index(&self) -> usize {
        self.index
    }
}

/// PPM input channel class
///
/// Task-context half of the input path: owns the decoder, the consumer end
/// of the edge ring and the input time base. The matching ISR half is
/// [`crate::io::edge_capture::EdgeCapture`].
pub struct PpmInput<'a, T: CaptureTimer> {
    decoder: PpmDecoder,
    events: EdgeConsumer<'a>,
    time: TimeBase<T>,
}

impl<'a, T: CaptureTimer> PpmInput<'a, T> {
    /// Set up the PPM input on `pin`
    ///
    /// Configures the pin as a pulled-up, both-edge interrupt input and
    /// snapshots its current level so the first transition is decoded
    /// correctly.
    pub fn new<P: GpioPort>(
        pin: u8,
        port: &mut P,
        events: EdgeConsumer<'a>,
        timer: T,
    ) -> Result<Self> {
        let gpio_mask = 1u32 << (pin & 0x1F);
        port.configure_input(gpio_mask)?;
        let initial_level = port.read_levels() & gpio_mask != 0;
        Ok(Self {
            decoder: PpmDecoder::new(gpio_mask, initial_level),
            events,
            time: TimeBase::new(timer),
        })
    }

    /// Access the decoder state (for diagnostics and tests)
    pub fn decoder(&self) -> &PpmDecoder {
        &self.decoder
    }
}

impl<T: CaptureTimer> IoChannel for PpmInput<'_, T> {
    fn name(&self) -> &'static str {
        "RC PPM input"
    }

    fn pre(&mut self) {
        // drain everything the ISR captured since the previous cycle,
        // oldest first
        while let Some(event) = self.events.pop() {
            self.decoder.process_edge(event.levels, event.timestamp);
        }
        let now = self.time.now();
        self.decoder.check_activity(now);
    }

    fn get(&self, channel_no: u8) -> Option<InputReading> {
        let value = self.decoder.pulse(channel_no as usize)?;
        Some(InputReading {
            value,
            active: self.decoder.active(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::edge_capture::{EdgeCapture, EdgeRing};
    use crate::platform::mock::{MockCaptureTimer, MockPort};

    const MASK: u32 = 1 << 10;

    /// Feed a full pulse (rising then falling edge) into the decoder
    fn pulse(decoder: &mut PpmDecoder, start: Tick, width: Tick) -> Tick {
        decoder.process_edge(MASK, start);
        decoder.process_edge(0, start.wrapping_add(width));
        start.wrapping_add(width)
    }

    #[test]
    fn test_decode_single_frame() {
        let mut decoder = PpmDecoder::new(MASK, false);
        let widths = [1875u16, 2812, 2100, 3000, 1900, 2500];

        // sync gap first so the frame starts at index 0
        let mut t = pulse(&mut decoder, 0, FRAME_SYNC_THRESHOLD + 100);
        assert_eq!(decoder.frame_index(), 0);

        for (i, &w) in widths.iter().enumerate() {
            t = pulse(&mut decoder, t, w);
            assert_eq!(decoder.frame_index(), i + 1);
        }

        for (i, &w) in widths.iter().enumerate() {
            assert_eq!(decoder.pulse(i), Some(w));
        }
        assert!(decoder.active());
    }

    #[test]
    fn test_sync_resets_partial_frame() {
        let mut decoder = PpmDecoder::new(MASK, false);

        let mut t = pulse(&mut decoder, 0, 2000);
        t = pulse(&mut decoder, t, 2200);
        assert_eq!(decoder.frame_index(), 2);

        // sync arrives after only two channels: index resets, untouched
        // channels keep their previous (default) value
        pulse(&mut decoder, t, FRAME_SYNC_THRESHOLD + 1);
        assert_eq!(decoder.frame_index(), 0);
        assert_eq!(decoder.pulse(0), Some(2000));
        assert_eq!(decoder.pulse(1), Some(2200));
        assert_eq!(decoder.pulse(2), Some(DEFAULT_PULSE));
    }

    #[test]
    fn test_overlong_frame_wraps_defensively() {
        let mut decoder = PpmDecoder::new(MASK, false);

        let mut t = 0;
        for _ in 0..PPM_MAX_CHANNELS {
            t = pulse(&mut decoder, t, 2000);
        }
        // one pulse more than a frame can hold
        assert_eq!(decoder.frame_index(), 0);
        pulse(&mut decoder, t, 2100);
        assert_eq!(decoder.frame_index(), 1);
        assert_eq!(decoder.pulse(0), Some(2100));
    }

    #[test]
    fn test_unchanged_level_ignored() {
        let mut decoder = PpmDecoder::new(MASK, false);

        // another line on the port toggles; ours stays low
        decoder.process_edge(1 << 3, 500);
        assert!(!decoder.active());
        assert_eq!(decoder.frame_index(), 0);
    }

    #[test]
    fn test_inactivity_timeout() {
        let mut decoder = PpmDecoder::new(MASK, false);
        let t = pulse(&mut decoder, 0, 2000);
        assert!(decoder.active());

        decoder.check_activity(t.wrapping_add(INACTIVITY_TIMEOUT));
        assert!(decoder.active());

        decoder.check_activity(t.wrapping_add(INACTIVITY_TIMEOUT + 1));
        assert!(!decoder.active());

        // stays inactive until a new edge arrives
        decoder.check_activity(t.wrapping_add(INACTIVITY_TIMEOUT + 500));
        assert!(!decoder.active());
        pulse(&mut decoder, t.wrapping_add(30_000), 2000);
        assert!(decoder.active());
    }

    #[test]
    fn test_width_measured_across_counter_wrap() {
        let mut decoder = PpmDecoder::new(MASK, false);

        // falling-edge baseline just before the 16-bit counter wraps;
        // the long gap since reset reads as a sync and resets the frame
        decoder.process_edge(MASK, 0xFF00);
        decoder.process_edge(0, 0xFFA0);
        assert_eq!(decoder.frame_index(), 0);

        // next falling edge lands after the wrap
        let t = pulse(&mut decoder, 0xFFC0, 2000 - 0x20);
        assert_eq!(t, 0xFFA0u16.wrapping_add(2000));
        assert_eq!(decoder.pulse(0), Some(2000));
    }

    #[test]
    fn test_ppm_input_end_to_end() {
        let timer = MockCaptureTimer::new();
        let mut port = MockPort::new();
        let mut ring = EdgeRing::new();
        let (producer, consumer) = ring.split();

        let mut input = PpmInput::new(10, &mut port, consumer, &timer).unwrap();
        let mut capture = EdgeCapture::new(&timer, producer, MASK);

        // one frame of three pulses followed by a sync gap
        let widths = [1875u16, 2812, 2344];
        timer.advance(FRAME_SYNC_THRESHOLD + 200);
        port.set_input_levels(MASK);
        capture.on_edge_irq(&mut port);
        timer.advance(100);
        port.set_input_levels(0);
        capture.on_edge_irq(&mut port);

        for &w in &widths {
            port.set_input_levels(MASK);
            capture.on_edge_irq(&mut port);
            timer.advance(w);
            port.set_input_levels(0);
            capture.on_edge_irq(&mut port);
        }

        input.pre();

        for (i, &w) in widths.iter().enumerate() {
            let reading = input.get(i as u8).unwrap();
            assert_eq!(reading.value, w);
            assert!(reading.active);
        }
        assert!(input.get(PPM_MAX_CHANNELS as u8).is_none());

        // signal loss: no further edges, next cycle past the timeout
        timer.advance(INACTIVITY_TIMEOUT + 1);
        input.pre();
        assert!(!input.get(0).unwrap().active);
        // stale-but-valid: last widths are still reported
        assert_eq!(input.get(1).unwrap().value, widths[1]);
    }
}
