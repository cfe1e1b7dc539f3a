//! Mock GPIO port implementation for testing

use crate::platform::{
    error::{GpioError, PlatformError},
    traits::GpioPort,
    Result,
};

/// Maximum number of toggle writes remembered by the mock
const TOGGLE_LOG_CAPACITY: usize = 128;

/// Mock GPIO port
///
/// Tracks output levels, driver enables and input levels for a full 32-line
/// port, and keeps a log of every toggle mask written so tests can replay
/// the pulse waveform.
#[derive(Debug, Default)]
pub struct MockPort {
    input_levels: u32,
    output_levels: u32,
    output_enabled: u32,
    input_configured: u32,
    pending_edges: u32,
    toggle_log: heapless::Vec<u32, TOGGLE_LOG_CAPACITY>,
}

impl MockPort {
    /// Create a new mock port with all lines low and undriven
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate external input levels (for edge-capture tests)
    pub fn set_input_levels(&mut self, levels: u32) {
        let changed = self.input_levels ^ levels;
        self.input_levels = levels;
        self.pending_edges |= changed & self.input_configured;
    }

    /// Current output level of every line (driven lines only)
    pub fn output_levels(&self) -> u32 {
        self.output_levels & self.output_enabled
    }

    /// Lines with an enabled output driver
    pub fn output_enabled(&self) -> u32 {
        self.output_enabled
    }

    /// Edge interrupt flags not yet cleared
    pub fn pending_edges(&self) -> u32 {
        self.pending_edges
    }

    /// Every toggle mask written so far, oldest first
    pub fn toggle_log(&self) -> &[u32] {
        &self.toggle_log
    }

    /// Forget recorded toggles (levels are kept)
    pub fn clear_toggle_log(&mut self) {
        self.toggle_log.clear();
    }
}

impl GpioPort for MockPort {
    fn read_levels(&self) -> u32 {
        self.input_levels | self.output_levels()
    }

    fn toggle(&mut self, mask: u32) {
        self.output_levels ^= mask;
        // a full log is a test sizing problem, not a mock failure
        let _ = self.toggle_log.push(mask);
    }

    fn set_low(&mut self, mask: u32) {
        self.output_levels &= !mask;
    }

    fn enable_output(&mut self, mask: u32) -> Result<()> {
        if mask & self.input_configured != 0 {
            return Err(PlatformError::Gpio(GpioError::PinInUse));
        }
        self.output_enabled |= mask;
        Ok(())
    }

    fn disable_output(&mut self, mask: u32) -> Result<()> {
        self.output_enabled &= !mask;
        Ok(())
    }

    fn configure_input(&mut self, mask: u32) -> Result<()> {
        if mask & self.output_enabled != 0 {
            return Err(PlatformError::Gpio(GpioError::PinInUse));
        }
        self.input_configured |= mask;
        Ok(())
    }

    fn clear_edge_interrupt(&mut self, mask: u32) {
        self.pending_edges &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_tracks_levels_and_log() {
        let mut port = MockPort::new();
        port.enable_output(0b0110).unwrap();

        port.toggle(0b0010);
        assert_eq!(port.output_levels(), 0b0010);

        port.toggle(0b0110);
        assert_eq!(port.output_levels(), 0b0100);

        assert_eq!(port.toggle_log(), &[0b0010, 0b0110]);
    }

    #[test]
    fn test_undriven_lines_stay_invisible() {
        let mut port = MockPort::new();
        port.enable_output(0b0001).unwrap();

        // Toggling an undriven line changes no visible level
        port.toggle(0b1001);
        assert_eq!(port.output_levels(), 0b0001);

        // Enabling its driver afterwards exposes the latched level
        port.enable_output(0b1000).unwrap();
        assert_eq!(port.output_levels(), 0b1001);
    }

    #[test]
    fn test_input_edge_flags() {
        let mut port = MockPort::new();
        port.configure_input(0b0100).unwrap();

        port.set_input_levels(0b0100);
        assert_eq!(port.pending_edges(), 0b0100);
        assert_eq!(port.read_levels() & 0b0100, 0b0100);

        port.clear_edge_interrupt(0b0100);
        assert_eq!(port.pending_edges(), 0);

        // Falling edge raises the flag again
        port.set_input_levels(0);
        assert_eq!(port.pending_edges(), 0b0100);
    }

    #[test]
    fn test_input_output_conflict() {
        let mut port = MockPort::new();
        port.configure_input(0b0001).unwrap();

        assert_eq!(
            port.enable_output(0b0001),
            Err(PlatformError::Gpio(GpioError::PinInUse))
        );
    }
}
