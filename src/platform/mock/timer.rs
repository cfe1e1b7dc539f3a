//! Mock timer implementations for testing

use core::cell::Cell;

use crate::io::time_base::Tick;
use crate::platform::traits::{CaptureTimer, CompareTimer};

/// Maximum number of programmed compare values remembered by the mock
const PROGRAM_LOG_CAPACITY: usize = 128;

/// Mock free-running counter
///
/// Time only moves when the test advances it, so `now()` uses interior
/// mutability and the same instance can be shared by reference between the
/// simulated ISR and the decode task (see the blanket `&T` impl of
/// [`CaptureTimer`]).
#[derive(Debug, Default)]
pub struct MockCaptureTimer {
    ticks: Cell<Tick>,
}

impl MockCaptureTimer {
    /// Create a mock counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock counter starting at `ticks`
    pub fn starting_at(ticks: Tick) -> Self {
        Self {
            ticks: Cell::new(ticks),
        }
    }

    /// Advance simulated time, wrapping like the 16-bit hardware counter
    pub fn advance(&self, ticks: Tick) {
        self.ticks.set(self.ticks.get().wrapping_add(ticks));
    }

    /// Jump simulated time to an absolute counter value
    pub fn set_now(&self, ticks: Tick) {
        self.ticks.set(ticks);
    }
}

impl CaptureTimer for MockCaptureTimer {
    fn now(&self) -> Tick {
        self.ticks.get()
    }
}

/// Mock compare timer channel
///
/// Records every programmed compare value so tests can replay the exact
/// inter-step delays the pulse ISR requested.
#[derive(Debug, Default)]
pub struct MockCompareTimer {
    running: bool,
    programmed: heapless::Vec<Tick, PROGRAM_LOG_CAPACITY>,
}

impl MockCompareTimer {
    /// Create a stopped mock compare timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the counter is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Every compare value programmed so far, oldest first
    pub fn programmed(&self) -> &[Tick] {
        &self.programmed
    }

    /// Forget recorded compare values
    pub fn clear_programmed(&mut self) {
        self.programmed.clear();
    }
}

impl CompareTimer for MockCompareTimer {
    fn program(&mut self, ticks: Tick) {
        let _ = self.programmed.push(ticks);
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
