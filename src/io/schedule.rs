//! Pulse schedule: double-buffered step sequences for the output ISR
//!
//! A schedule is one refresh period's worth of GPIO toggle steps. Two
//! buffers exist: the compare ISR walks the "current" one while the build
//! task fills the standby one and publishes it as "next". The ISR adopts
//! "next" only after finishing a full pass, so a live pulse is never
//! altered mid-flight. The shared current/next/cursor triple is the only
//! state both contexts touch; it is swapped inside a minimal critical
//! section, never a blocking lock.

use core::cell::{Cell, UnsafeCell};

use crate::io::time_base::Tick;
use crate::io::SERVO_MAX_NB;
use crate::platform::traits::{CompareTimer, GpioPort};

/// One step per servo plus the final pad step
pub const MAX_SCHEDULE_STEPS: usize = SERVO_MAX_NB + 1;

/// One order for the compare ISR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Step {
    /// GPIO lines to toggle when the step fires
    pub gpio_toggle: u32,
    /// Delay until the following step, in timer ticks
    pub time_to_next: Tick,
}

/// A bounded, time-ordered sequence of steps covering one refresh period
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    steps: heapless::Vec<Step, MAX_SCHEDULE_STEPS>,
}

impl Schedule {
    /// Create an empty schedule
    pub const fn new() -> Self {
        Self {
            steps: heapless::Vec::new(),
        }
    }

    /// Remove all steps
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Append a step; capacity is sized so a well-formed build never fills up
    pub fn push(&mut self, step: Step) {
        let res = self.steps.push(step);
        debug_assert!(res.is_ok(), "schedule step overflow");
    }

    /// The steps, in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the schedule holds no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all step delays, in ticks
    pub fn total_ticks(&self) -> u32 {
        self.steps.iter().map(|s| s.time_to_next as u32).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct SwapState {
    /// Buffer the ISR is executing
    current: u8,
    /// Buffer the ISR will adopt at the next cycle boundary
    next: u8,
    /// Step cursor within the current buffer
    cursor: u8,
}

/// Ping-pong schedule pair shared between build task and compare ISR
///
/// Ownership discipline: the ISR reads only the buffer indexed by
/// `current`; the publisher writes only the buffer indexed by neither
/// `current` nor `next`. While `current != next` a publish is pending and
/// the standby buffer is considered busy.
pub struct ScheduleSwap {
    buffers: [UnsafeCell<Schedule>; 2],
    state: critical_section::Mutex<Cell<SwapState>>,
}

// SAFETY: buffer access is serialized by the ownership discipline above;
// the index triple itself is only touched inside critical sections.
unsafe impl Sync for ScheduleSwap {}

impl ScheduleSwap {
    /// Create a swap whose both buffers hold an idle schedule: no toggles,
    /// one pad step of `idle_ticks`. The ISR can run before the first
    /// publish.
    pub fn new(idle_ticks: Tick) -> Self {
        let mut idle = Schedule::new();
        idle.push(Step {
            gpio_toggle: 0,
            time_to_next: idle_ticks,
        });
        Self {
            buffers: [UnsafeCell::new(idle.clone()), UnsafeCell::new(idle)],
            state: critical_section::Mutex::new(Cell::new(SwapState {
                current: 0,
                next: 0,
                cursor: 0,
            })),
        }
    }

    /// Split into the task-side publisher and the ISR-side runner
    pub fn split(&mut self) -> (SchedulePublisher<'_>, ScheduleRunner<'_>) {
        (
            SchedulePublisher { swap: self },
            ScheduleRunner { swap: self },
        )
    }

    fn load_state(&self) -> SwapState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }
}

/// Task-side handle: builds into the standby buffer and publishes it
pub struct SchedulePublisher<'a> {
    swap: &'a ScheduleSwap,
}

impl SchedulePublisher<'_> {
    /// Rebuild the standby buffer with `build` and publish it as "next"
    ///
    /// Returns `false` without calling `build` when the previous publish
    /// has not been consumed yet; the caller retries on a later cycle and
    /// the previously published schedule keeps running. A build that
    /// leaves the schedule empty is not published either: the ISR needs
    /// at least one step per cycle to re-arm the timer.
    pub fn apply_with<F: FnOnce(&mut Schedule)>(&mut self, build: F) -> bool {
        let state = self.swap.load_state();
        if state.current != state.next {
            return false;
        }
        let standby = 1 - state.current;

        // SAFETY: standby is neither current nor next, so the ISR will not
        // look at it before the publish below; building can take its time
        // with interrupts fully enabled.
        let schedule = unsafe { &mut *self.swap.buffers[standby as usize].get() };
        build(schedule);
        if schedule.is_empty() {
            return false;
        }

        critical_section::with(|cs| {
            let cell = self.swap.state.borrow(cs);
            let mut s = cell.get();
            s.next = standby;
            cell.set(s);
        });
        true
    }

    /// Whether a published schedule is still waiting to be adopted
    pub fn pending(&self) -> bool {
        let state = self.swap.load_state();
        state.current != state.next
    }
}

/// ISR-side handle: yields steps in order, swapping buffers at cycle ends
pub struct ScheduleRunner<'a> {
    swap: &'a ScheduleSwap,
}

impl ScheduleRunner<'_> {
    /// Fetch the step to execute now and advance the cursor
    ///
    /// When the last step of the current schedule is returned, the runner
    /// adopts the published "next" schedule, so the swap becomes visible
    /// exactly at a refresh-period boundary.
    pub fn step(&mut self) -> Step {
        critical_section::with(|cs| {
            let cell = self.swap.state.borrow(cs);
            let mut s = cell.get();

            // SAFETY: the publisher never writes the current buffer
            let schedule = unsafe { &*self.swap.buffers[s.current as usize].get() };
            let step = schedule.steps()[s.cursor as usize];

            s.cursor += 1;
            if s.cursor as usize >= schedule.len() {
                s.cursor = 0;
                s.current = s.next;
            }
            cell.set(s);
            step
        })
    }
}

/// Timer-compare interrupt handler for pulse generation
///
/// Highest interrupt priority in the system: any latency here is directly
/// visible as servo pulse jitter. Each firing re-arms the timer with the
/// current step's delay, then applies its toggle mask in one port write.
pub struct PulseTimer<'a> {
    runner: ScheduleRunner<'a>,
}

impl<'a> PulseTimer<'a> {
    /// Create the handler around the ISR half of the schedule swap
    pub fn new(runner: ScheduleRunner<'a>) -> Self {
        Self { runner }
    }

    /// Interrupt entry point; bounded, lock-free apart from the index swap
    pub fn on_compare_irq<T: CompareTimer, P: GpioPort>(&mut self, timer: &mut T, port: &mut P) {
        let step = self.runner.step();
        // re-arm first so the next edge is not delayed by the port write
        timer.program(step.time_to_next);
        port.toggle(step.gpio_toggle);
    }
}
