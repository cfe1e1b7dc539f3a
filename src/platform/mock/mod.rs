//! Mock platform implementations for host testing
//!
//! The mocks record what the engine asked the hardware to do (toggle masks,
//! programmed compare values) so tests can reconstruct the emitted waveform
//! tick by tick.

pub mod gpio;
pub mod timer;

pub use gpio::MockPort;
pub use timer::{MockCaptureTimer, MockCompareTimer};
