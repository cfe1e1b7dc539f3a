//! Platform abstraction layer
//!
//! Hardware access is expressed as traits so the signal engine can run
//! against the real timer/GPIO block on target and against mock
//! implementations in host tests.

pub mod error;
pub mod mock;
pub mod traits;

pub use error::{PlatformError, Result};
