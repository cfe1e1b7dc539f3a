//! Core systems shared across the firmware

pub mod logging;
