#![cfg_attr(not(test), no_std)]

//! multiservo - real-time signal I/O engine for a multi-channel RC servo board
//!
//! This library decodes a pulse-position-modulated (PPM) receiver signal from
//! GPIO edge interrupts and synthesizes up to 24 independent servo pulse
//! trains from a single timer/compare unit, using a double-buffered step
//! schedule that is swapped atomically at refresh-period boundaries.

// Platform abstraction layer (traits + mock implementations for host tests)
pub mod platform;

// Core systems (logging)
pub mod core;

// Signal I/O engine: edge capture, PPM decode, pulse schedule generation
pub mod io;
