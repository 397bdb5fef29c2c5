//! reflash-sim - Simulated on-chip flash controller
//!
//! This crate provides a flash controller that emulates the program flash,
//! control registers, block select registers, busy-wait clock, deadman timer
//! and interrupt mask in memory. It implements the `reflash-core` hardware
//! capabilities, so the real engines run against it unchanged. It's useful
//! for testing and for host-side dry runs without an ECU.
//!
//! The model follows NOR semantics: a program pulse can only clear bits, an
//! erase pulse sets a whole block back to 0xFF. Cells can be made slow to
//! program or stuck at either level to exercise the retry and fault paths.

mod model;

#[cfg(test)]
mod tests;

pub use model::{PulseModel, PulseRecord, SimConfig, SimStats, SimulatedFlash};

use std::io;

/// Errors from loading or saving a simulated flash image
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// I/O error on the image file
    #[error("image I/O error: {0}")]
    Io(#[from] io::Error),
    /// Image does not match the ROM size of the profile
    #[error("image is {found} bytes, expected {expected}")]
    SizeMismatch {
        /// ROM size of the profile
        expected: usize,
        /// Size of the image
        found: usize,
    },
}
