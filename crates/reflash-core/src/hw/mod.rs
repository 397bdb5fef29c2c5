//! Hardware capabilities consumed by the engines
//!
//! The engines never touch the peripheral directly. They go through two
//! traits, [`FlashRegisters`] for the controller registers and the flash
//! array, and [`Timing`] for calibrated waits, the deadman timer and
//! interrupt masking. A type implementing both is a [`FlashHardware`].

mod registers;
mod timing;

pub use registers::*;
pub use timing::*;

/// Everything the flash driver needs from the hardware
pub trait FlashHardware: FlashRegisters + Timing {}

impl<H: FlashRegisters + Timing + ?Sized> FlashHardware for H {}
