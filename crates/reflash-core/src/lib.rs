//! reflash-core - Erase and program engines for on-chip NOR program flash
//!
//! This crate implements the reflash back-end of an ECU kernel: erasing
//! blocks and programming chunks of the internal flash of two generations
//! of a microcontroller flash controller, with verify after every pulse and
//! bounded retries. It is `no_std` and reaches the hardware only through
//! the capability traits in [`hw`].
//!
//! # Features
//!
//! - `std` - Enable standard library support: `std::error::Error` impls,
//!   serde derives and the RON profile database
//!
//! # Example
//!
//! ```ignore
//! use reflash_core::chip::{ChipProfile, SH7051};
//! use reflash_core::flash::FlashDriver;
//!
//! fn reflash<H: reflash_core::hw::FlashHardware>(hw: H, image: &[u8]) -> reflash_core::Result<()> {
//!     let mut driver = FlashDriver::new(ChipProfile::new(&SH7051).unwrap(), hw);
//!     driver.init()?;
//!     driver.unprotect();
//!     for block in 0..driver.profile().block_count() {
//!         driver.erase_block(block)?;
//!     }
//!     driver.write_range(0, image)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod error;
pub mod flash;
pub mod hw;

pub use error::{Error, Result};
