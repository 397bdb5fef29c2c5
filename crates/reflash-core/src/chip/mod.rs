//! Chip profiles and the profile database
//!
//! A [`ChipProfile`] describes one flash controller generation: block map,
//! program chunk size, attempt bounds, pulse timings and how addresses map
//! onto the two control register sets.

mod builtin;
mod profile;

#[cfg(feature = "std")]
mod database;

pub use builtin::*;
pub use profile::*;

#[cfg(feature = "std")]
pub use database::*;
