//! CLI command implementations
//!
//! Every command works on a [`crate::target::Target`] through the
//! `FlashDriver` facade, the same way an on-target kernel would.

mod erase;
mod info;
mod list;
mod progress;
mod verify;
mod write;

pub use erase::run_erase;
pub use info::print_chip_info;
pub use list::list_chips;
pub use verify::run_verify;
pub use write::run_write;
