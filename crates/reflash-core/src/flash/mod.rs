//! Erase and program engines and the driver facade
//!
//! [`erase_block`] and [`write_chunk`] are the engines; [`FlashDriver`] wraps
//! them with input validation and the session state. Each call runs to
//! completion:
//!
//! ```text
//! Idle -> WriteEnabled -> Erasing/Programming -> Verifying -+-> Idle (success)
//!                              ^                            |
//!                              +---------- retry -----------+-> Idle (attempts exhausted)
//! ```

mod driver;
mod erase;
mod sequence;
mod session;
mod write;

pub use driver::FlashDriver;
pub use erase::erase_block;
pub use sequence::ERASED_WORD;
pub use session::ReflashSession;
pub use write::{additional_word, check_chunk, is_hard_fault, reprogram_word, write_chunk};

/// How a successful erase or write went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The hardware was updated and verified
    Completed {
        /// Pulse/verify rounds used (worst chunk for a range write)
        attempts: u32,
    },
    /// The session is protected; nothing was touched
    Skipped,
}

impl Outcome {
    /// Check if the hardware was actually updated
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
