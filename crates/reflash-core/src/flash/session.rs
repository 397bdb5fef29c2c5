//! Reflash session - runtime state for erase and program operations

use crate::hw::RegisterSet;

/// Mutable state owned by the driver for its lifetime
///
/// `enabled` gates every mutating operation: it is false until an explicit
/// unprotect, and only a re-init clears it again. The active register set
/// is only populated while an operation is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflashSession {
    enabled: bool,
    active: Option<RegisterSet>,
}

impl ReflashSession {
    /// Create a protected session
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if erase and program operations may touch the hardware
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Allow erase and program operations until the next reset
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Back to the protected state
    pub fn reset(&mut self) {
        self.enabled = false;
        self.active = None;
    }

    /// Register set of the operation in progress, if any
    pub fn active_set(&self) -> Option<RegisterSet> {
        self.active
    }

    pub(crate) fn select(&mut self, set: RegisterSet) -> RegisterSet {
        self.active = Some(set);
        set
    }

    pub(crate) fn release(&mut self) {
        self.active = None;
    }
}
