//! Flash controller register capability

use bitflags::bitflags;

bitflags! {
    /// Bits of a flash memory control register
    ///
    /// Every register set has its own copy of these bits. Which set a bit is
    /// written to is chosen per address, see [`RegisterSet`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlBits: u8 {
        /// Software write enable
        const SWE = 0x40;
        /// Erase setup
        const ESU = 0x20;
        /// Program setup
        const PSU = 0x10;
        /// Erase verify mode
        const EV  = 0x08;
        /// Program verify mode
        const PV  = 0x04;
        /// Erase pulse
        const E   = 0x02;
        /// Program pulse
        const P   = 0x01;

        /// Bits that start or sustain a pulse
        const PULSE = Self::E.bits() | Self::P.bits();
        /// Bits that must be clear whenever the controller is idle
        const ACTIVE = Self::ESU.bits() | Self::PSU.bits() | Self::EV.bits()
            | Self::PV.bits() | Self::E.bits() | Self::P.bits();
    }
}

impl Default for ControlBits {
    fn default() -> Self {
        ControlBits::empty()
    }
}

bitflags! {
    /// Controller status, read-only from software
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlashStatus: u8 {
        /// Flash write enable pin is asserted
        const WRITE_ENABLE = 0x01;
        /// Flash error latch: set by the controller after an illegal access
        const FAULT = 0x02;
    }
}

impl FlashStatus {
    /// True if the controller will accept erase and program sequences
    pub fn is_healthy(self) -> bool {
        self.contains(FlashStatus::WRITE_ENABLE) && !self.contains(FlashStatus::FAULT)
    }
}

/// One of the two control register sets
///
/// Low addresses are governed by the primary set, everything at or above the
/// profile's `secondary_set_start` by the secondary set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterSet {
    /// First control register
    Primary,
    /// Second control register
    Secondary,
}

impl RegisterSet {
    /// Index into per-set arrays
    pub const fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

/// One of the two erase block select registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectRegister {
    /// First block select register
    First,
    /// Second block select register
    Second,
}

impl SelectRegister {
    /// Both registers, in the order they are cleared
    pub const ALL: [SelectRegister; 2] = [SelectRegister::Second, SelectRegister::First];

    /// Index into per-register arrays
    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// Register and memory-mapped access to an on-chip flash controller
///
/// Production code implements this over the real peripheral; tests use a
/// simulated controller. All accesses are infallible, as they are on the
/// bus.
pub trait FlashRegisters {
    /// Read the controller status
    fn status(&mut self) -> FlashStatus;

    /// Read a control register
    fn control(&mut self, set: RegisterSet) -> ControlBits;

    /// Set bits in a control register (read-modify-write)
    fn set_control(&mut self, set: RegisterSet, bits: ControlBits);

    /// Clear bits in a control register (read-modify-write)
    fn clear_control(&mut self, set: RegisterSet, bits: ControlBits);

    /// Write a block select register
    fn write_block_select(&mut self, reg: SelectRegister, mask: u8);

    /// 8-bit write to the flash array
    fn write8(&mut self, addr: u32, value: u8);

    /// 32-bit write to the flash array, `addr` must be 4-byte aligned
    fn write32(&mut self, addr: u32, value: u32);

    /// 8-bit read from the flash array
    fn read8(&mut self, addr: u32) -> u8;

    /// 32-bit read from the flash array, `addr` must be 4-byte aligned
    fn read32(&mut self, addr: u32) -> u32;
}

impl<R: FlashRegisters + ?Sized> FlashRegisters for &mut R {
    fn status(&mut self) -> FlashStatus {
        (**self).status()
    }

    fn control(&mut self, set: RegisterSet) -> ControlBits {
        (**self).control(set)
    }

    fn set_control(&mut self, set: RegisterSet, bits: ControlBits) {
        (**self).set_control(set, bits)
    }

    fn clear_control(&mut self, set: RegisterSet, bits: ControlBits) {
        (**self).clear_control(set, bits)
    }

    fn write_block_select(&mut self, reg: SelectRegister, mask: u8) {
        (**self).write_block_select(reg, mask)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        (**self).write8(addr, value)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }

    fn read8(&mut self, addr: u32) -> u8 {
        (**self).read8(addr)
    }

    fn read32(&mut self, addr: u32) -> u32 {
        (**self).read32(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_health() {
        assert!(FlashStatus::WRITE_ENABLE.is_healthy());
        assert!(!FlashStatus::empty().is_healthy());
        assert!(!(FlashStatus::WRITE_ENABLE | FlashStatus::FAULT).is_healthy());
        assert!(!FlashStatus::FAULT.is_healthy());
    }

    #[test]
    fn test_active_excludes_swe() {
        assert!(!ControlBits::ACTIVE.contains(ControlBits::SWE));
        assert!(ControlBits::ACTIVE.contains(ControlBits::PULSE));
    }
}
