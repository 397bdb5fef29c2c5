//! Sequences shared by the erase and program engines

use crate::chip::ChipProfile;
use crate::error::{Error, Result};
use crate::hw::{ControlBits, FlashHardware, RegisterSet, SelectRegister};

/// Value of an erased 32-bit word, also the dummy write pattern in verify mode
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Refuse to start unless write-enable is asserted and no fault is latched
pub(crate) fn preflight<H: FlashHardware + ?Sized>(hw: &mut H) -> Result<()> {
    let status = hw.status();
    if status.is_healthy() {
        Ok(())
    } else {
        log::warn!("Flash controller not ready (status {:?})", status);
        Err(Error::ProtectionFault)
    }
}

/// Set SWE and wait for it to settle
pub(crate) fn enter_write_mode<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    active: RegisterSet,
) {
    hw.set_control(profile.swe_register_set(active), ControlBits::SWE);
    hw.wait(profile.timings().swe_set);
}

/// Clear SWE and wait for it to settle
pub(crate) fn leave_write_mode<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    active: RegisterSet,
) {
    hw.clear_control(profile.swe_register_set(active), ControlBits::SWE);
    hw.wait(profile.timings().swe_clear);
}

/// Select exactly one erase block
///
/// Both select registers are cleared first so two blocks are never selected
/// at once, even for a moment.
pub(crate) fn select_block<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    index: usize,
) {
    deselect_blocks(hw);
    let masks = profile.block_select().masks(index);
    for reg in [SelectRegister::First, SelectRegister::Second] {
        let mask = masks[reg.index()];
        if mask != 0 {
            hw.write_block_select(reg, mask);
        }
    }
}

/// Clear both block select registers
pub(crate) fn deselect_blocks<H: FlashHardware + ?Sized>(hw: &mut H) {
    for reg in SelectRegister::ALL {
        hw.write_block_select(reg, 0);
    }
}
