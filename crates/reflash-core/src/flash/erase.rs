//! Block erase with erase-verify and bounded retries

use core::ops::Range;

use crate::chip::ChipProfile;
use crate::error::{Error, Result};
use crate::hw::{ControlBits, DeadmanClass, FlashHardware, RegisterSet};

use super::sequence::{
    deselect_blocks, enter_write_mode, leave_write_mode, preflight, select_block, ERASED_WORD,
};
use super::{Outcome, ReflashSession};

/// Erase one block and verify it reads blank
///
/// Pulses and verifies up to `max_erase_attempts` times. SWE is cleared on
/// every exit path.
///
/// # Errors
/// * `BadBlock` - `index` is not in the block map (checked before any access)
/// * `ProtectionFault` - write-enable not asserted or fault latched
/// * `EraseVerifyFailed` - block still not blank after the last attempt
pub fn erase_block<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    session: &mut ReflashSession,
    hw: &mut H,
    index: usize,
) -> Result<Outcome> {
    let range = profile.block_range(index).ok_or(Error::BadBlock)?;

    if !session.is_enabled() {
        log::debug!("Erase of block {} skipped: reflash not enabled", index);
        return Ok(Outcome::Skipped);
    }

    let set = session.select(profile.register_set(range.start));
    let result = preflight(hw).and_then(|()| {
        enter_write_mode(profile, hw, set);
        let result = erase_attempts(profile, hw, set, index, &range);
        leave_write_mode(profile, hw, set);
        result
    });
    session.release();
    result
}

fn erase_attempts<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    set: RegisterSet,
    index: usize,
    range: &Range<u32>,
) -> Result<Outcome> {
    log::debug!(
        "Erasing block {} (0x{:08X}..0x{:08X}) via {:?}",
        index,
        range.start,
        range.end,
        set
    );

    for attempt in 1..=profile.max_erase_attempts() {
        erase_pulse(profile, hw, set, index);
        match verify_blank(profile, hw, set, range) {
            None => {
                log::debug!("Block {} erased after {} attempt(s)", index, attempt);
                return Ok(Outcome::Completed { attempts: attempt });
            }
            Some(addr) => {
                log::trace!(
                    "Erase attempt {} of block {}: not blank at 0x{:08X}",
                    attempt,
                    index,
                    addr
                );
            }
        }
    }

    log::warn!(
        "Block {} still not blank after {} erase attempts",
        index,
        profile.max_erase_attempts()
    );
    Err(Error::EraseVerifyFailed)
}

/// One erase pulse on a single selected block, under the deadman timer
fn erase_pulse<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    set: RegisterSet,
    index: usize,
) {
    let t = profile.timings();

    select_block(profile, hw, index);
    hw.arm_deadman(DeadmanClass::Erase);

    hw.set_control(set, ControlBits::ESU);
    hw.wait(t.erase_setup);
    hw.set_control(set, ControlBits::E);
    hw.wait(t.erase_pulse);
    hw.clear_control(set, ControlBits::E);
    hw.wait(t.erase_pulse_clear);
    hw.clear_control(set, ControlBits::ESU);
    hw.wait(t.erase_setup_clear);

    hw.disarm_deadman();
    deselect_blocks(hw);
}

/// Erase-verify every word of the block
///
/// Returns the first address that does not read back erased, or `None` if
/// the whole block is blank.
fn verify_blank<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    set: RegisterSet,
    range: &Range<u32>,
) -> Option<u32> {
    let t = profile.timings();
    let mut first_bad = None;

    for addr in range.clone().step_by(4) {
        hw.set_control(set, ControlBits::EV);
        hw.wait(t.erase_verify_setup);
        hw.write32(addr, ERASED_WORD);
        hw.wait(t.erase_verify_read);
        if hw.read32(addr) != ERASED_WORD {
            first_bad = Some(addr);
            break;
        }
    }

    hw.clear_control(set, ControlBits::EV);
    hw.wait(t.erase_verify_clear);
    first_bad
}
