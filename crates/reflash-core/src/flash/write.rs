//! Chunk programming with program-verify and bit-level reprogramming
//!
//! A NOR cell only moves from 1 to 0 under a program pulse. After every
//! pulse the chunk is read back in program-verify mode and the data for the
//! next pulse is recomputed word by word:
//!
//! | source | readback | next pulse | meaning                       |
//! |--------|----------|------------|-------------------------------|
//! | 1      | 1        | 1          | nothing to do                 |
//! | 0      | 0        | 1          | done, never pulsed again      |
//! | 0      | 1        | 0          | not programmed yet, retry     |
//! | 1      | 0        | -          | hard fault, abort immediately |
//!
//! Profiles with additional programming follow each of their first few
//! attempts with one short pulse over the bits that just verified, to
//! settle cells disturbed by their neighbours.

use crate::chip::{ChipProfile, MAX_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::hw::{ControlBits, DeadmanClass, Delay, FlashHardware, RegisterSet};

use super::sequence::{enter_write_mode, leave_write_mode, preflight, ERASED_WORD};
use super::{Outcome, ReflashSession};

const WORD_SIZE: usize = 4;
const MAX_WORDS: usize = MAX_CHUNK_SIZE / WORD_SIZE;

type WordBuf = heapless::Vec<u32, MAX_WORDS>;

/// Data for the next pulse: keep asking for bits that are still 1 but
/// should be 0, release every bit that already reads 0
pub const fn reprogram_word(source: u32, readback: u32) -> u32 {
    source | !readback
}

/// Additional programming data: re-pulse exactly the bits the last pulse
/// asked for and that now read 0
pub const fn additional_word(readback: u32, programmed: u32) -> u32 {
    readback | programmed
}

/// A bit reads 0 where the source wants 1; no pulse can bring it back
pub const fn is_hard_fault(source: u32, readback: u32) -> bool {
    source & !readback != 0
}

/// Check a chunk write request against the profile, without touching hardware
pub fn check_chunk(profile: &ChipProfile, dest: u32, len: usize) -> Result<()> {
    if !profile.contains(dest) {
        return Err(Error::OutOfBounds);
    }
    if !profile.is_chunk_aligned(dest) {
        return Err(Error::Misaligned);
    }
    if len != profile.chunk_size() as usize {
        return Err(Error::LengthInvalid);
    }
    if !profile.is_valid_range(dest, len) {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

/// Program one chunk and verify it
///
/// The target is expected to be erased. `src` must be exactly one chunk.
///
/// # Errors
/// * `OutOfBounds`, `Misaligned`, `LengthInvalid` - bad request (checked
///   before any access)
/// * `ProtectionFault` - write-enable not asserted or fault latched
/// * `VerifyHardFault` - a wanted 1 reads 0; no further pulses were issued
/// * `MaxRetriesExceeded` - still mismatched after the last attempt
pub fn write_chunk<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    session: &mut ReflashSession,
    hw: &mut H,
    dest: u32,
    src: &[u8],
) -> Result<Outcome> {
    check_chunk(profile, dest, src.len())?;

    if !session.is_enabled() {
        log::debug!("Write to 0x{:08X} skipped: reflash not enabled", dest);
        return Ok(Outcome::Skipped);
    }

    let set = session.select(profile.register_set(dest));
    let result = preflight(hw).and_then(|()| {
        let mut chunk = ChunkProgram::new(dest, src)?;
        enter_write_mode(profile, hw, set);
        let result = chunk.run(profile, hw, set);
        leave_write_mode(profile, hw, set);
        result
    });
    session.release();
    result
}

/// State of one chunk being programmed
struct ChunkProgram {
    dest: u32,
    /// What the chunk must end up holding
    source: WordBuf,
    /// What the next pulse latches
    reprogram: WordBuf,
    /// What the additional programming pulse latches
    additional: WordBuf,
}

impl ChunkProgram {
    fn new(dest: u32, src: &[u8]) -> Result<Self> {
        let mut source = WordBuf::new();
        for word in src.chunks_exact(WORD_SIZE) {
            let word = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            source.push(word).map_err(|_| Error::LengthInvalid)?;
        }
        let reprogram = source.clone();
        let mut additional = WordBuf::new();
        additional
            .resize(source.len(), ERASED_WORD)
            .map_err(|_| Error::LengthInvalid)?;

        Ok(Self {
            dest,
            source,
            reprogram,
            additional,
        })
    }

    fn word_addr(&self, index: usize) -> u32 {
        self.dest + (index * WORD_SIZE) as u32
    }

    fn run<H: FlashHardware + ?Sized>(
        &mut self,
        profile: &ChipProfile,
        hw: &mut H,
        set: RegisterSet,
    ) -> Result<Outcome> {
        let t = profile.timings();

        for attempt in 1..=profile.max_write_attempts() {
            let additional = profile.wants_additional_pass(attempt);

            program_pulse(
                profile,
                hw,
                set,
                self.dest,
                &self.reprogram,
                profile.program_pulse(attempt),
            );
            let mismatch = self.verify(profile, hw, set, additional)?;
            if additional {
                program_pulse(
                    profile,
                    hw,
                    set,
                    self.dest,
                    &self.additional,
                    t.program_pulse_additional,
                );
            }

            if !mismatch {
                log::trace!(
                    "Chunk 0x{:08X} programmed after {} attempt(s)",
                    self.dest,
                    attempt
                );
                return Ok(Outcome::Completed { attempts: attempt });
            }
        }

        log::warn!(
            "Chunk 0x{:08X} still mismatched after {} program attempts",
            self.dest,
            profile.max_write_attempts()
        );
        Err(Error::MaxRetriesExceeded)
    }

    /// Program-verify pass, recomputing the reprogram (and additional) data
    ///
    /// Returns whether any word differs from the source. PV is cleared
    /// before returning, including on a hard fault.
    fn verify<H: FlashHardware + ?Sized>(
        &mut self,
        profile: &ChipProfile,
        hw: &mut H,
        set: RegisterSet,
        additional: bool,
    ) -> Result<bool> {
        let t = profile.timings();
        let mut mismatch = false;
        let mut fault = None;

        hw.set_control(set, ControlBits::PV);
        hw.wait(t.program_verify_setup);

        for i in 0..self.source.len() {
            let addr = self.word_addr(i);
            hw.write32(addr, ERASED_WORD);
            hw.wait(t.program_verify_read);
            let readback = hw.read32(addr);
            let source = self.source[i];

            if readback != source {
                mismatch = true;
            }
            if is_hard_fault(source, readback) {
                fault = Some((addr, source, readback));
                break;
            }
            if additional {
                self.additional[i] = additional_word(readback, self.reprogram[i]);
            }
            self.reprogram[i] = reprogram_word(source, readback);
        }

        hw.clear_control(set, ControlBits::PV);
        hw.wait(t.program_verify_clear);

        match fault {
            Some((addr, source, readback)) => {
                log::warn!(
                    "Program verify at 0x{:08X}: wanted 0x{:08X}, read 0x{:08X} (bits stuck at 0)",
                    addr,
                    source,
                    readback
                );
                Err(Error::VerifyHardFault)
            }
            None => Ok(mismatch),
        }
    }
}

/// Latch `words` into the flash and apply one program pulse
///
/// Interrupts stay masked from the first latch write until the pulse has
/// ended, and the deadman timer covers the whole sequence.
fn program_pulse<H: FlashHardware + ?Sized>(
    profile: &ChipProfile,
    hw: &mut H,
    set: RegisterSet,
    dest: u32,
    words: &[u32],
    pulse: Delay,
) {
    let t = profile.timings();
    let saved = hw.mask_interrupts();
    hw.arm_deadman(DeadmanClass::Write);

    // the latch only accepts byte transfers
    let mut addr = dest;
    for word in words {
        for byte in word.to_be_bytes() {
            hw.write8(addr, byte);
            addr += 1;
        }
    }

    hw.set_control(set, ControlBits::PSU);
    hw.wait(t.program_setup);
    hw.set_control(set, ControlBits::P);
    hw.wait(pulse);
    hw.clear_control(set, ControlBits::P);
    hw.wait(t.program_pulse_clear);
    hw.clear_control(set, ControlBits::PSU);
    hw.wait(t.program_setup_clear);

    hw.disarm_deadman();
    hw.restore_interrupts(saved);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{SH7051, SH7055};

    #[test]
    fn test_reprogram_word_releases_done_bits() {
        // low byte wanted 0x00: bits 0..4 programmed, bits 4..8 not yet
        let source = 0xFFFF_FF00;
        let readback = 0xFFFF_FFF0;
        let next = reprogram_word(source, readback);
        assert_eq!(next, 0xFFFF_FF0F);
        assert!(!is_hard_fault(source, readback));
        // nothing the source wants as 1 is ever asked to clear
        assert_eq!(next & source, source);
    }

    #[test]
    fn test_reprogram_word_converges_to_all_ones() {
        let source = 0x1234_5678;
        assert_eq!(reprogram_word(source, source), ERASED_WORD);
    }

    #[test]
    fn test_additional_word() {
        // pulse asked for bits 0..4, bits 0..2 took
        let programmed = 0xFFFF_FFF0;
        let readback = 0xFFFF_FFFC;
        assert_eq!(additional_word(readback, programmed), 0xFFFF_FFFC);
        // nothing programmed, nothing to re-pulse
        assert_eq!(additional_word(readback, ERASED_WORD), ERASED_WORD);
    }

    #[test]
    fn test_hard_fault_detection() {
        assert!(!is_hard_fault(0x0000_0000, 0xFFFF_FFFF));
        assert!(!is_hard_fault(0xF0F0_F0F0, 0xF0F0_F0F0));
        assert!(is_hard_fault(0xF0F0_F0F0, 0xE0F0_F0F0));
    }

    #[test]
    fn test_check_chunk() {
        let p = ChipProfile::new(&SH7051).unwrap();
        assert_eq!(check_chunk(&p, 0x0, 32), Ok(()));
        assert_eq!(check_chunk(&p, 0x3FFE0, 32), Ok(()));
        assert_eq!(check_chunk(&p, 0x40000, 32), Err(Error::OutOfBounds));
        assert_eq!(check_chunk(&p, 0x10, 32), Err(Error::Misaligned));
        assert_eq!(check_chunk(&p, 0x20, 16), Err(Error::LengthInvalid));

        let p = ChipProfile::new(&SH7055).unwrap();
        assert_eq!(check_chunk(&p, 0x40, 128), Err(Error::Misaligned));
        assert_eq!(check_chunk(&p, 0x80, 128), Ok(()));
    }

    #[test]
    fn test_chunk_snapshot_is_big_endian() {
        let mut src = [0xFFu8; 32];
        src[..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        let chunk = ChunkProgram::new(0x100, &src).unwrap();
        assert_eq!(chunk.source.len(), 8);
        assert_eq!(chunk.source[0], 0x1234_5678);
        assert_eq!(chunk.reprogram, chunk.source);
        assert!(chunk.additional.iter().all(|&w| w == ERASED_WORD));
        assert_eq!(chunk.word_addr(7), 0x11C);
    }
}
