//! Flash driver facade

use crate::chip::ChipProfile;
use crate::error::{Error, Result};
use crate::hw::FlashHardware;

use super::{erase, write, Outcome, ReflashSession};

/// Reflash back-end for one chip
///
/// Owns the profile, the session and the hardware. Every operation takes
/// `&mut self`, so a new request cannot start while one is in progress, and
/// the controller is back in its idle, write-disabled state whenever a call
/// returns.
///
/// # Example
///
/// ```ignore
/// use reflash_core::chip::{ChipProfile, SH7055};
/// use reflash_core::flash::FlashDriver;
///
/// let profile = ChipProfile::new(&SH7055)?;
/// let mut driver = FlashDriver::new(profile, hw);
/// driver.init()?;
/// driver.unprotect();
/// driver.erase_block(3)?;
/// driver.write_range(0x3000, &image[0x3000..0x4000])?;
/// ```
#[derive(Debug)]
pub struct FlashDriver<H> {
    profile: ChipProfile,
    session: ReflashSession,
    hw: H,
}

impl<H: FlashHardware> FlashDriver<H> {
    /// Create a protected driver
    pub fn new(profile: ChipProfile, hw: H) -> Self {
        Self {
            profile,
            session: ReflashSession::new(),
            hw,
        }
    }

    /// Reset the session and check the controller is usable
    ///
    /// Always leaves the driver protected, even when the check fails.
    ///
    /// # Errors
    /// * `ProtectionFault` - write-enable not asserted or fault latched
    pub fn init(&mut self) -> Result<()> {
        self.session.reset();
        let status = self.hw.status();
        if !status.is_healthy() {
            log::warn!(
                "{}: flash controller not usable (status {:?})",
                self.profile.name(),
                status
            );
            return Err(Error::ProtectionFault);
        }
        log::debug!("{}: flash driver initialized", self.profile.name());
        Ok(())
    }

    /// Allow erase and program operations until the next [`init`](Self::init)
    pub fn unprotect(&mut self) {
        log::debug!("{}: reflash enabled", self.profile.name());
        self.session.enable();
    }

    /// Erase one block
    ///
    /// Returns [`Outcome::Skipped`] without touching the hardware if the
    /// session is still protected.
    pub fn erase_block(&mut self, index: usize) -> Result<Outcome> {
        erase::erase_block(&self.profile, &mut self.session, &mut self.hw, index)
    }

    /// Program `data` at `dest`, one chunk at a time
    ///
    /// The request is validated before any hardware access and before the
    /// protection check, so a malformed request is always reported. Stops at
    /// the first chunk that fails. On success, `attempts` is the largest
    /// number of attempts any chunk needed.
    ///
    /// # Errors
    /// * `OutOfBounds` - `dest` or `dest + data.len()` beyond the ROM
    /// * `Misaligned` - `dest` not chunk-aligned
    /// * `LengthInvalid` - length not a multiple of the chunk size
    /// * anything [`write::write_chunk`] reports
    pub fn write_range(&mut self, dest: u32, data: &[u8]) -> Result<Outcome> {
        let chunk_size = self.profile.chunk_size() as usize;

        if !self.profile.contains(dest) {
            return Err(Error::OutOfBounds);
        }
        if !self.profile.is_chunk_aligned(dest) {
            return Err(Error::Misaligned);
        }
        if data.len() % chunk_size != 0 {
            return Err(Error::LengthInvalid);
        }
        if !self.profile.is_valid_range(dest, data.len()) {
            return Err(Error::OutOfBounds);
        }

        if !self.session.is_enabled() {
            log::debug!(
                "Write of {} bytes at 0x{:08X} skipped: reflash not enabled",
                data.len(),
                dest
            );
            return Ok(Outcome::Skipped);
        }

        log::debug!("Writing {} bytes at 0x{:08X}", data.len(), dest);

        let mut worst = 0;
        let mut addr = dest;
        for chunk in data.chunks_exact(chunk_size) {
            let outcome =
                write::write_chunk(&self.profile, &mut self.session, &mut self.hw, addr, chunk)?;
            if let Outcome::Completed { attempts } = outcome {
                worst = worst.max(attempts);
            }
            addr += chunk_size as u32;
        }

        Ok(Outcome::Completed { attempts: worst })
    }

    /// Read flash contents into `buf`
    ///
    /// Plain array reads; allowed whether or not the session is protected.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.profile.is_valid_range(addr, buf.len()) {
            return Err(Error::OutOfBounds);
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.hw.read8(addr + i as u32);
        }
        Ok(())
    }

    /// The chip profile
    pub fn profile(&self) -> &ChipProfile {
        &self.profile
    }

    /// The session state
    pub fn session(&self) -> &ReflashSession {
        &self.session
    }

    /// Shared access to the hardware
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Exclusive access to the hardware
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Give back the hardware
    pub fn into_hardware(self) -> H {
        self.hw
    }
}
