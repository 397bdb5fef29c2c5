//! Chip profile type definitions

use core::fmt;
use core::ops::Range;

use crate::hw::{Calibration, DeadmanClass, Delay, RegisterSet, SelectRegister};

/// Maximum number of erase blocks a profile can describe
pub const MAX_BLOCKS: usize = 32;

/// Maximum number of block boundaries (one more than the block count)
pub const MAX_BOUNDARIES: usize = MAX_BLOCKS + 1;

/// Largest supported program chunk in bytes
pub const MAX_CHUNK_SIZE: usize = 256;

/// Maximum length of a profile name
pub const MAX_NAME_LEN: usize = 32;

/// How a block index maps onto the two block select registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockSelectLayout {
    /// One bit per block, spread over both registers: the first register
    /// holds the lowest `first_register_blocks` blocks, the second the next 8
    Split {
        /// Number of blocks selected through the first register
        first_register_blocks: u8,
    },
    /// Each register set has its own select register with one bit per block
    /// of that set
    PerRegisterSet {
        /// Number of blocks behind each register
        blocks_per_set: u8,
    },
}

impl BlockSelectLayout {
    /// Number of blocks this layout can address
    pub const fn capacity(self) -> usize {
        match self {
            Self::Split {
                first_register_blocks,
            } => first_register_blocks as usize + 8,
            Self::PerRegisterSet { blocks_per_set } => 2 * blocks_per_set as usize,
        }
    }

    /// Select register values that select exactly block `index`
    ///
    /// Indexed by [`SelectRegister::index`]. The caller must have checked
    /// `index < capacity()`.
    pub const fn masks(self, index: usize) -> [u8; 2] {
        match self {
            Self::Split {
                first_register_blocks,
            } => {
                let low = first_register_blocks as usize;
                let bitsel = 1u32 << index;
                let first_mask = (1u32 << low) - 1;
                [(bitsel & first_mask) as u8, ((bitsel >> low) & 0xFF) as u8]
            }
            Self::PerRegisterSet { blocks_per_set } => {
                let per = blocks_per_set as usize;
                let mut masks = [0u8; 2];
                masks[index / per] = 1 << (index % per);
                masks
            }
        }
    }

    /// Mask for one select register
    pub const fn mask(self, index: usize, reg: SelectRegister) -> u8 {
        self.masks(index)[reg.index()]
    }
}

/// Where the software write enable bit lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum SweLocation {
    /// Always in the primary control register
    Primary,
    /// In whichever register set governs the operation
    Selected,
}

/// Wait durations for every phase of the erase and program sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseTimings {
    /// After setting SWE
    pub swe_set: Delay,
    /// After clearing SWE
    pub swe_clear: Delay,
    /// After setting ESU
    pub erase_setup: Delay,
    /// Erase pulse length
    pub erase_pulse: Delay,
    /// After clearing E
    pub erase_pulse_clear: Delay,
    /// After clearing ESU
    pub erase_setup_clear: Delay,
    /// After setting EV
    pub erase_verify_setup: Delay,
    /// Between the dummy write and the verify read
    pub erase_verify_read: Delay,
    /// After clearing EV
    pub erase_verify_clear: Delay,
    /// After setting PSU
    pub program_setup: Delay,
    /// Program pulse for attempts covered by additional programming
    pub program_pulse_short: Delay,
    /// Program pulse for all later attempts
    pub program_pulse_long: Delay,
    /// Pulse writing the additional programming data
    pub program_pulse_additional: Delay,
    /// After clearing P
    pub program_pulse_clear: Delay,
    /// After clearing PSU
    pub program_setup_clear: Delay,
    /// After setting PV
    pub program_verify_setup: Delay,
    /// Between the dummy write and the verify read
    pub program_verify_read: Delay,
    /// After clearing PV
    pub program_verify_clear: Delay,
}

/// Deadman timer periods for each pulse class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct DeadmanTimeouts {
    /// Timeout armed around an erase pulse
    pub erase: Delay,
    /// Timeout armed around a program pulse
    pub write: Delay,
}

impl DeadmanTimeouts {
    /// Timeout for a deadman class
    pub const fn timeout(&self, class: DeadmanClass) -> Delay {
        match class {
            DeadmanClass::Erase => self.erase,
            DeadmanClass::Write => self.write,
        }
    }
}

/// Profile definition, borrowable and usable in `const` context
///
/// Turned into a [`ChipProfile`] by [`ChipProfile::new`], which validates it.
#[derive(Debug, Clone, Copy)]
pub struct ProfileDef<'a> {
    /// Profile name (e.g. "SH7055")
    pub name: &'a str,
    /// Block boundaries: N+1 strictly increasing addresses for N blocks
    pub blocks: &'a [u32],
    /// Program chunk size in bytes
    pub chunk_size: u32,
    /// Erase attempts before giving up
    pub max_erase_attempts: u32,
    /// Program attempts before giving up
    pub max_write_attempts: u32,
    /// Number of leading attempts followed by an additional programming pulse
    pub additional_passes: u32,
    /// First address governed by the secondary register set
    pub secondary_set_start: u32,
    /// Block select register layout
    pub block_select: BlockSelectLayout,
    /// Location of the software write enable bit
    pub swe_location: SweLocation,
    /// Phase wait durations
    pub timings: PhaseTimings,
    /// Deadman timer periods
    pub deadman: DeadmanTimeouts,
    /// Busy-wait calibration
    pub calibration: Calibration,
}

impl ProfileDef<'_> {
    /// Check the definition for consistency
    pub const fn validate(&self) -> Result<(), ProfileError> {
        if self.name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if self.name.len() > MAX_NAME_LEN {
            return Err(ProfileError::NameTooLong);
        }
        if self.blocks.len() < 2 {
            return Err(ProfileError::TooFewBoundaries);
        }
        if self.blocks.len() > MAX_BOUNDARIES {
            return Err(ProfileError::TooManyBlocks);
        }
        let chunk = self.chunk_size;
        if chunk < 4 || !chunk.is_power_of_two() || chunk as usize > MAX_CHUNK_SIZE {
            return Err(ProfileError::BadChunkSize { chunk_size: chunk });
        }
        let mut i = 0;
        while i < self.blocks.len() {
            if self.blocks[i] % chunk != 0 {
                return Err(ProfileError::BoundaryMisaligned { index: i });
            }
            if i > 0 && self.blocks[i] <= self.blocks[i - 1] {
                return Err(ProfileError::BoundariesNotIncreasing { index: i });
            }
            i += 1;
        }
        if self.max_erase_attempts == 0 || self.max_write_attempts == 0 {
            return Err(ProfileError::ZeroAttempts);
        }
        if self.additional_passes > self.max_write_attempts {
            return Err(ProfileError::AdditionalPassesExceedAttempts);
        }
        let mut on_block = false;
        let mut i = 0;
        while i < self.blocks.len() {
            if self.blocks[i] == self.secondary_set_start {
                on_block = true;
            }
            i += 1;
        }
        if !on_block {
            return Err(ProfileError::SetBoundaryNotOnBlock);
        }
        if self.block_select.capacity() < self.blocks.len() - 1 {
            return Err(ProfileError::BlockSelectTooSmall);
        }
        if let BlockSelectLayout::Split {
            first_register_blocks,
        } = self.block_select
        {
            if first_register_blocks > 8 {
                return Err(ProfileError::BlockSelectTooSmall);
            }
        }
        if let BlockSelectLayout::PerRegisterSet { blocks_per_set } = self.block_select {
            if blocks_per_set == 0 || blocks_per_set > 8 {
                return Err(ProfileError::BlockSelectTooSmall);
            }
            // each set's blocks sit behind that set's own select register
            let per = blocks_per_set as usize;
            let split = if self.blocks.len() - 1 > per {
                self.blocks[per]
            } else {
                self.blocks[self.blocks.len() - 1]
            };
            if self.secondary_set_start != split {
                return Err(ProfileError::SetBoundaryMismatchesSelect);
            }
        }
        if self.calibration.cpu_mhz == 0 || self.calibration.cycles_per_loop == 0 {
            return Err(ProfileError::BadCalibration);
        }
        let t = &self.timings;
        if t.erase_pulse.as_micros() >= self.deadman.erase.as_micros()
            || t.program_pulse_long.as_micros() >= self.deadman.write.as_micros()
            || t.program_pulse_short.as_micros() >= self.deadman.write.as_micros()
        {
            return Err(ProfileError::PulseOutlivesDeadman);
        }
        Ok(())
    }
}

/// Reasons a profile definition is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    /// Name is empty
    EmptyName,
    /// Name longer than [`MAX_NAME_LEN`]
    NameTooLong,
    /// Fewer than two block boundaries
    TooFewBoundaries,
    /// More than [`MAX_BLOCKS`] blocks
    TooManyBlocks,
    /// Boundary `index` is not above the previous one
    BoundariesNotIncreasing {
        /// Offending boundary
        index: usize,
    },
    /// Boundary `index` is not chunk-aligned
    BoundaryMisaligned {
        /// Offending boundary
        index: usize,
    },
    /// Chunk size not a power of two in 4..=[`MAX_CHUNK_SIZE`]
    BadChunkSize {
        /// Rejected chunk size
        chunk_size: u32,
    },
    /// An attempt bound is zero
    ZeroAttempts,
    /// More additional programming passes than write attempts
    AdditionalPassesExceedAttempts,
    /// Register set boundary is not one of the block boundaries
    SetBoundaryNotOnBlock,
    /// Register set boundary does not match the per-set select registers
    SetBoundaryMismatchesSelect,
    /// Block select registers cannot address every block
    BlockSelectTooSmall,
    /// Zero clock or zero cycles per loop
    BadCalibration,
    /// A pulse is as long as or longer than its deadman timeout
    PulseOutlivesDeadman,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "profile name is empty"),
            Self::NameTooLong => write!(f, "profile name longer than {} bytes", MAX_NAME_LEN),
            Self::TooFewBoundaries => write!(f, "block map needs at least two boundaries"),
            Self::TooManyBlocks => write!(f, "block map has more than {} blocks", MAX_BLOCKS),
            Self::BoundariesNotIncreasing { index } => {
                write!(f, "block boundary {} is not above the previous one", index)
            }
            Self::BoundaryMisaligned { index } => {
                write!(f, "block boundary {} is not chunk-aligned", index)
            }
            Self::BadChunkSize { chunk_size } => {
                write!(f, "invalid chunk size {}", chunk_size)
            }
            Self::ZeroAttempts => write!(f, "attempt bounds must be at least 1"),
            Self::AdditionalPassesExceedAttempts => {
                write!(f, "more additional programming passes than write attempts")
            }
            Self::SetBoundaryNotOnBlock => {
                write!(f, "register set boundary is not a block boundary")
            }
            Self::SetBoundaryMismatchesSelect => {
                write!(f, "register set boundary does not match the block select split")
            }
            Self::BlockSelectTooSmall => {
                write!(f, "block select layout cannot address every block")
            }
            Self::BadCalibration => write!(f, "invalid busy-wait calibration"),
            Self::PulseOutlivesDeadman => {
                write!(f, "pulse duration exceeds its deadman timeout")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProfileError {}

/// Validated, immutable description of one flash controller variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipProfile {
    name: heapless::String<MAX_NAME_LEN>,
    blocks: heapless::Vec<u32, MAX_BOUNDARIES>,
    chunk_size: u32,
    max_erase_attempts: u32,
    max_write_attempts: u32,
    additional_passes: u32,
    secondary_set_start: u32,
    block_select: BlockSelectLayout,
    swe_location: SweLocation,
    timings: PhaseTimings,
    deadman: DeadmanTimeouts,
    calibration: Calibration,
}

impl ChipProfile {
    /// Validate a definition and build a profile from it
    pub fn new(def: &ProfileDef<'_>) -> Result<Self, ProfileError> {
        def.validate()?;

        let mut name = heapless::String::new();
        name.push_str(def.name).map_err(|_| ProfileError::NameTooLong)?;
        let blocks =
            heapless::Vec::from_slice(def.blocks).map_err(|_| ProfileError::TooManyBlocks)?;

        Ok(Self {
            name,
            blocks,
            chunk_size: def.chunk_size,
            max_erase_attempts: def.max_erase_attempts,
            max_write_attempts: def.max_write_attempts,
            additional_passes: def.additional_passes,
            secondary_set_start: def.secondary_set_start,
            block_select: def.block_select,
            swe_location: def.swe_location,
            timings: def.timings,
            deadman: def.deadman,
            calibration: def.calibration,
        })
    }

    /// Profile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of erase blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len() - 1
    }

    /// Address range `[start, end)` of block `index`
    pub fn block_range(&self, index: usize) -> Option<Range<u32>> {
        if index >= self.block_count() {
            return None;
        }
        Some(self.blocks[index]..self.blocks[index + 1])
    }

    /// Index of the block containing `addr`
    pub fn block_containing(&self, addr: u32) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        // boundaries are sorted; the block is the last boundary <= addr
        Some(self.blocks.partition_point(|&b| b <= addr) - 1)
    }

    /// Indices of every block overlapping `[addr, addr + len)`
    pub fn blocks_in_range(&self, addr: u32, len: u32) -> Option<Range<usize>> {
        if len == 0 || !self.is_valid_range(addr, len as usize) {
            return None;
        }
        let first = self.block_containing(addr)?;
        let last = self.block_containing(addr + (len - 1))?;
        Some(first..last + 1)
    }

    /// First address of the ROM
    pub fn rom_start(&self) -> u32 {
        self.blocks[0]
    }

    /// ROM size in bytes
    pub fn rom_size(&self) -> u32 {
        self.rom_end() - self.rom_start()
    }

    /// One past the last ROM address
    pub fn rom_end(&self) -> u32 {
        self.blocks[self.blocks.len() - 1]
    }

    /// Last valid ROM address
    pub fn rom_limit(&self) -> u32 {
        self.rom_end() - 1
    }

    /// Check if an address is inside the ROM
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.rom_start() && addr < self.rom_end()
    }

    /// Check if an address range is inside the ROM
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        if !self.contains(addr) {
            return false;
        }
        // u64 so a huge len cannot wrap
        let end = addr as u64 + len as u64;
        end <= self.rom_end() as u64
    }

    /// Register set governing `addr`
    pub fn register_set(&self, addr: u32) -> RegisterSet {
        if addr >= self.secondary_set_start {
            RegisterSet::Secondary
        } else {
            RegisterSet::Primary
        }
    }

    /// Register set holding the SWE bit while `active` is selected
    pub fn swe_register_set(&self, active: RegisterSet) -> RegisterSet {
        match self.swe_location {
            SweLocation::Primary => RegisterSet::Primary,
            SweLocation::Selected => active,
        }
    }

    /// Program chunk size in bytes
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Check chunk alignment
    pub fn is_chunk_aligned(&self, value: u32) -> bool {
        value & (self.chunk_size - 1) == 0
    }

    /// Erase attempt bound
    pub fn max_erase_attempts(&self) -> u32 {
        self.max_erase_attempts
    }

    /// Program attempt bound
    pub fn max_write_attempts(&self) -> u32 {
        self.max_write_attempts
    }

    /// Number of attempts followed by an additional programming pulse
    pub fn additional_passes(&self) -> u32 {
        self.additional_passes
    }

    /// Whether `attempt` (1-based) gets an additional programming pulse
    pub fn wants_additional_pass(&self, attempt: u32) -> bool {
        attempt <= self.additional_passes
    }

    /// Program pulse length for `attempt` (1-based)
    pub fn program_pulse(&self, attempt: u32) -> Delay {
        if self.wants_additional_pass(attempt) {
            self.timings.program_pulse_short
        } else {
            self.timings.program_pulse_long
        }
    }

    /// First address governed by the secondary register set
    pub fn secondary_set_start(&self) -> u32 {
        self.secondary_set_start
    }

    /// Block select register layout
    pub fn block_select(&self) -> BlockSelectLayout {
        self.block_select
    }

    /// Location of the SWE bit
    pub fn swe_location(&self) -> SweLocation {
        self.swe_location
    }

    /// Phase wait durations
    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Deadman timer periods
    pub fn deadman(&self) -> &DeadmanTimeouts {
        &self.deadman
    }

    /// Busy-wait calibration
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }
}
