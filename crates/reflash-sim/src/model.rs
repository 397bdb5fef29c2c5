//! Register-level model of the flash controller

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use reflash_core::chip::ChipProfile;
use reflash_core::hw::{
    ControlBits, DeadmanClass, Delay, FlashRegisters, FlashStatus, InterruptMask, RegisterSet,
    SelectRegister, Timing,
};

use crate::SimError;

/// How many program pulses a cell needs before it reads 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseModel {
    /// Every bit needs the same number of pulses
    Uniform(u32),
    /// Each bit needs between 1 and `max` pulses, fixed per bit position
    Varied {
        /// Slowest bit
        max: u32,
    },
}

impl PulseModel {
    fn pulses_for(self, bit: u64) -> u32 {
        match self {
            Self::Uniform(k) => k.max(1),
            Self::Varied { max } => {
                // multiplicative hash, so neighbouring bits differ
                let h = bit.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32;
                1 + (h % u64::from(max.max(1))) as u32
            }
        }
    }
}

/// Configuration for the simulated controller
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Program pulses a bit needs
    pub program_pulses: PulseModel,
    /// Erase pulses a block needs
    pub erase_pulses: u32,
    /// State of the flash write enable pin
    pub write_enable: bool,
    /// Flash error latch at power-up
    pub fault_latched: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            program_pulses: PulseModel::Uniform(1),
            erase_pulses: 1,
            write_enable: true,
            fault_latched: false,
        }
    }
}

/// One program pulse as seen by the array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseRecord {
    /// Register set the pulse was issued on
    pub set: RegisterSet,
    /// Time between setting and clearing P
    pub duration_ns: u64,
    /// Interrupts were masked for the whole pulse
    pub masked: bool,
    /// Latched bytes: address, latched value, cell content before the pulse
    pub latched: Vec<(u32, u8, u8)>,
}

impl PulseRecord {
    /// Pulse length rounded down to whole microseconds
    pub fn duration_us(&self) -> u64 {
        self.duration_ns / 1000
    }

    /// True if the pulse asked for a bit that already read 0
    pub fn repulses_programmed_bits(&self) -> bool {
        self.latched
            .iter()
            .any(|&(_, data, before)| !data & !before != 0)
    }

    /// True if the pulse asked for at least one bit
    pub fn programs_anything(&self) -> bool {
        self.latched.iter().any(|&(_, data, _)| data != 0xFF)
    }
}

/// Counters kept by the simulated controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Control and block select register writes
    pub register_writes: u64,
    /// Writes to the flash array (latch and verify dummy writes)
    pub array_writes: u64,
    /// Completed erase pulses
    pub erase_pulses: u64,
    /// Times more than one block was selected at once
    pub multi_block_selects: u64,
    /// Pulses started with interrupts unmasked
    pub unmasked_pulses: u64,
    /// Deadman timer expiries
    pub deadman_resets: u64,
    /// Control sequences the controller rejected
    pub illegal_sequences: u64,
    /// Verify-mode reads not preceded by a dummy write to the same word
    pub verify_reads_without_dummy: u64,
}

impl SimStats {
    /// Every write that reached the controller
    pub fn hardware_writes(&self) -> u64 {
        self.register_writes + self.array_writes
    }
}

/// Simulated flash controller
///
/// Holds the ROM contents plus the register file of the profile's controller,
/// and a clock advanced by [`Timing::wait`] according to the profile's
/// calibration.
pub struct SimulatedFlash {
    profile: ChipProfile,
    config: SimConfig,
    data: Vec<u8>,
    fault: bool,
    control: [ControlBits; 2],
    select: [u8; 2],
    latch: BTreeMap<u32, u8>,
    dummy_write: Option<u32>,
    /// Pulses received by bits that have not flipped yet, by bit index
    program_credit: HashMap<u64, u32>,
    erase_credit: Vec<u32>,
    stuck_zero: HashMap<u32, u8>,
    stuck_one: HashMap<u32, u8>,
    clock_ns: u64,
    pulse_start: [Option<(u64, bool)>; 2],
    deadman: Option<(DeadmanClass, u64)>,
    irq_masked: bool,
    pulses: Vec<PulseRecord>,
    stats: SimStats,
}

impl SimulatedFlash {
    /// Create an erased device
    pub fn new(profile: ChipProfile, config: SimConfig) -> Self {
        let size = profile.rom_size() as usize;
        let blocks = profile.block_count();
        let fault = config.fault_latched;
        Self {
            profile,
            config,
            data: vec![0xFF; size],
            fault,
            control: [ControlBits::empty(); 2],
            select: [0; 2],
            latch: BTreeMap::new(),
            dummy_write: None,
            program_credit: HashMap::new(),
            erase_credit: vec![0; blocks],
            stuck_zero: HashMap::new(),
            stuck_one: HashMap::new(),
            clock_ns: 0,
            pulse_start: [None; 2],
            deadman: None,
            irq_masked: false,
            pulses: Vec::new(),
            stats: SimStats::default(),
        }
    }

    /// Create a device pre-filled with `image`, starting at the ROM base
    pub fn with_data(profile: ChipProfile, config: SimConfig, image: &[u8]) -> Self {
        let mut flash = Self::new(profile, config);
        let len = image.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&image[..len]);
        flash
    }

    /// Load the ROM contents from a raw image file of exactly ROM size
    pub fn load_image(&mut self, path: &Path) -> Result<(), SimError> {
        let image = fs::read(path)?;
        if image.len() != self.data.len() {
            return Err(SimError::SizeMismatch {
                expected: self.data.len(),
                found: image.len(),
            });
        }
        self.data = image;
        self.apply_stuck_bits();
        log::debug!("Loaded {} byte image from {}", self.data.len(), path.display());
        Ok(())
    }

    /// Save the ROM contents to a raw image file
    pub fn save_image(&self, path: &Path) -> Result<(), SimError> {
        fs::write(path, &self.data)?;
        log::debug!("Saved {} byte image to {}", self.data.len(), path.display());
        Ok(())
    }

    /// Make the bits of `mask` at `addr` read 0 whatever happens
    pub fn stick_at_zero(&mut self, addr: u32, mask: u8) {
        if let Some(offset) = self.offset(addr) {
            *self.stuck_zero.entry(addr).or_default() |= mask;
            self.data[offset] &= !mask;
        }
    }

    /// Make the bits of `mask` at `addr` ignore program pulses
    pub fn stick_at_one(&mut self, addr: u32, mask: u8) {
        if self.offset(addr).is_some() {
            *self.stuck_one.entry(addr).or_default() |= mask;
        }
    }

    /// ROM contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Counters
    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Every program pulse so far, in order
    pub fn pulses(&self) -> &[PulseRecord] {
        &self.pulses
    }

    /// Simulated time since creation
    pub fn elapsed_ns(&self) -> u64 {
        self.clock_ns
    }

    /// Block select register contents
    pub fn block_select(&self, reg: SelectRegister) -> u8 {
        self.select[reg.index()]
    }

    /// True if the deadman timer is running
    pub fn deadman_armed(&self) -> bool {
        self.deadman.is_some()
    }

    /// Write-disabled and quiet: no control bit set, no block selected, no
    /// deadman running, interrupts unmasked
    pub fn is_idle(&self) -> bool {
        self.control.iter().all(|c| c.is_empty())
            && self.select.iter().all(|&s| s == 0)
            && self.deadman.is_none()
            && !self.irq_masked
    }

    /// Clear the counters and the pulse log
    pub fn reset_stats(&mut self) {
        self.stats = SimStats::default();
        self.pulses.clear();
    }

    fn offset(&self, addr: u32) -> Option<usize> {
        if self.profile.contains(addr) {
            Some((addr - self.profile.rom_start()) as usize)
        } else {
            None
        }
    }

    fn apply_stuck_bits(&mut self) {
        for (&addr, &mask) in &self.stuck_zero {
            if let Some(offset) = self.offset(addr) {
                self.data[offset] &= !mask;
            }
        }
    }

    fn write_enabled(&self, set: RegisterSet) -> bool {
        self.control[self.profile.swe_register_set(set).index()].contains(ControlBits::SWE)
    }

    /// Array writes outside write mode are ignored, as on the real bus
    fn latch_byte(&mut self, addr: u32, value: u8) {
        if self.write_enabled(self.profile.register_set(addr)) {
            self.latch.insert(addr, value);
        }
    }

    fn in_verify_mode(&self) -> bool {
        self.control
            .iter()
            .any(|c| c.intersects(ControlBits::EV | ControlBits::PV))
    }

    fn selected_blocks(&self) -> Vec<usize> {
        let layout = self.profile.block_select();
        (0..self.profile.block_count())
            .filter(|&i| {
                let masks = layout.masks(i);
                SelectRegister::ALL
                    .iter()
                    .any(|r| masks[r.index()] & self.select[r.index()] != 0)
            })
            .collect()
    }

    fn reject(&mut self, what: &str, set: RegisterSet) {
        log::warn!("sim: illegal sequence on {:?}: {}", set, what);
        self.stats.illegal_sequences += 1;
        self.fault = true;
    }

    fn check_set(&mut self, set: RegisterSet, bits: ControlBits) {
        let current = self.control[set.index()];
        if bits.intersects(ControlBits::ACTIVE) && !self.write_enabled(set) {
            self.reject("mode bit without SWE", set);
        }
        if bits.contains(ControlBits::P) && !current.contains(ControlBits::PSU) {
            self.reject("P without PSU", set);
        }
        if bits.contains(ControlBits::E) {
            if !current.contains(ControlBits::ESU) {
                self.reject("E without ESU", set);
            }
            if self.selected_blocks().is_empty() {
                self.reject("E with no block selected", set);
            }
        }
    }

    fn end_program_pulse(&mut self, set: RegisterSet) {
        let Some((start, masked)) = self.pulse_start[set.index()].take() else {
            return;
        };
        let latch = std::mem::take(&mut self.latch);
        let mut latched = Vec::with_capacity(latch.len());

        for (addr, value) in latch {
            let Some(offset) = self.offset(addr) else {
                continue;
            };
            let before = self.data[offset];
            latched.push((addr, value, before));

            // the pulse only reaches bytes behind this register set
            if self.profile.register_set(addr) != set {
                continue;
            }
            let stuck = self.stuck_one.get(&addr).copied().unwrap_or(0);
            let wanted = !value & before & !stuck;
            for bit in 0..8 {
                if wanted & (1 << bit) == 0 {
                    continue;
                }
                let index = offset as u64 * 8 + bit;
                let credit = self.program_credit.entry(index).or_insert(0);
                *credit += 1;
                if *credit >= self.config.program_pulses.pulses_for(index) {
                    self.program_credit.remove(&index);
                    self.data[offset] &= !(1 << bit);
                }
            }
        }

        self.pulses.push(PulseRecord {
            set,
            duration_ns: self.clock_ns - start,
            masked: masked && self.irq_masked,
            latched,
        });
    }

    fn end_erase_pulse(&mut self) {
        self.stats.erase_pulses += 1;
        for index in self.selected_blocks() {
            self.erase_credit[index] += 1;
            if self.erase_credit[index] < self.config.erase_pulses {
                continue;
            }
            self.erase_credit[index] = 0;
            if let Some(range) = self.profile.block_range(index) {
                let start = (range.start - self.profile.rom_start()) as usize;
                let end = (range.end - self.profile.rom_start()) as usize;
                self.data[start..end].fill(0xFF);
                self.program_credit
                    .retain(|&bit, _| !(start as u64 * 8..end as u64 * 8).contains(&bit));
                log::trace!("sim: block {} erased", index);
            }
        }
        self.apply_stuck_bits();
    }
}

impl FlashRegisters for SimulatedFlash {
    fn status(&mut self) -> FlashStatus {
        let mut status = FlashStatus::empty();
        status.set(FlashStatus::WRITE_ENABLE, self.config.write_enable);
        status.set(FlashStatus::FAULT, self.fault);
        status
    }

    fn control(&mut self, set: RegisterSet) -> ControlBits {
        self.control[set.index()]
    }

    fn set_control(&mut self, set: RegisterSet, bits: ControlBits) {
        self.stats.register_writes += 1;
        self.check_set(set, bits);

        let current = self.control[set.index()];
        if bits.contains(ControlBits::P) && !current.contains(ControlBits::P) {
            if !self.irq_masked {
                self.stats.unmasked_pulses += 1;
            }
            self.pulse_start[set.index()] = Some((self.clock_ns, self.irq_masked));
        }
        if bits.intersects(ControlBits::EV | ControlBits::PV) {
            self.dummy_write = None;
        }
        self.control[set.index()] = current | bits;
    }

    fn clear_control(&mut self, set: RegisterSet, bits: ControlBits) {
        self.stats.register_writes += 1;

        let current = self.control[set.index()];
        if bits.contains(ControlBits::P) && current.contains(ControlBits::P) {
            self.end_program_pulse(set);
        }
        if bits.contains(ControlBits::E) && current.contains(ControlBits::E) {
            self.end_erase_pulse();
        }
        if bits.contains(ControlBits::SWE) {
            self.latch.clear();
        }
        self.control[set.index()] = current - bits;
    }

    fn write_block_select(&mut self, reg: SelectRegister, mask: u8) {
        self.stats.register_writes += 1;
        self.select[reg.index()] = mask;
        if self.selected_blocks().len() > 1 {
            self.stats.multi_block_selects += 1;
        }
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.stats.array_writes += 1;
        if !self.in_verify_mode() {
            self.latch_byte(addr, value);
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.stats.array_writes += 1;
        if self.in_verify_mode() {
            self.dummy_write = Some(addr);
            return;
        }
        for (i, byte) in value.to_be_bytes().into_iter().enumerate() {
            self.latch_byte(addr + i as u32, byte);
        }
    }

    fn read8(&mut self, addr: u32) -> u8 {
        match self.offset(addr) {
            Some(offset) => self.data[offset],
            None => 0xFF,
        }
    }

    fn read32(&mut self, addr: u32) -> u32 {
        if self.in_verify_mode() && self.dummy_write.take() != Some(addr) {
            self.stats.verify_reads_without_dummy += 1;
        }
        let bytes = [
            self.read8(addr),
            self.read8(addr + 1),
            self.read8(addr + 2),
            self.read8(addr + 3),
        ];
        u32::from_be_bytes(bytes)
    }
}

impl Timing for SimulatedFlash {
    fn wait(&mut self, delay: Delay) {
        let cal = self.profile.calibration();
        self.clock_ns += cal.loops_to_nanos(cal.loops(delay));

        if let Some((class, armed_at)) = self.deadman {
            let timeout = u64::from(self.profile.deadman().timeout(class).as_micros()) * 1000;
            if self.clock_ns - armed_at > timeout {
                log::warn!("sim: deadman timer ({:?}) expired", class);
                self.stats.deadman_resets += 1;
                self.deadman = None;
            }
        }
    }

    fn arm_deadman(&mut self, class: DeadmanClass) {
        self.deadman = Some((class, self.clock_ns));
    }

    fn disarm_deadman(&mut self) {
        self.deadman = None;
    }

    fn mask_interrupts(&mut self) -> InterruptMask {
        let saved = InterruptMask(u32::from(self.irq_masked));
        self.irq_masked = true;
        saved
    }

    fn restore_interrupts(&mut self, saved: InterruptMask) {
        self.irq_masked = saved.0 != 0;
    }
}
