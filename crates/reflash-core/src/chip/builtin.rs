//! Built-in profiles for the two supported flash controller generations

use super::profile::{
    BlockSelectLayout, DeadmanTimeouts, PhaseTimings, ProfileDef, SweLocation,
};
use crate::hw::{Calibration, Delay};

const fn us(micros: u32) -> Delay {
    Delay::from_micros(micros)
}

/// SH7051 block boundaries (EB0..EB11)
pub const SH7051_BLOCKS: [u32; 13] = [
    0x0000_0000,
    0x0000_8000,
    0x0001_0000,
    0x0001_8000,
    0x0002_0000,
    0x0002_8000,
    0x0003_0000,
    0x0003_8000,
    0x0003_F000,
    0x0003_F400,
    0x0003_F800,
    0x0003_FC00,
    0x0004_0000,
];

/// SH7055 (0.35um) block boundaries (EB0..EB15)
pub const SH7055_BLOCKS: [u32; 17] = [
    0x0000_0000,
    0x0000_1000,
    0x0000_2000,
    0x0000_3000,
    0x0000_4000,
    0x0000_5000,
    0x0000_6000,
    0x0000_7000,
    0x0000_8000,
    0x0001_0000,
    0x0002_0000,
    0x0003_0000,
    0x0004_0000,
    0x0005_0000,
    0x0006_0000,
    0x0007_0000,
    0x0008_0000,
];

/// SH7051: 256 KiB, 32-byte chunks, 20 MHz
///
/// Program setup and verify waits follow the F-ZTAT values, which are longer
/// than the datasheet minimums. There is no additional programming pass, so
/// every attempt uses the long pulse.
pub const SH7051: ProfileDef<'static> = ProfileDef {
    name: "SH7051",
    blocks: &SH7051_BLOCKS,
    chunk_size: 32,
    max_erase_attempts: 61,
    max_write_attempts: 400,
    additional_passes: 0,
    secondary_set_start: 0x0002_0000,
    block_select: BlockSelectLayout::Split {
        first_register_blocks: 4,
    },
    swe_location: SweLocation::Primary,
    timings: PhaseTimings {
        swe_set: us(10),
        swe_clear: us(100),
        erase_setup: us(200),
        erase_pulse: us(5_000),
        erase_pulse_clear: us(10),
        erase_setup_clear: us(10),
        erase_verify_setup: us(10),
        erase_verify_read: us(2),
        erase_verify_clear: us(5),
        program_setup: us(300),
        program_pulse_short: us(500),
        program_pulse_long: us(500),
        program_pulse_additional: us(10),
        program_pulse_clear: us(10),
        program_setup_clear: us(10),
        program_verify_setup: us(10),
        program_verify_read: us(5),
        program_verify_clear: us(5),
    },
    // 1:4096 and 1:1024 watchdog dividers at 20 MHz
    deadman: DeadmanTimeouts {
        erase: us(52_400),
        write: us(13_100),
    },
    calibration: Calibration {
        cpu_mhz: 20,
        cycles_per_loop: 4,
    },
};

/// SH7055 (0.35um): 512 KiB, 128-byte chunks, 40 MHz
pub const SH7055: ProfileDef<'static> = ProfileDef {
    name: "SH7055",
    blocks: &SH7055_BLOCKS,
    chunk_size: 128,
    max_erase_attempts: 100,
    max_write_attempts: 1000,
    additional_passes: 6,
    secondary_set_start: 0x0000_8000,
    block_select: BlockSelectLayout::PerRegisterSet { blocks_per_set: 8 },
    swe_location: SweLocation::Selected,
    timings: PhaseTimings {
        swe_set: us(1),
        swe_clear: us(100),
        erase_setup: us(100),
        erase_pulse: us(10_000),
        erase_pulse_clear: us(10),
        erase_setup_clear: us(10),
        erase_verify_setup: us(6),
        erase_verify_read: us(2),
        erase_verify_clear: us(4),
        program_setup: us(50),
        program_pulse_short: us(30),
        program_pulse_long: us(200),
        program_pulse_additional: us(10),
        program_pulse_clear: us(5),
        program_setup_clear: us(5),
        program_verify_setup: us(4),
        program_verify_read: us(2),
        program_verify_clear: us(2),
    },
    // 1:4096 and 1:1024 watchdog dividers at 40 MHz
    deadman: DeadmanTimeouts {
        erase: us(26_200),
        write: us(6_600),
    },
    calibration: Calibration {
        cpu_mhz: 40,
        cycles_per_loop: 4,
    },
};

const _: () = assert!(SH7051.validate().is_ok());
const _: () = assert!(SH7055.validate().is_ok());

/// All built-in profile definitions
pub const BUILTIN_PROFILES: &[&ProfileDef<'static>] = &[&SH7051, &SH7055];

/// Look up a built-in profile definition by name (case-insensitive)
pub fn find_builtin(name: &str) -> Option<&'static ProfileDef<'static>> {
    BUILTIN_PROFILES
        .iter()
        .copied()
        .find(|def| def.name.eq_ignore_ascii_case(name))
}
