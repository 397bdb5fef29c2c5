//! Engine behaviour against the simulated controller

use reflash_core::chip::{ChipProfile, ProfileDef, SH7051, SH7055};
use reflash_core::error::{response_code, Error};
use reflash_core::flash::{erase_block, write_chunk, FlashDriver, Outcome, ReflashSession};
use reflash_core::hw::{DeadmanClass, Delay, RegisterSet, SelectRegister, Timing};

use crate::{PulseModel, SimConfig, SimError, SimulatedFlash};

fn profile(def: &ProfileDef<'_>) -> ChipProfile {
    ChipProfile::new(def).unwrap()
}

fn sim(def: &ProfileDef<'_>, config: SimConfig) -> SimulatedFlash {
    SimulatedFlash::new(profile(def), config)
}

/// Driver over a simulated device, initialized and unprotected
fn driver(def: &ProfileDef<'_>, config: SimConfig) -> FlashDriver<SimulatedFlash> {
    let mut driver = FlashDriver::new(profile(def), sim(def, config));
    driver.init().unwrap();
    driver.unprotect();
    driver
}

fn slow_bits(k: u32) -> SimConfig {
    SimConfig {
        program_pulses: PulseModel::Uniform(k),
        ..SimConfig::default()
    }
}

/// The controller saw nothing wrong during the whole run
fn assert_clean(sim: &SimulatedFlash) {
    let stats = sim.stats();
    assert!(sim.is_idle(), "controller left active");
    assert_eq!(stats.illegal_sequences, 0);
    assert_eq!(stats.multi_block_selects, 0);
    assert_eq!(stats.unmasked_pulses, 0);
    assert_eq!(stats.deadman_resets, 0);
    assert_eq!(stats.verify_reads_without_dummy, 0);
    assert!(sim.pulses().iter().all(|p| p.masked));
}

#[test]
fn test_bad_block_touches_nothing() {
    let mut d = driver(&SH7051, SimConfig::default());
    assert_eq!(d.erase_block(12), Err(Error::BadBlock));
    assert_eq!(d.erase_block(usize::MAX), Err(Error::BadBlock));
    assert_eq!(d.hardware().stats().hardware_writes(), 0);

    let mut d = driver(&SH7055, SimConfig::default());
    assert_eq!(d.erase_block(16), Err(Error::BadBlock));
    assert_eq!(d.hardware().stats().hardware_writes(), 0);
}

#[test]
fn test_bad_requests_rejected_before_access() {
    let mut d = driver(&SH7051, SimConfig::default());
    let chunk = [0u8; 32];

    assert_eq!(d.write_range(0x10, &chunk), Err(Error::Misaligned));
    assert_eq!(d.write_range(0x3FFE0, &[0u8; 64]), Err(Error::OutOfBounds));
    assert_eq!(d.write_range(0x40000, &chunk), Err(Error::OutOfBounds));
    assert_eq!(d.write_range(0x20, &[0u8; 16]), Err(Error::LengthInvalid));
    assert_eq!(d.write_range(0x20, &[0u8; 40]), Err(Error::LengthInvalid));
    assert_eq!(d.hardware().stats().hardware_writes(), 0);
    assert!(d.hardware().data().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_chunk_engine_rejects_partial_chunk() {
    let p = profile(&SH7055);
    let mut hw = SimulatedFlash::new(p.clone(), SimConfig::default());
    let mut session = ReflashSession::new();
    session.enable();

    let result = write_chunk(&p, &mut session, &mut hw, 0x80, &[0u8; 32]);
    assert_eq!(result, Err(Error::LengthInvalid));
    assert_eq!(response_code(&result), 0x8A);
    assert_eq!(hw.stats().hardware_writes(), 0);
}

#[test]
fn test_locked_session_is_a_noop() {
    let p = profile(&SH7051);
    let mut d = FlashDriver::new(p, sim(&SH7051, SimConfig::default()));
    d.init().unwrap();

    assert_eq!(d.erase_block(0), Ok(Outcome::Skipped));
    assert_eq!(d.write_range(0, &[0u8; 32]), Ok(Outcome::Skipped));
    assert_eq!(response_code(&d.write_range(0, &[0u8; 32])), 0x00);
    assert_eq!(d.hardware().stats().hardware_writes(), 0);
    assert!(d.hardware().data().iter().all(|&b| b == 0xFF));

    // validation still runs while locked
    assert_eq!(d.write_range(0, &[0u8; 31]), Err(Error::LengthInvalid));
    assert_eq!(d.write_range(0x10, &[0u8; 32]), Err(Error::Misaligned));
    assert_eq!(d.erase_block(13), Err(Error::BadBlock));
}

#[test]
fn test_init_relocks() {
    let mut d = driver(&SH7051, SimConfig::default());
    assert!(d.session().is_enabled());
    assert!(d.erase_block(0).unwrap().is_completed());

    d.init().unwrap();
    d.hardware_mut().reset_stats();
    assert!(!d.session().is_enabled());
    let outcome = d.erase_block(0).unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    assert!(!outcome.is_completed());
    assert_eq!(d.hardware().stats().hardware_writes(), 0);
    assert!(d.hardware().pulses().is_empty());
}

#[test]
fn test_erase_blank_block_first_attempt() {
    let mut d = driver(&SH7051, SimConfig::default());
    assert_eq!(d.erase_block(0), Ok(Outcome::Completed { attempts: 1 }));
    assert_eq!(d.hardware().stats().erase_pulses, 1);
    // at least one erase pulse of simulated time went by
    assert!(d.hardware().elapsed_ns() >= 5_000_000);
    assert_clean(d.hardware());
}

#[test]
fn test_erase_restores_only_selected_block() {
    let p = profile(&SH7051);
    let image = vec![0u8; p.rom_size() as usize];
    let mut d = FlashDriver::new(
        p,
        SimulatedFlash::with_data(profile(&SH7051), SimConfig::default(), &image),
    );
    d.init().unwrap();
    d.unprotect();

    // EB9, behind the second select register
    assert_eq!(d.erase_block(9), Ok(Outcome::Completed { attempts: 1 }));
    let data = d.hardware().data();
    assert!(data[0x3F400..0x3F800].iter().all(|&b| b == 0xFF));
    assert!(data[0x3F000..0x3F400].iter().all(|&b| b == 0x00));
    assert!(data[0x3F800..0x3FC00].iter().all(|&b| b == 0x00));
    assert_clean(d.hardware());
}

#[test]
fn test_erase_needing_several_pulses() {
    let config = SimConfig {
        erase_pulses: 3,
        ..SimConfig::default()
    };
    let image = vec![0x5Au8; 0x40000];
    let mut d = FlashDriver::new(
        profile(&SH7051),
        SimulatedFlash::with_data(profile(&SH7051), config, &image),
    );
    d.init().unwrap();
    d.unprotect();

    assert_eq!(d.erase_block(10), Ok(Outcome::Completed { attempts: 3 }));
    assert!(d.hardware().data()[0x3F800..0x3FC00]
        .iter()
        .all(|&b| b == 0xFF));
    assert_clean(d.hardware());
}

#[test]
fn test_erase_secondary_set_sh7055() {
    let image = vec![0u8; 0x80000];
    let mut d = FlashDriver::new(
        profile(&SH7055),
        SimulatedFlash::with_data(profile(&SH7055), SimConfig::default(), &image),
    );
    d.init().unwrap();
    d.unprotect();

    // EB9 is 0x10000..0x20000, second select register bit 1
    assert_eq!(d.erase_block(9), Ok(Outcome::Completed { attempts: 1 }));
    let data = d.hardware().data();
    assert!(data[0x10000..0x20000].iter().all(|&b| b == 0xFF));
    assert!(data[0x8000..0x10000].iter().all(|&b| b == 0x00));
    assert!(data[0x20000..0x30000].iter().all(|&b| b == 0x00));
    assert_eq!(d.hardware().block_select(SelectRegister::Second), 0);
    assert_clean(d.hardware());
}

#[test]
fn test_erase_stuck_bit_fails_verify() {
    let mut d = driver(&SH7051, SimConfig::default());
    d.hardware_mut().stick_at_zero(0x3F000, 0x80);

    assert_eq!(d.erase_block(8), Err(Error::EraseVerifyFailed));
    assert_eq!(response_code(&d.erase_block(8)), 0x85);
    assert_eq!(d.hardware().stats().erase_pulses, 2 * 61);
    assert_clean(d.hardware());
}

#[test]
fn test_write_zeros_end_to_end() {
    let mut d = driver(&SH7051, SimConfig::default());
    assert_eq!(d.erase_block(0), Ok(Outcome::Completed { attempts: 1 }));
    assert_eq!(d.write_range(0, &[0u8; 32]), Ok(Outcome::Completed { attempts: 1 }));

    let mut buf = [0xAAu8; 32];
    d.read(0, &mut buf).unwrap();
    assert_eq!(buf, [0u8; 32]);
    assert_eq!(d.hardware().data()[32], 0xFF);
    assert_clean(d.hardware());
}

#[test]
fn test_write_is_big_endian() {
    let mut d = driver(&SH7051, SimConfig::default());
    let mut chunk = [0xFFu8; 32];
    chunk[..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);

    d.write_range(0x100, &chunk).unwrap();
    assert_eq!(&d.hardware().data()[0x100..0x104], &[0x12, 0x34, 0x56, 0x78]);
    assert_clean(d.hardware());
}

#[test]
fn test_slow_cells_converge_without_repulsing() {
    let config = SimConfig {
        program_pulses: PulseModel::Varied { max: 5 },
        ..SimConfig::default()
    };
    let mut d = driver(&SH7051, config);
    let image: Vec<u8> = (0..64u32).map(|i| (i * 37 + 11) as u8).collect();

    let outcome = d.write_range(0x200, &image).unwrap();
    let Outcome::Completed { attempts } = outcome else {
        panic!("write skipped");
    };
    assert!(attempts > 1 && attempts <= 5, "attempts = {attempts}");
    assert_eq!(&d.hardware().data()[0x200..0x240], image.as_slice());

    let pulses = d.hardware().pulses();
    assert!(pulses.len() > 2);
    assert!(pulses.iter().all(|p| !p.repulses_programmed_bits()));
    assert_clean(d.hardware());
}

#[test]
fn test_uniform_slow_cells_take_k_attempts() {
    let mut d = driver(&SH7051, slow_bits(4));
    assert_eq!(
        d.write_range(0x40, &[0x0Fu8; 32]),
        Ok(Outcome::Completed { attempts: 4 })
    );
    assert_eq!(d.hardware().pulses().len(), 4);
    assert!(d.hardware().pulses().iter().all(|p| p.duration_us() == 500));
    assert_clean(d.hardware());
}

#[test]
fn test_hard_fault_stops_pulsing() {
    let mut d = driver(&SH7055, SimConfig::default());
    d.hardware_mut().stick_at_zero(0x0003, 0x01);
    let mut chunk = [0u8; 128];
    chunk[3] = 0x01;

    let result = d.write_range(0, &chunk);
    assert_eq!(result, Err(Error::VerifyHardFault));
    assert_eq!(response_code(&result), 0x8B);
    // no additional pulse either
    assert_eq!(d.hardware().pulses().len(), 1);
    assert_clean(d.hardware());
}

#[test]
fn test_stuck_at_one_exhausts_attempts() {
    let mut d = driver(&SH7051, SimConfig::default());
    d.hardware_mut().stick_at_one(0x25, 0x01);

    let result = d.write_range(0, &[0u8; 96]);
    assert_eq!(result, Err(Error::MaxRetriesExceeded));
    assert_eq!(response_code(&result), 0x8C);

    // first chunk done, second given up, third never started
    let data = d.hardware().data();
    assert!(data[0x00..0x20].iter().all(|&b| b == 0x00));
    assert_eq!(data[0x25], 0x01);
    assert!(data[0x40..0x60].iter().all(|&b| b == 0xFF));
    assert_eq!(d.hardware().pulses().len(), 1 + 400);
    assert_clean(d.hardware());
}

#[test]
fn test_protection_fault_without_write_enable() {
    let config = SimConfig {
        write_enable: false,
        ..SimConfig::default()
    };
    let mut d = FlashDriver::new(profile(&SH7051), sim(&SH7051, config));
    assert_eq!(d.init(), Err(Error::ProtectionFault));
    d.unprotect();

    assert_eq!(d.erase_block(0), Err(Error::ProtectionFault));
    let result = d.write_range(0, &[0u8; 32]);
    assert_eq!(response_code(&result), 0x80);
    assert_eq!(d.hardware().stats().hardware_writes(), 0);
    assert!(d.hardware().is_idle());
    assert_eq!(d.session().active_set(), None);
}

#[test]
fn test_protection_fault_with_latched_error() {
    let config = SimConfig {
        fault_latched: true,
        ..SimConfig::default()
    };
    let mut d = FlashDriver::new(profile(&SH7055), sim(&SH7055, config));
    assert_eq!(d.init(), Err(Error::ProtectionFault));
    d.unprotect();
    assert_eq!(d.write_range(0x80, &[0u8; 128]), Err(Error::ProtectionFault));
    assert_eq!(d.hardware().stats().hardware_writes(), 0);
}

#[test]
fn test_secondary_set_write_sh7051() {
    let mut d = driver(&SH7051, SimConfig::default());
    d.write_range(0x20000, &[0u8; 32]).unwrap();

    let pulses = d.hardware().pulses();
    assert_eq!(pulses.len(), 1);
    assert_eq!(pulses[0].set, RegisterSet::Secondary);
    assert!(d.hardware().data()[0x20000..0x20020].iter().all(|&b| b == 0));
    assert_clean(d.hardware());
    assert_eq!(d.session().active_set(), None);
}

#[test]
fn test_set_boundary_sh7055() {
    let mut d = driver(&SH7055, SimConfig::default());
    d.write_range(0x7F80, &[0u8; 256]).unwrap();

    let sets: Vec<_> = d
        .hardware()
        .pulses()
        .iter()
        .filter(|p| p.programs_anything())
        .map(|p| p.set)
        .collect();
    assert_eq!(sets.first(), Some(&RegisterSet::Primary));
    assert_eq!(sets.last(), Some(&RegisterSet::Secondary));
    assert!(d.hardware().data()[0x7F80..0x8080].iter().all(|&b| b == 0));
    assert_clean(d.hardware());
}

#[test]
fn test_additional_programming_sh7055() {
    let mut d = driver(&SH7055, SimConfig::default());
    assert_eq!(
        d.write_range(0, &[0u8; 128]),
        Ok(Outcome::Completed { attempts: 1 })
    );

    let pulses = d.hardware().pulses();
    assert_eq!(pulses.len(), 2);
    assert_eq!(pulses[0].duration_us(), 30);
    assert_eq!(pulses[1].duration_us(), 10);
    // the additional pulse goes over exactly the bits just programmed
    assert!(pulses[1].latched.iter().all(|&(_, data, _)| data == 0x00));
    assert_clean(d.hardware());
}

#[test]
fn test_pulse_lengthens_after_additional_passes() {
    let mut d = driver(&SH7055, slow_bits(8));
    assert_eq!(
        d.write_range(0x1000, &[0u8; 128]),
        Ok(Outcome::Completed { attempts: 8 })
    );

    let pulses = d.hardware().pulses();
    // six attempts with an additional pulse, then two without
    assert_eq!(pulses.len(), 14);
    let main: Vec<_> = pulses.iter().filter(|p| p.duration_us() != 10).collect();
    assert_eq!(main.len(), 8);
    assert!(main[..6].iter().all(|p| p.duration_us() == 30));
    assert!(main[6..].iter().all(|p| p.duration_us() == 200));
    assert!(main.iter().all(|p| !p.repulses_programmed_bits()));
    // nothing had verified yet, so the additional pulses asked for nothing
    assert!(pulses
        .iter()
        .filter(|p| p.duration_us() == 10)
        .all(|p| !p.programs_anything()));
    assert_clean(d.hardware());
}

#[test]
fn test_chunk_engine_directly() {
    let p = profile(&SH7051);
    let mut hw = SimulatedFlash::new(p.clone(), SimConfig::default());
    let mut session = ReflashSession::new();

    assert_eq!(
        erase_block(&p, &mut session, &mut hw, 0),
        Ok(Outcome::Skipped)
    );
    session.enable();
    assert_eq!(
        erase_block(&p, &mut session, &mut hw, 0),
        Ok(Outcome::Completed { attempts: 1 })
    );
    assert_eq!(
        write_chunk(&p, &mut session, &mut hw, 0x3FFE0, &[0x11u8; 32]),
        Ok(Outcome::Completed { attempts: 1 })
    );
    assert_eq!(session.active_set(), None);
    assert_eq!(hw.data()[0x3FFE0], 0x11);
    assert_clean(&hw);
}

#[test]
fn test_read_bounds() {
    let mut d = driver(&SH7051, SimConfig::default());
    let mut buf = [0u8; 32];
    assert_eq!(d.read(0x3FFE0, &mut buf), Ok(()));
    assert_eq!(buf, [0xFF; 32]);
    assert_eq!(d.read(0x3FFF0, &mut buf), Err(Error::OutOfBounds));
}

#[test]
fn test_sim_deadman_expires() {
    let mut hw = sim(&SH7051, SimConfig::default());
    hw.arm_deadman(DeadmanClass::Write);
    hw.wait(Delay::from_micros(10_000));
    assert_eq!(hw.stats().deadman_resets, 0);
    hw.wait(Delay::from_micros(5_000));
    assert_eq!(hw.stats().deadman_resets, 1);
    assert!(!hw.deadman_armed());
}

#[test]
fn test_sim_long_wait_saturates() {
    let mut hw = sim(&SH7055, SimConfig::default());
    hw.wait(Delay::from_micros(u32::MAX));
    // u32::MAX loops of 4 cycles at 40 MHz
    assert_eq!(hw.elapsed_ns(), u64::from(u32::MAX) * 100);
    assert_eq!(hw.stats().deadman_resets, 0);
}

#[test]
fn test_sim_rejects_pulse_without_swe() {
    use reflash_core::hw::{ControlBits, FlashRegisters};

    let mut hw = sim(&SH7051, SimConfig::default());
    hw.set_control(RegisterSet::Primary, ControlBits::PSU);
    assert_eq!(hw.stats().illegal_sequences, 1);
    assert!(!hw.status().is_healthy());
}

#[test]
fn test_image_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rom.bin");

    let mut d = driver(&SH7051, SimConfig::default());
    d.write_range(0x80, &[0x42u8; 32]).unwrap();
    d.hardware().save_image(&path).unwrap();

    let mut other = sim(&SH7051, SimConfig::default());
    other.load_image(&path).unwrap();
    assert_eq!(other.data(), d.hardware().data());

    let short = dir.path().join("short.bin");
    std::fs::write(&short, [0u8; 16]).unwrap();
    assert!(matches!(
        other.load_image(&short),
        Err(SimError::SizeMismatch {
            expected: 0x40000,
            found: 16
        })
    ));
}
