//! Info command implementation

use super::list::format_size;
use reflash_core::chip::{BlockSelectLayout, ChipProfile};
use reflash_core::hw::SelectRegister;

/// Print a chip profile in detail
pub fn print_chip_info(profile: &ChipProfile) {
    let t = profile.timings();
    let cal = profile.calibration();

    println!("Chip Profile Information");
    println!("========================");
    println!();
    println!("Name:            {}", profile.name());
    println!(
        "ROM:             0x{:08X} - 0x{:08X} ({})",
        profile.rom_start(),
        profile.rom_limit(),
        format_size(profile.rom_size())
    );
    println!("Chunk size:      {} bytes", profile.chunk_size());
    println!("Erase attempts:  {}", profile.max_erase_attempts());
    println!("Write attempts:  {}", profile.max_write_attempts());
    println!("Additional:      {} pass(es)", profile.additional_passes());
    println!(
        "Program pulse:   {} us short, {} us long, {} us additional",
        t.program_pulse_short.as_micros(),
        t.program_pulse_long.as_micros(),
        t.program_pulse_additional.as_micros()
    );
    println!("Erase pulse:     {} us", t.erase_pulse.as_micros());
    println!(
        "Deadman:         {} us erase, {} us write",
        profile.deadman().erase.as_micros(),
        profile.deadman().write.as_micros()
    );
    println!(
        "CPU:             {} MHz, {} cycles per wait loop",
        cal.cpu_mhz, cal.cycles_per_loop
    );
    println!(
        "Secondary set:   from 0x{:08X}, SWE in {:?}",
        profile.secondary_set_start(),
        profile.swe_location()
    );
    match profile.block_select() {
        BlockSelectLayout::Split {
            first_register_blocks,
        } => println!(
            "Block select:    split, {} block(s) in the first register",
            first_register_blocks
        ),
        BlockSelectLayout::PerRegisterSet { blocks_per_set } => println!(
            "Block select:    per register set, {} block(s) each",
            blocks_per_set
        ),
    }

    println!();
    println!("Erase blocks:");
    for index in 0..profile.block_count() {
        let Some(range) = profile.block_range(index) else {
            continue;
        };
        let masks = profile.block_select().masks(index);
        println!(
            "  EB{:<3} 0x{:08X} - 0x{:08X} {:>8}  {:?}  select {:02X}/{:02X}",
            index,
            range.start,
            range.end - 1,
            format_size(range.end - range.start),
            profile.register_set(range.start),
            masks[SelectRegister::First.index()],
            masks[SelectRegister::Second.index()]
        );
    }
}
