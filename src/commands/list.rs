//! List command implementation

use reflash_core::chip::ProfileDatabase;

/// List all known chip profiles
pub fn list_chips(db: &ProfileDatabase) {
    println!("Known chip profiles:");
    println!();
    println!(
        "{:<12} {:>10} {:>7} {:>6} {:>14}",
        "Name", "Size", "Blocks", "Chunk", "Attempts (E/W)"
    );
    println!("{}", "-".repeat(53));

    for profile in db.iter() {
        println!(
            "{:<12} {:>10} {:>7} {:>6} {:>14}",
            profile.name(),
            format_size(profile.rom_size()),
            profile.block_count(),
            profile.chunk_size(),
            format!(
                "{}/{}",
                profile.max_erase_attempts(),
                profile.max_write_attempts()
            )
        );
    }
}

pub(crate) fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
