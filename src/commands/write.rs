//! Write command implementation

use super::erase::erase_blocks;
use super::progress::bytes_bar;
use crate::target::Target;
use reflash_core::flash::Outcome;
use std::path::Path;

/// Program a file at `addr`, optionally erasing the covered blocks first
///
/// The file must be a whole number of program chunks; the chunks are written
/// in order and the first failure stops the write.
pub fn run_write(
    target: &mut Target,
    input: &Path,
    addr: u32,
    erase: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let profile = target.driver.profile().clone();
    let chunk_size = profile.chunk_size() as usize;
    if data.is_empty() {
        return Err("Input file is empty".into());
    }
    if data.len() % chunk_size != 0 {
        return Err(format!(
            "Input is {} bytes, not a multiple of the {} byte program chunk",
            data.len(),
            chunk_size
        )
        .into());
    }

    if erase {
        let blocks = profile
            .blocks_in_range(addr, data.len() as u32)
            .ok_or_else(|| {
                format!(
                    "0x{:08X} + {} bytes is outside the ROM of {}",
                    addr,
                    data.len(),
                    profile.name()
                )
            })?;
        let blocks: Vec<usize> = blocks.collect();
        log::info!("Erasing blocks {:?} before writing", blocks);
        erase_blocks(target, &blocks)?;
    }

    let pb = bytes_bar(data.len() as u64, "Writing")?;
    let mut worst = 0;
    let mut dest = addr;

    for chunk in data.chunks(chunk_size) {
        match target.driver.write_range(dest, chunk) {
            Ok(Outcome::Completed { attempts }) => worst = worst.max(attempts),
            Ok(Outcome::Skipped) => log::warn!("Write at 0x{:08X} skipped", dest),
            Err(e) => {
                pb.abandon_with_message("failed");
                return Err(format!(
                    "Write at 0x{:08X} failed: {} (code 0x{:02X})",
                    dest,
                    e,
                    e.response_code()
                )
                .into());
            }
        }
        pb.inc(chunk.len() as u64);
        dest += chunk.len() as u32;
    }

    pb.finish_with_message("Write complete");
    println!(
        "Wrote {} bytes at 0x{:08X}, worst chunk took {} attempt(s)",
        data.len(),
        addr,
        worst
    );
    target.save()
}
