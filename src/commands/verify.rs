//! Verify command implementation

use super::progress::bytes_bar;
use crate::target::Target;
use std::path::Path;

const READ_CHUNK_SIZE: usize = 4096;

/// Compare flash contents at `addr` against a file
pub fn run_verify(
    target: &mut Target,
    input: &Path,
    addr: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = std::fs::read(input)?;
    println!("Read {} bytes from {:?}", expected.len(), input);

    let pb = bytes_bar(expected.len() as u64, "Verifying")?;
    let mut actual = vec![0u8; READ_CHUNK_SIZE];
    let mut offset = 0usize;

    for want in expected.chunks(READ_CHUNK_SIZE) {
        let got = &mut actual[..want.len()];
        target.driver.read(addr + offset as u32, got)?;

        if let Some(i) = want.iter().zip(got.iter()).position(|(a, b)| a != b) {
            pb.abandon_with_message("mismatch");
            let at = addr + (offset + i) as u32;
            return Err(format!(
                "Verification failed at 0x{:08X}: expected 0x{:02X}, found 0x{:02X}",
                at, want[i], got[i]
            )
            .into());
        }

        offset += want.len();
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("Verify complete");
    println!("Verification passed");
    Ok(())
}
