//! Erase command implementation

use super::progress::blocks_bar;
use crate::target::Target;
use reflash_core::flash::Outcome;

/// Erase one block, or every block
pub fn run_erase(
    target: &mut Target,
    block: Option<usize>,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = target.driver.profile().block_count();
    let blocks: Vec<usize> = match block {
        Some(index) => vec![index],
        None if all => (0..count).collect(),
        None => return Err("Either --block or --all is required".into()),
    };

    erase_blocks(target, &blocks)?;
    target.save()
}

/// Erase a list of blocks with a progress bar, stopping at the first failure
pub(crate) fn erase_blocks(
    target: &mut Target,
    blocks: &[usize],
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = blocks_bar(blocks.len() as u64)?;
    let mut worst = 0;

    for &index in blocks {
        pb.set_message(format!("EB{}", index));
        match target.driver.erase_block(index) {
            Ok(Outcome::Completed { attempts }) => worst = worst.max(attempts),
            Ok(Outcome::Skipped) => log::warn!("Erase of EB{} skipped", index),
            Err(e) => {
                pb.abandon_with_message(format!("EB{} failed", index));
                return Err(format!(
                    "Erase of EB{} failed: {} (code 0x{:02X})",
                    index,
                    e,
                    e.response_code()
                )
                .into());
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("erased");
    println!(
        "Erased {} block(s), worst case {} attempt(s)",
        blocks.len(),
        worst
    );
    Ok(())
}
