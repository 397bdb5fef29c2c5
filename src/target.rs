//! Opening the flash target
//!
//! The only back-end on a host is the simulated controller, optionally
//! backed by a raw ROM image file.

use crate::cli::TargetArgs;
use reflash_core::chip::{ChipProfile, ProfileDatabase};
use reflash_core::flash::FlashDriver;
use reflash_sim::{PulseModel, SimConfig, SimulatedFlash};
use std::path::PathBuf;

/// An opened, initialized and unprotected flash target
pub struct Target {
    pub driver: FlashDriver<SimulatedFlash>,
    image: Option<PathBuf>,
}

impl Target {
    /// Write the ROM contents back to the image file, if there is one
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(path) = &self.image {
            self.driver.hardware().save_image(path)?;
            log::info!("Saved image to {:?}", path);
        }
        Ok(())
    }
}

/// Look up a profile by name
pub fn find_profile(
    db: &ProfileDatabase,
    name: &str,
) -> Result<ChipProfile, Box<dyn std::error::Error>> {
    db.find(name).cloned().ok_or_else(|| {
        let known: Vec<_> = db.iter().map(|p| p.name().to_string()).collect();
        format!("Unknown chip '{}' [available: {}]", name, known.join(", ")).into()
    })
}

/// Open the simulated controller described by `args`
pub fn open_target(
    args: &TargetArgs,
    db: &ProfileDatabase,
) -> Result<Target, Box<dyn std::error::Error>> {
    let profile = find_profile(db, &args.chip)?;

    let program_pulses = if args.varied {
        PulseModel::Varied {
            max: args.program_pulses,
        }
    } else {
        PulseModel::Uniform(args.program_pulses)
    };
    let config = SimConfig {
        program_pulses,
        erase_pulses: args.erase_pulses,
        write_enable: !args.write_protected,
        fault_latched: false,
    };

    let mut sim = SimulatedFlash::new(profile.clone(), config);
    if let Some(path) = &args.image {
        if path.exists() {
            sim.load_image(path)?;
            log::info!("Loaded image from {:?}", path);
        } else {
            log::info!("{:?} not found, starting from an erased device", path);
        }
    }

    let mut driver = FlashDriver::new(profile, sim);
    driver.init()?;
    driver.unprotect();
    log::info!("Opened simulated {}", driver.profile().name());

    Ok(Target {
        driver,
        image: args.image.clone(),
    })
}
