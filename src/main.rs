//! reflash - Host-side driver for the ECU program flash engines
//!
//! Runs the erase and program engines of `reflash-core` against a simulated
//! flash controller, optionally backed by a raw ROM image. Useful for trying
//! out chip profiles, dry-running an image before it goes to a real ECU, and
//! reproducing retry and fault behaviour.
//!
//! # Architecture
//!
//! - `reflash-core` holds the profiles, the engines and the `FlashDriver`
//!   facade; it only reaches hardware through its capability traits
//! - `reflash-sim` implements those traits over an in-memory NOR array
//! - this binary parses the command line, picks a profile and drives the
//!   facade

mod cli;
mod commands;
mod target;

use clap::Parser;
use cli::{Cli, Commands};
use reflash_core::chip::ProfileDatabase;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_profile_database(cli.profile_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load profile database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} chip profiles", db.len());

    match cli.command {
        Commands::Erase {
            target: args,
            block,
            all,
        } => {
            let mut target = target::open_target(&args, &db)?;
            commands::run_erase(&mut target, block, all)
        }
        Commands::Write {
            target: args,
            input,
            addr,
            erase,
        } => {
            let mut target = target::open_target(&args, &db)?;
            commands::run_write(&mut target, &input, addr, erase)
        }
        Commands::Verify {
            target: args,
            input,
            addr,
        } => {
            let mut target = target::open_target(&args, &db)?;
            commands::run_verify(&mut target, &input, addr)
        }
        Commands::Info { chip } => {
            let profile = target::find_profile(&db, &chip)?;
            commands::print_chip_info(&profile);
            Ok(())
        }
        Commands::ListChips => {
            commands::list_chips(&db);
            Ok(())
        }
    }
}

/// Built-in profiles plus any from the specified path or default locations
fn load_profile_database(
    path: Option<&Path>,
) -> Result<ProfileDatabase, Box<dyn std::error::Error>> {
    let mut db = ProfileDatabase::with_builtins();

    if let Some(path) = path {
        // User specified a path
        if path.is_dir() {
            db.load_dir(path)?;
        } else if path.is_file() {
            db.load_file(path)?;
        } else {
            return Err(format!("Profile database path not found: {}", path.display()).into());
        }
    } else {
        let default_paths = [
            PathBuf::from("profiles"),
            PathBuf::from("/usr/share/reflash/profiles"),
        ];

        for dir in &default_paths {
            if dir.is_dir() {
                match db.load_dir(dir) {
                    Ok(count) => log::debug!("Loaded {} profiles from {}", count, dir.display()),
                    Err(e) => log::warn!("Failed to load profiles from {}: {}", dir.display(), e),
                }
            }
        }
    }

    Ok(db)
}
