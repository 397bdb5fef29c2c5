//! Profile database for runtime loading and lookup
//!
//! This module provides the `ProfileDatabase` type for loading chip profile
//! definitions from RON files at runtime, on top of the built-in profiles.

use alloc::{string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use super::builtin::BUILTIN_PROFILES;
use super::profile::{
    BlockSelectLayout, ChipProfile, DeadmanTimeouts, PhaseTimings, ProfileDef, ProfileError,
    SweLocation,
};
use crate::hw::Calibration;

/// Error type for profile database operations
#[derive(Debug, thiserror::Error)]
pub enum ProfileDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A definition failed validation
    #[error("profile {name}: {source}")]
    Invalid {
        /// Name of the rejected profile
        name: String,
        /// Why it was rejected
        source: ProfileError,
    },
    /// A profile with the same name is already loaded
    #[error("duplicate profile {0}")]
    Duplicate(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Profile definition as written in a RON file
#[derive(Debug, Clone, serde::Deserialize)]
struct ProfileFileDef {
    name: String,
    blocks: Vec<u32>,
    chunk_size: u32,
    max_erase_attempts: u32,
    max_write_attempts: u32,
    #[serde(default)]
    additional_passes: u32,
    secondary_set_start: u32,
    block_select: BlockSelectLayout,
    swe_location: SweLocation,
    timings: PhaseTimings,
    deadman: DeadmanTimeouts,
    calibration: Calibration,
}

impl ProfileFileDef {
    fn as_def(&self) -> ProfileDef<'_> {
        ProfileDef {
            name: &self.name,
            blocks: &self.blocks,
            chunk_size: self.chunk_size,
            max_erase_attempts: self.max_erase_attempts,
            max_write_attempts: self.max_write_attempts,
            additional_passes: self.additional_passes,
            secondary_set_start: self.secondary_set_start,
            block_select: self.block_select,
            swe_location: self.swe_location,
            timings: self.timings,
            deadman: self.deadman,
            calibration: self.calibration,
        }
    }
}

/// A RON file: one or more profiles
#[derive(Debug, Clone, serde::Deserialize)]
struct ProfileFile {
    profiles: Vec<ProfileFileDef>,
}

/// Collection of chip profiles, looked up by name
#[derive(Debug, Clone, Default)]
pub struct ProfileDatabase {
    profiles: Vec<ChipProfile>,
}

impl ProfileDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database holding the built-in profiles
    pub fn with_builtins() -> Self {
        let mut db = Self::new();
        for def in BUILTIN_PROFILES {
            // built-ins are validated at compile time
            if let Ok(profile) = ChipProfile::new(def) {
                db.profiles.push(profile);
            }
        }
        db
    }

    /// Load profiles from a RON string, returning how many were added
    pub fn load_ron(&mut self, contents: &str) -> Result<usize, ProfileDbError> {
        let file: ProfileFile = ron::from_str(contents)?;
        let mut added = Vec::with_capacity(file.profiles.len());

        for def in &file.profiles {
            let profile =
                ChipProfile::new(&def.as_def()).map_err(|source| ProfileDbError::Invalid {
                    name: def.name.clone(),
                    source,
                })?;
            let duplicate = self.find(profile.name()).is_some()
                || added
                    .iter()
                    .any(|p: &ChipProfile| p.name().eq_ignore_ascii_case(profile.name()));
            if duplicate {
                return Err(ProfileDbError::Duplicate(def.name.clone()));
            }
            log::debug!("Loaded profile {}", profile.name());
            added.push(profile);
        }

        let count = added.len();
        self.profiles.extend(added);
        Ok(count)
    }

    /// Load profiles from a RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ProfileDbError> {
        let contents = fs::read_to_string(path)?;
        self.load_ron(&contents)
    }

    /// Load every `.ron` file in a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ProfileDbError> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "ron"))
            .collect();
        paths.sort();

        let mut total = 0;
        for path in paths {
            log::debug!("Loading profiles from {}", path.display());
            total += self.load_file(&path)?;
        }
        Ok(total)
    }

    /// Find a profile by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&ChipProfile> {
        self.profiles
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Number of profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Iterate over all profiles
    pub fn iter(&self) -> impl Iterator<Item = &ChipProfile> {
        self.profiles.iter()
    }
}
