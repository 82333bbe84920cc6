//! Pathology transforms
//!
//! - `atrophy`: multiplicative attenuation of atlas regions or the whole volume
//! - `lesion`: stochastic overwrite of a voxel block
//!
//! Both take a source path, their settings and a per-subject seed, and return
//! a new volume with the source geometry. Nothing is written unless the caller
//! saves the result.

pub mod atrophy;
pub mod lesion;

use std::path::Path;

use crate::error::Result;
use crate::volume::Volume;

pub use atrophy::{apply_atrophy, atrophy, atrophy_volume, AtrophySettings, ResolvedAtrophy};
pub use lesion::{lesion, lesion_volume, LesionSettings};

/// Settings bound ahead of time, applied per subject with a path and seed
pub trait Transform {
    fn name(&self) -> &'static str;

    fn apply(&self, source: &Path, seed: u64) -> Result<Volume>;

    /// Apply and persist to `dest`
    fn apply_to(&self, source: &Path, seed: u64, dest: &Path) -> Result<Volume> {
        let volume = self.apply(source, seed)?;
        volume.save(dest)?;
        Ok(volume)
    }
}
