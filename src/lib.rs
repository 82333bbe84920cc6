//! NeuroSynth-Core: synthetic pathology for brain MRI volumes
//!
//! Injects simulated atrophy or lesions into healthy scans so a labelled
//! "ill" cohort can be generated reproducibly from a seed.
//!
//! # Modules
//! - `volume`: intensity volumes, atlases and their geometry
//! - `params`: literal/range/decay parameters and seeded resolution
//! - `random`: reseedable random source
//! - `utils`: region masks and Gaussian smoothing
//! - `transform`: atrophy and lesion transforms
//! - `settings`: JSON transform configuration
//! - `nifti_io`: NIfTI-1 read/write

pub mod error;
pub mod random;

// Data model
pub mod params;
pub mod volume;

// Algorithm modules
pub mod transform;
pub mod utils;

// Configuration
pub mod settings;

// I/O modules
pub mod nifti_io;

pub use error::{Result, SynthError};
pub use params::{Decay, OffsetRange, Param, RegionSelector, Sigma};
pub use transform::{atrophy, lesion, AtrophySettings, LesionSettings, Transform};
pub use nifti_io::Orientation;
pub use volume::{Atlas, Geometry, Volume};
