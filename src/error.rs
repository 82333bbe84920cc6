//! Error type shared by every transform stage

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    /// Malformed region selector or parameter of the wrong kind
    #[error("validation failed: {0}")]
    Validation(String),

    /// Two grids that must line up voxel for voxel do not
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    Shape {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    /// A decay value outside its bounds, or a subset larger than its source
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("failed to load volume: {0}")]
    Load(String),

    #[error("failed to save volume: {0}")]
    Save(String),

    /// Lesion anchor or block reaching outside the volume
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
}

pub type Result<T> = std::result::Result<T, SynthError>;
