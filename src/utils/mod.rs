//! Grid utilities shared by the transforms

pub mod mask;
pub mod smoothing;

pub use mask::{concat, random_region_subset, roi_mask};
pub use smoothing::gaussian_smooth_3d;
