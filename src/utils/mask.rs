//! Region masks built from an atlas
//!
//! Masks use the same Fortran ordering as the volumes they modulate:
//! index = x + y*nx + z*nx*ny.

use crate::error::{Result, SynthError};
use crate::params::RegionSelector;
use crate::random::RandomSource;
use crate::volume::Atlas;

/// Create a mask holding `val` wherever the atlas label is in `loc` and 1 elsewhere
///
/// No smoothing is applied here.
///
/// # Arguments
/// * `loc` - Target region label(s)
/// * `val` - Value assigned to target voxels
/// * `atlas` - Region label grid
///
/// # Returns
/// Flattened mask with the atlas dimensions
pub fn roi_mask(loc: &RegionSelector, val: f64, atlas: &Atlas) -> Result<Vec<f64>> {
    let labels = loc.labels()?;
    Ok(atlas
        .labels()
        .iter()
        .map(|label| if labels.contains(label) { val } else { 1.0 })
        .collect())
}

/// Voxelwise product of a volume and a mask of identical shape
pub fn concat(
    mri: &[f64],
    mri_dims: (usize, usize, usize),
    mask: &[f64],
    mask_dims: (usize, usize, usize),
) -> Result<Vec<f64>> {
    if mri_dims != mask_dims {
        return Err(SynthError::Shape { expected: mri_dims, found: mask_dims });
    }
    let (nx, ny, nz) = mri_dims;
    let plane = (nx * ny).max(1);
    for len in [mri.len(), mask.len()] {
        if len != nx * ny * nz {
            return Err(SynthError::Shape { expected: mri_dims, found: (nx, ny, len / plane) });
        }
    }
    Ok(mri.iter().zip(mask).map(|(a, b)| a * b).collect())
}

/// Random non-empty subset of `loc` with at most `max_count` elements
///
/// Reseeds with `seed`, shuffles a copy of `loc`, then draws the subset size
/// from `[1, max_count]`. The shuffle must come before the size draw.
pub fn random_region_subset(
    loc: &[f64],
    max_count: usize,
    seed: u64,
    rng: &mut RandomSource,
) -> Result<Vec<f64>> {
    if max_count > loc.len() {
        return Err(SynthError::Precondition(format!(
            "cannot pick up to {} regions from {}",
            max_count,
            loc.len()
        )));
    }
    if max_count == 0 {
        return Err(SynthError::Precondition("region subset size must be at least 1".into()));
    }

    rng.reseed(seed);
    let mut shuffled = loc.to_vec();
    rng.shuffle(&mut shuffled);
    let count = rng.randint_inclusive(1, max_count as i64) as usize;
    shuffled.truncate(count);
    Ok(shuffled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Geometry;

    /// 4x4x4 atlas, label = x + 1 (so each x-slab is a region)
    fn slab_atlas() -> Atlas {
        let mut labels = vec![0.0; 64];
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    labels[i + j * 4 + k * 16] = (i + 1) as f64;
                }
            }
        }
        Atlas::from_labels(labels, Geometry::identity((4, 4, 4))).unwrap()
    }

    #[test]
    fn test_roi_mask_single_region() {
        let atlas = slab_atlas();
        let mask = roi_mask(&RegionSelector::from(2), 0.25, &atlas).unwrap();
        assert_eq!(mask.len(), 64);
        for (i, &m) in mask.iter().enumerate() {
            let expected = if i % 4 == 1 { 0.25 } else { 1.0 };
            assert_eq!(m, expected, "voxel {}", i);
        }
    }

    #[test]
    fn test_roi_mask_region_list() {
        let atlas = slab_atlas();
        let mask = roi_mask(&RegionSelector::from(vec![1, 4]), 0.0, &atlas).unwrap();
        let zeros = mask.iter().filter(|&&m| m == 0.0).count();
        let ones = mask.iter().filter(|&&m| m == 1.0).count();
        assert_eq!(zeros, 32);
        assert_eq!(ones, 32);
    }

    #[test]
    fn test_roi_mask_unknown_region_is_identity() {
        let atlas = slab_atlas();
        let mask = roi_mask(&RegionSelector::from(99), 0.0, &atlas).unwrap();
        assert!(mask.iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_roi_mask_rejects_empty_list() {
        let atlas = slab_atlas();
        let result = roi_mask(&RegionSelector::List(vec![]), 0.5, &atlas);
        assert!(matches!(result, Err(SynthError::Validation(_))));
    }

    #[test]
    fn test_concat_product() {
        let out = concat(&[1.0, 2.0, 3.0, 4.0], (2, 2, 1), &[0.5, 1.0, 0.0, 2.0], (2, 2, 1)).unwrap();
        assert_eq!(out, vec![0.5, 2.0, 0.0, 8.0]);
    }

    #[test]
    fn test_concat_shape_mismatch() {
        let result = concat(&[1.0; 4], (2, 2, 1), &[1.0; 4], (4, 1, 1));
        match result {
            Err(SynthError::Shape { expected, found }) => {
                assert_eq!(expected, (2, 2, 1));
                assert_eq!(found, (4, 1, 1));
            }
            _ => panic!("expected a shape error"),
        }
    }

    #[test]
    fn test_concat_buffer_length_mismatch() {
        let result = concat(&[1.0; 4], (2, 2, 1), &[1.0; 8], (2, 2, 1));
        match result {
            Err(SynthError::Shape { expected, found }) => {
                assert_eq!(expected, (2, 2, 1));
                assert_eq!(found, (2, 2, 2));
            }
            _ => panic!("expected a shape error"),
        }
    }

    #[test]
    fn test_random_region_subset_bounds() {
        let loc = vec![3.0, 4.0, 5.0, 6.0, 7.0];
        let mut rng = RandomSource::new(0);
        for seed in 0..100 {
            let subset = random_region_subset(&loc, 3, seed, &mut rng).unwrap();
            assert!(!subset.is_empty() && subset.len() <= 3);
            assert!(subset.iter().all(|l| loc.contains(l)));
            let mut dedup = subset.clone();
            dedup.sort_by(|a, b| a.partial_cmp(b).unwrap());
            dedup.dedup();
            assert_eq!(dedup.len(), subset.len());
        }
    }

    #[test]
    fn test_random_region_subset_is_seeded() {
        let loc = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut rng = RandomSource::new(0);
        let a = random_region_subset(&loc, 6, 17, &mut rng).unwrap();
        let b = random_region_subset(&loc, 6, 17, &mut rng).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_region_subset_too_many() {
        let mut rng = RandomSource::new(0);
        let result = random_region_subset(&[1.0, 2.0], 3, 0, &mut rng);
        assert!(matches!(result, Err(SynthError::Precondition(_))));
    }
}
