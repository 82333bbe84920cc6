//! Common test utilities for neurosynth-core integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use neurosynth_core::nifti_io::save_nifti_to_file;
use neurosynth_core::{Geometry, Orientation};

pub const DIMS: (usize, usize, usize) = (12, 10, 8);

pub fn idx(i: usize, j: usize, k: usize) -> usize {
    i + j * DIMS.0 + k * DIMS.0 * DIMS.1
}

/// Geometry with anisotropic voxels and a shifted origin, so a lost header shows
pub fn subject_geometry() -> Geometry {
    Geometry {
        dims: DIMS,
        voxel_size: (1.0, 1.5, 2.0),
        affine: [
            1.0, 0.0, 0.0, -6.0,
            0.0, 1.5, 0.0, -7.5,
            0.0, 0.0, 2.0, -8.0,
            0.0, 0.0, 0.0, 1.0,
        ],
        orientation: Orientation::default(),
    }
}

/// Same grid and world mapping, carried only by the qform
pub fn qform_only_geometry() -> Geometry {
    Geometry {
        orientation: Orientation {
            sform_code: 0,
            qform_code: 1,
            quatern: [0.0, 0.0, 0.0],
            qoffset: [-6.0, -7.5, -8.0],
            qfac: 1.0,
        },
        ..subject_geometry()
    }
}

/// Smooth positive intensities, exactly representable as f32
pub fn subject_data() -> Vec<f64> {
    let (nx, ny, nz) = DIMS;
    let mut data = vec![0.0; nx * ny * nz];
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                data[idx(i, j, k)] = 10.0 + i as f64 + 0.5 * j as f64 + 0.25 * k as f64;
            }
        }
    }
    data
}

/// Atlas with three regions: 1 for x < 4, 2 for 4 <= x < 8, 3 elsewhere
pub fn atlas_labels() -> Vec<f64> {
    let (nx, ny, nz) = DIMS;
    let mut labels = vec![0.0; nx * ny * nz];
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                labels[idx(i, j, k)] = match i {
                    0..=3 => 1.0,
                    4..=7 => 2.0,
                    _ => 3.0,
                };
            }
        }
    }
    labels
}

pub fn write_volume(path: &Path, data: &[f64]) -> PathBuf {
    write_volume_with(path, data, &subject_geometry())
}

pub fn write_volume_with(path: &Path, data: &[f64], g: &Geometry) -> PathBuf {
    save_nifti_to_file(path, data, g.dims, g.voxel_size, &g.affine, &g.orientation).unwrap();
    path.to_path_buf()
}

/// Subject and atlas written into `dir`
pub fn fixture(dir: &Path) -> (PathBuf, PathBuf) {
    let subject = write_volume(&dir.join("sub-001.nii.gz"), &subject_data());
    let atlas = write_volume(&dir.join("atlas.nii"), &atlas_labels());
    (subject, atlas)
}
