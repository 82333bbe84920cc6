//! Intensity volumes and atlases
//!
//! A [`Volume`] is a flat Fortran-ordered grid (`index = x + y*nx + z*nx*ny`)
//! plus the geometry it was loaded with. Transforms never mutate a volume in
//! place; they derive a new one that shares the source geometry.

use std::path::Path;

use crate::error::{Result, SynthError};
use crate::nifti_io::{read_nifti_file, save_nifti_to_file, Orientation};

#[inline]
pub(crate) fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Spatial metadata carried verbatim from a source volume to its derivatives
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Grid dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
    /// qform/sform codes and quaternion, written back on save
    pub orientation: Orientation,
}

impl Geometry {
    /// Unit voxels, identity affine
    pub fn identity(dims: (usize, usize, usize)) -> Self {
        Self {
            dims,
            voxel_size: (1.0, 1.0, 1.0),
            affine: [
                1.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ],
            orientation: Orientation::default(),
        }
    }

    pub fn n_voxels(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }
}

#[derive(Clone, Debug)]
pub struct Volume {
    data: Vec<f64>,
    geometry: Geometry,
}

impl Volume {
    /// Load a `.nii`/`.nii.gz` file
    pub fn load(path: &Path) -> Result<Self> {
        let nifti = read_nifti_file(path)?;
        let geometry = Geometry {
            dims: nifti.dims,
            voxel_size: nifti.voxel_size,
            affine: nifti.affine,
            orientation: nifti.orientation,
        };
        Self::from_data(nifti.data, geometry)
    }

    /// Wrap an existing buffer; its length must match the geometry
    pub fn from_data(data: Vec<f64>, geometry: Geometry) -> Result<Self> {
        check_len(data.len(), &geometry)?;
        Ok(Self { data, geometry })
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.geometry.dims
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Voxel value at (x, y, z), `None` outside the grid
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        let (nx, ny, nz) = self.geometry.dims;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        Some(self.data[idx3d(x, y, z, nx, ny)])
    }

    /// Arithmetic mean over all voxels
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Zero-based midpoint index per axis, `(extent - 1) / 2` rounded down
    pub fn center_position(&self) -> (i64, i64, i64) {
        let (nx, ny, nz) = self.geometry.dims;
        let mid = |n: usize| (n as i64 - 1).div_euclid(2);
        (mid(nx), mid(ny), mid(nz))
    }

    /// Build a volume from `data` with this volume's geometry, persisting it
    /// when `path` is given
    pub fn derive_volume(&self, data: Vec<f64>, path: Option<&Path>) -> Result<Volume> {
        let derived = Volume::from_data(data, self.geometry.clone())?;
        if let Some(path) = path {
            derived.save(path)?;
        }
        Ok(derived)
    }

    /// Write as NIfTI; `.nii.gz` paths are compressed
    pub fn save(&self, path: &Path) -> Result<()> {
        let g = &self.geometry;
        save_nifti_to_file(path, &self.data, g.dims, g.voxel_size, &g.affine, &g.orientation)?;
        log::debug!("saved {:?} volume to {}", g.dims, path.display());
        Ok(())
    }
}

fn check_len(len: usize, geometry: &Geometry) -> Result<()> {
    if len != geometry.n_voxels() {
        let (nx, ny, _) = geometry.dims;
        let plane = (nx * ny).max(1);
        return Err(SynthError::Shape {
            expected: geometry.dims,
            found: (nx, ny, len / plane),
        });
    }
    Ok(())
}

/// Region label grid aligned to the subject volumes
#[derive(Clone, Debug)]
pub struct Atlas(Volume);

impl Atlas {
    pub fn load(path: &Path) -> Result<Self> {
        Volume::load(path).map(Atlas)
    }

    pub fn from_labels(labels: Vec<f64>, geometry: Geometry) -> Result<Self> {
        Volume::from_data(labels, geometry).map(Atlas)
    }

    pub fn labels(&self) -> &[f64] {
        self.0.data()
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.0.dims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(dims: (usize, usize, usize)) -> Volume {
        let geometry = Geometry::identity(dims);
        let data = (0..geometry.n_voxels()).map(|i| i as f64).collect();
        Volume::from_data(data, geometry).unwrap()
    }

    #[test]
    fn test_mean() {
        let vol = ramp((2, 2, 2));
        assert!((vol.mean() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_center_position_rounds_down() {
        assert_eq!(ramp((4, 5, 1)).center_position(), (1, 2, 0));
        assert_eq!(ramp((3, 3, 3)).center_position(), (1, 1, 1));
    }

    #[test]
    fn test_get_uses_fortran_order() {
        let vol = ramp((3, 4, 5));
        assert_eq!(vol.get(1, 0, 0), Some(1.0));
        assert_eq!(vol.get(0, 1, 0), Some(3.0));
        assert_eq!(vol.get(0, 0, 1), Some(12.0));
        assert_eq!(vol.get(3, 0, 0), None);
    }

    #[test]
    fn test_from_data_rejects_wrong_length() {
        let result = Volume::from_data(vec![0.0; 7], Geometry::identity((2, 2, 2)));
        assert!(matches!(result, Err(SynthError::Shape { .. })));
    }

    #[test]
    fn test_derive_volume_keeps_geometry_and_persists() {
        let mut geometry = Geometry::identity((2, 2, 2));
        geometry.voxel_size = (1.0, 2.0, 3.0);
        geometry.affine[3] = -12.5;
        let vol = Volume::from_data(vec![1.0; 8], geometry.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derived.nii");
        let derived = vol.derive_volume(vec![2.0; 8], Some(&path)).unwrap();
        assert_eq!(derived.geometry(), &geometry);

        let reloaded = Volume::load(&path).unwrap();
        assert_eq!(reloaded.data(), &[2.0; 8]);
        assert!((reloaded.geometry().affine[3] + 12.5).abs() < 1e-5);
        assert!((reloaded.geometry().voxel_size.2 - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_derive_volume_keeps_qform_only_geometry() {
        let mut geometry = Geometry::identity((2, 2, 2));
        geometry.voxel_size = (2.0, 2.0, 2.0);
        geometry.affine = [
            2.0, 0.0, 0.0, -90.0,
            0.0, 2.0, 0.0, -126.0,
            0.0, 0.0, 2.0, -72.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        geometry.orientation = Orientation {
            sform_code: 0,
            qform_code: 1,
            quatern: [0.0, 0.0, 0.0],
            qoffset: [-90.0, -126.0, -72.0],
            qfac: 1.0,
        };
        let vol = Volume::from_data(vec![1.0; 8], geometry.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derived.nii.gz");
        vol.derive_volume(vec![3.0; 8], Some(&path)).unwrap();

        let reloaded = Volume::load(&path).unwrap();
        assert_eq!(reloaded.geometry(), &geometry);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Volume::load(Path::new("/nonexistent/subject.nii.gz"));
        assert!(matches!(result, Err(SynthError::Load(_))));
    }
}
