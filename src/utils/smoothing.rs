//! Separable 3D Gaussian smoothing
//!
//! Kernels are truncated at 4 sigma and the volume edge is mirrored
//! (`d c b a | a b c d | d c b a`), so a constant field stays constant.

use crate::params::Sigma;
use crate::volume::idx3d;

const TRUNCATE: f64 = 4.0;

/// Normalised 1D Gaussian kernel of radius `round(4 * sigma)`
fn make_gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..2 * radius + 1)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Mirror an out-of-range index back into `[0, n)`, edge sample repeated
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

/// Convolve along one axis (0 = x, 1 = y, 2 = z)
fn convolve_axis(data: &[f64], dims: (usize, usize, usize), kernel: &[f64], axis: usize) -> Vec<f64> {
    let (nx, ny, nz) = dims;
    let radius = (kernel.len() / 2) as isize;
    let extent = [nx, ny, nz][axis];
    let mut result = vec![0.0; data.len()];

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let pos = [i, j, k][axis] as isize;
                let mut sum = 0.0;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let p = reflect(pos + ki as isize - radius, extent);
                    let src = match axis {
                        0 => idx3d(p, j, k, nx, ny),
                        1 => idx3d(i, p, k, nx, ny),
                        _ => idx3d(i, j, p, nx, ny),
                    };
                    sum += data[src] * kv;
                }
                result[idx3d(i, j, k, nx, ny)] = sum;
            }
        }
    }
    result
}

/// Gaussian-filter a flattened 3D grid; axes with sigma <= 0 are left alone
pub fn gaussian_smooth_3d(data: &[f64], dims: (usize, usize, usize), sigma: Sigma) -> Vec<f64> {
    let mut result = data.to_vec();
    for (axis, &s) in sigma.per_axis().iter().enumerate() {
        if s > 0.0 {
            let kernel = make_gaussian_kernel(s);
            result = convolve_axis(&result, dims, &kernel, axis);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_normalised_and_symmetric() {
        let kernel = make_gaussian_kernel(1.5);
        assert_eq!(kernel.len(), 2 * 6 + 1);
        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(9, 4), 1);
        assert_eq!(reflect(0, 1), 0);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_constant_field_unchanged() {
        let data = vec![5.0; 6 * 5 * 4];
        let smoothed = gaussian_smooth_3d(&data, (6, 5, 4), Sigma::Isotropic(2.0));
        for &v in &smoothed {
            assert!((v - 5.0).abs() < 1e-9, "constant field changed to {}", v);
        }
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let data: Vec<f64> = (0..27).map(|i| i as f64).collect();
        assert_eq!(gaussian_smooth_3d(&data, (3, 3, 3), Sigma::Isotropic(0.0)), data);
    }

    #[test]
    fn test_per_axis_sigma_only_blurs_that_axis() {
        // Step along x, constant along y and z
        let (nx, ny, nz) = (8, 3, 3);
        let mut data = vec![0.0; nx * ny * nz];
        for k in 0..nz {
            for j in 0..ny {
                for i in nx / 2..nx {
                    data[idx3d(i, j, k, nx, ny)] = 1.0;
                }
            }
        }

        let along_y = gaussian_smooth_3d(&data, (nx, ny, nz), Sigma::PerAxis([0.0, 1.0, 1.0]));
        for (a, b) in along_y.iter().zip(&data) {
            assert!((a - b).abs() < 1e-9);
        }

        let along_x = gaussian_smooth_3d(&data, (nx, ny, nz), Sigma::PerAxis([1.0, 0.0, 0.0]));
        let edge = along_x[idx3d(nx / 2, 1, 1, nx, ny)];
        assert!(edge > 0.5 && edge < 1.0, "edge voxel should be blurred, got {}", edge);
    }

    #[test]
    fn test_smoothing_preserves_total_mass_inside() {
        // A single impulse far from the border keeps its mass
        let (nx, ny, nz) = (21, 21, 21);
        let mut data = vec![0.0; nx * ny * nz];
        data[idx3d(10, 10, 10, nx, ny)] = 1.0;
        let smoothed = gaussian_smooth_3d(&data, (nx, ny, nz), Sigma::Isotropic(1.0));
        let total: f64 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(smoothed[idx3d(10, 10, 10, nx, ny)] < 1.0);
    }
}
