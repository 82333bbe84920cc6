//! NIfTI-1 file I/O
//!
//! Reads `.nii` and `.nii.gz` volumes (gzip is auto-detected from the magic
//! bytes) into flat Fortran-ordered buffers, and writes float32 volumes back
//! with the caller's affine and the source's qform/sform fields.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array, ArrayView3, Axis, IxDyn};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use crate::error::{Result, SynthError};

/// NIfTI header size plus the 4-byte empty extension block
const VOX_OFFSET: usize = 352;

/// Decoded NIfTI volume
pub struct NiftiData {
    /// Voxel values as f64, index = x + y*nx + z*nx*ny
    pub data: Vec<f64>,
    /// Dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
    /// qform/sform header fields
    pub orientation: Orientation,
}

/// The qform and sform header fields, kept so a saved volume carries the
/// same world mapping as its source
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub sform_code: i16,
    pub qform_code: i16,
    /// quatern_b, quatern_c, quatern_d
    pub quatern: [f64; 3],
    /// qoffset_x, qoffset_y, qoffset_z
    pub qoffset: [f64; 3],
    /// Handedness stored in pixdim[0], either 1 or -1
    pub qfac: f64,
}

impl Default for Orientation {
    /// sform only (scanner anat), no qform
    fn default() -> Self {
        Self { sform_code: 1, qform_code: 0, quatern: [0.0; 3], qoffset: [0.0; 3], qfac: 1.0 }
    }
}

impl Orientation {
    fn from_header(header: &NiftiHeader) -> Self {
        Self {
            sform_code: header.sform_code,
            qform_code: header.qform_code,
            quatern: [header.quatern_b as f64, header.quatern_c as f64, header.quatern_d as f64],
            qoffset: [header.quatern_x as f64, header.quatern_y as f64, header.quatern_z as f64],
            qfac: if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 },
        }
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Summarise the raw header fields, used to make decode failures readable
fn header_diagnostics(bytes: &[u8]) -> String {
    if bytes.len() < 348 {
        return format!("file too small ({} bytes, need at least 348)", bytes.len());
    }

    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);

    format!("sizeof_hdr={}, magic='{}', datatype={}", sizeof_hdr, magic, datatype)
}

fn decode_object(bytes: &[u8]) -> Result<InMemNiftiObject> {
    if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes))).map_err(|e| {
            let mut inflated = Vec::new();
            let info = match GzDecoder::new(Cursor::new(bytes)).read_to_end(&mut inflated) {
                Ok(_) => header_diagnostics(&inflated),
                Err(_) => "could not decompress".to_string(),
            };
            SynthError::Load(format!("gzipped NIfTI: {} ({})", e, info))
        })
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| SynthError::Load(format!("NIfTI: {} ({})", e, header_diagnostics(bytes))))
    }
}

/// Flatten a 3D view in Fortran order (x varies fastest)
fn flatten_fortran(view: ArrayView3<f64>) -> Vec<f64> {
    let (nx, ny, nz) = view.dim();
    let mut data = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                data.push(view[[i, j, k]]);
            }
        }
    }
    data
}

/// Decode a NIfTI volume from bytes
///
/// 4D inputs are reduced to their first volume.
pub fn load_nifti(bytes: &[u8]) -> Result<NiftiData> {
    let obj = decode_object(bytes)?;
    let header = obj.header();

    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(SynthError::Load(format!("expected at least a 3D volume, got {}D", ndim)));
    }

    let voxel_size = (
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        header.pixdim[3] as f64,
    );
    let orientation = Orientation::from_header(header);
    let affine = get_affine(header);

    let array: Array<f64, IxDyn> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| SynthError::Load(format!("volume conversion: {}", e)))?;

    let mut view = array.view();
    while view.ndim() > 3 {
        let last = Axis(view.ndim() - 1);
        view = view.index_axis_move(last, 0);
    }
    let view = view
        .into_dimensionality::<ndarray::Ix3>()
        .map_err(|e| SynthError::Load(format!("expected a 3D grid: {}", e)))?;

    // nifti-rs may reorder axes, so the array shape is authoritative
    let dims = view.dim();
    let data = flatten_fortran(view);

    Ok(NiftiData { data, dims, voxel_size, affine, orientation })
}

/// Affine from the sform rows, then the qform quaternion, then a voxel-size
/// diagonal when neither is set
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    if header.sform_code > 0 {
        let (s, t, u) = (&header.srow_x, &header.srow_y, &header.srow_z);
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else if header.qform_code > 0 {
        let voxel_size = (
            header.pixdim[1] as f64,
            header.pixdim[2] as f64,
            header.pixdim[3] as f64,
        );
        qform_affine(&Orientation::from_header(header), voxel_size)
    } else {
        [
            header.pixdim[1] as f64, 0.0, 0.0, 0.0,
            0.0, header.pixdim[2] as f64, 0.0, 0.0,
            0.0, 0.0, header.pixdim[3] as f64, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Rotation from the unit quaternion (b, c, d), scaled by voxel size, with
/// the qfac sign on the z column
fn qform_affine(orientation: &Orientation, voxel_size: (f64, f64, f64)) -> [f64; 16] {
    let [b, c, d] = orientation.quatern;
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let (dx, dy) = (voxel_size.0, voxel_size.1);
    let dz = voxel_size.2 * orientation.qfac;
    let [ox, oy, oz] = orientation.qoffset;
    [
        (a * a + b * b - c * c - d * d) * dx, 2.0 * (b * c - a * d) * dy, 2.0 * (b * d + a * c) * dz, ox,
        2.0 * (b * c + a * d) * dx, (a * a + c * c - b * b - d * d) * dy, 2.0 * (c * d - a * b) * dz, oy,
        2.0 * (b * d - a * c) * dx, 2.0 * (c * d + a * b) * dy, (a * a + d * d - b * b - c * c) * dz, oz,
        0.0, 0.0, 0.0, 1.0,
    ]
}

fn put<const N: usize>(header: &mut [u8], offset: usize, bytes: [u8; N]) {
    header[offset..offset + N].copy_from_slice(&bytes);
}

/// Encode a float32 single-file NIfTI-1 volume
pub fn save_nifti(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
    orientation: &Orientation,
) -> Result<Vec<u8>> {
    let (nx, ny, nz) = dims;
    if data.len() != nx * ny * nz {
        return Err(SynthError::Save(format!(
            "buffer holds {} voxels but dims {:?} need {}",
            data.len(), dims, nx * ny * nz
        )));
    }
    if [nx, ny, nz].iter().any(|&d| d > i16::MAX as usize) {
        return Err(SynthError::Save(format!("dims {:?} exceed the NIfTI-1 limit", dims)));
    }

    let mut header = [0u8; 348];
    put(&mut header, 0, 348i32.to_le_bytes());

    let dim: [i16; 8] = [3, nx as i16, ny as i16, nz as i16, 1, 1, 1, 1];
    for (i, d) in dim.iter().enumerate() {
        put(&mut header, 40 + i * 2, d.to_le_bytes());
    }

    // FLOAT32, 32 bits per voxel
    put(&mut header, 70, 16i16.to_le_bytes());
    put(&mut header, 72, 32i16.to_le_bytes());

    let (vsx, vsy, vsz) = voxel_size;
    let pixdim: [f32; 8] = [orientation.qfac as f32, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, p) in pixdim.iter().enumerate() {
        put(&mut header, 76 + i * 4, p.to_le_bytes());
    }

    put(&mut header, 108, (VOX_OFFSET as f32).to_le_bytes());
    put(&mut header, 112, 1.0f32.to_le_bytes());
    put(&mut header, 116, 0.0f32.to_le_bytes());

    put(&mut header, 252, orientation.qform_code.to_le_bytes());
    put(&mut header, 254, orientation.sform_code.to_le_bytes());
    for (i, q) in orientation.quatern.iter().chain(&orientation.qoffset).enumerate() {
        put(&mut header, 256 + i * 4, (*q as f32).to_le_bytes());
    }
    // srow_x/y/z at 280/296/312
    for row in 0..3 {
        for col in 0..4 {
            put(&mut header, 280 + row * 16 + col * 4, (affine[row * 4 + col] as f32).to_le_bytes());
        }
    }

    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(VOX_OFFSET + data.len() * 4);
    buffer.extend_from_slice(&header);
    buffer.extend_from_slice(&[0u8; 4]);
    for &val in data {
        buffer.extend_from_slice(&(val as f32).to_le_bytes());
    }

    Ok(buffer)
}

/// Encode a gzipped NIfTI-1 volume (.nii.gz)
pub fn save_nifti_gz(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
    orientation: &Orientation,
) -> Result<Vec<u8>> {
    let raw = save_nifti(data, dims, voxel_size, affine, orientation)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| SynthError::Save(format!("gzip compression: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| SynthError::Save(format!("gzip finish: {}", e)))
}

/// Read a `.nii` or `.nii.gz` file
pub fn read_nifti_file(path: &Path) -> Result<NiftiData> {
    let bytes = std::fs::read(path)
        .map_err(|e| SynthError::Load(format!("cannot read '{}': {}", path.display(), e)))?;
    load_nifti(&bytes)
}

/// Write a volume to disk, gzip compressed when the path ends with `.nii.gz`
pub fn save_nifti_to_file(
    path: &Path,
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
    orientation: &Orientation,
) -> Result<()> {
    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        save_nifti_gz(data, dims, voxel_size, affine, orientation)?
    } else {
        save_nifti(data, dims, voxel_size, affine, orientation)?
    };

    std::fs::write(path, &bytes)
        .map_err(|e| SynthError::Save(format!("cannot write '{}': {}", path.display(), e)))
}
