//! Stochastic block lesions
//!
//! A lesion is an axis-aligned block, inclusive on both ends, whose voxels
//! are overwritten one at a time with probability `change_prob`. The block
//! is anchored either at the rounded centroid of one atlas region or at the
//! volume centre shifted by a random offset; its extent is the literal size
//! shifted by its own random offset.
//!
//! Seeded steps, in order:
//! 1. region shuffle (only for a multi-region `loc`), seed
//! 2. anchor offset (only without `loc`), seed
//! 3. size offset, seed
//! 4. one draw per voxel in x, y, z raster order, seeds `seed`, `seed + 1`, ...

use std::path::{Path, PathBuf};

use crate::error::{Result, SynthError};
use crate::params::{apply_offset, Decay, OffsetRange, Param, RegionSelector};
use crate::random::RandomSource;
use crate::transform::Transform;
use crate::utils::roi_mask;
use crate::volume::{idx3d, Atlas, Volume};

#[derive(Clone, Debug)]
pub struct LesionSettings {
    /// Per-voxel change probability, literal or decaying
    pub change_prob: Param,
    /// Value written to changed voxels: literal, range, decay or volume mean
    pub intensity: Param,
    /// Block extent per axis before the size offset
    pub size: (i64, i64, i64),
    pub size_offset: OffsetRange,
    /// Anchor offset around the volume centre, ignored when `loc` is set
    pub pos_offset: OffsetRange,
    /// Anchor region(s); one is picked at random from a list
    pub loc: Option<RegionSelector>,
    /// Atlas file, required when `loc` is set
    pub atlas: Option<PathBuf>,
}

impl Default for LesionSettings {
    fn default() -> Self {
        Self {
            change_prob: Param::Literal(1.0),
            intensity: Param::Literal(0.0),
            size: (0, 0, 0),
            size_offset: OffsetRange::default(),
            pos_offset: OffsetRange::default(),
            loc: None,
            atlas: None,
        }
    }
}

impl LesionSettings {
    /// Reject parameter kinds the sweep cannot use, before any grid is touched
    pub fn validate(&self) -> Result<()> {
        Running::change_prob(&self.change_prob)?;
        if let Some(loc) = &self.loc {
            loc.labels()?;
        }
        self.size_offset.validate()?;
        self.pos_offset.validate()
    }
}

/// Running value of a parameter during the sweep
enum Running {
    Fixed(f64),
    Decaying(Decay),
}

impl Running {
    fn change_prob(param: &Param) -> Result<Self> {
        match param {
            Param::Literal(v) => Ok(Running::Fixed(*v)),
            Param::Decay(d) => Ok(Running::Decaying(d.clone())),
            other => Err(SynthError::Validation(format!(
                "change_prob must be a number or a decay, got {:?}",
                other
            ))),
        }
    }

    fn current(&self) -> f64 {
        match self {
            Running::Fixed(v) => *v,
            Running::Decaying(d) => d.current(),
        }
    }
}

/// Rounded (half to even) mean voxel index of every voxel labelled `label`
fn region_centroid(atlas: &Atlas, label: f64) -> Result<(i64, i64, i64)> {
    let (nx, ny, nz) = atlas.dims();
    // marker 2 on target voxels, minus 1: target = 1, rest = 0
    let mask = roi_mask(&RegionSelector::Single(label), 2.0, atlas)?;

    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if mask[idx3d(i, j, k, nx, ny)] - 1.0 != 0.0 {
                    sum[0] += i as f64;
                    sum[1] += j as f64;
                    sum[2] += k as f64;
                    count += 1;
                }
            }
        }
    }

    if count == 0 {
        return Err(SynthError::Precondition(format!("region {} not present in atlas", label)));
    }
    let c = |s: f64| (s / count as f64).round_ties_even() as i64;
    Ok((c(sum[0]), c(sum[1]), c(sum[2])))
}

/// Resolve the block start
fn resolve_anchor(
    volume: &Volume,
    atlas: Option<&Atlas>,
    settings: &LesionSettings,
    seed: u64,
    rng: &mut RandomSource,
) -> Result<(i64, i64, i64)> {
    match &settings.loc {
        Some(loc) => {
            let mut labels = loc.labels()?;
            if labels.len() > 1 {
                rng.reseed(seed);
                rng.shuffle(&mut labels);
            }
            let atlas = atlas
                .ok_or_else(|| SynthError::Validation("region lesion requires an atlas".into()))?;
            if atlas.dims() != volume.dims() {
                return Err(SynthError::Shape { expected: volume.dims(), found: atlas.dims() });
            }
            region_centroid(atlas, labels[0])
        }
        None => apply_offset(volume.center_position(), &settings.pos_offset, seed, rng),
    }
}

/// Inclusive per-axis index ranges of the block, `None` when any axis is empty
fn block_ranges(
    start: (i64, i64, i64),
    size: (i64, i64, i64),
    dims: (usize, usize, usize),
) -> Result<Option<[(usize, usize); 3]>> {
    let starts = [start.0, start.1, start.2];
    let sizes = [size.0, size.1, size.2];
    let mut ends = [0i64; 3];
    for a in 0..3 {
        ends[a] = starts[a].checked_add(sizes[a]).ok_or_else(|| {
            SynthError::OutOfBounds(format!("block end {} + {} overflows", starts[a], sizes[a]))
        })?;
    }
    let extents = [dims.0 as i64, dims.1 as i64, dims.2 as i64];

    if (0..3).any(|a| ends[a] < starts[a]) {
        return Ok(None);
    }
    let mut ranges = [(0usize, 0usize); 3];
    for a in 0..3 {
        if starts[a] < 0 || ends[a] >= extents[a] {
            return Err(SynthError::OutOfBounds(format!(
                "lesion block {:?}..={:?} leaves volume {:?}",
                starts, ends, dims
            )));
        }
        ranges[a] = (starts[a] as usize, ends[a] as usize);
    }
    Ok(Some(ranges))
}

/// Add a lesion to an in-memory volume
pub fn lesion_volume(
    volume: &Volume,
    atlas: Option<&Atlas>,
    settings: &LesionSettings,
    seed: u64,
) -> Result<Volume> {
    settings.validate()?;
    let mut rng = RandomSource::new(seed);

    let start = resolve_anchor(volume, atlas, settings, seed, &mut rng)?;
    let size = apply_offset(settings.size, &settings.size_offset, seed, &mut rng)?;
    let (nx, ny, _) = volume.dims();

    let mut data = volume.data().to_vec();
    let Some([(x0, x1), (y0, y1), (z0, z1)]) = block_ranges(start, size, volume.dims())? else {
        log::debug!("lesion seed={} start={:?} size={:?}: empty block", seed, start, size);
        return volume.derive_volume(data, None);
    };

    let mut change_prob = Running::change_prob(&settings.change_prob)?;
    let mut intensity = settings.intensity.clone();
    let mean = if matches!(intensity, Param::VolumeMean) { volume.mean() } else { 0.0 };

    let mut current_seed = seed;
    let mut changed = 0usize;

    for x in x0..=x1 {
        for y in y0..=y1 {
            for z in z0..=z1 {
                rng.reseed(current_seed);
                current_seed = current_seed.wrapping_add(1);

                if rng.random() < change_prob.current() {
                    data[idx3d(x, y, z, nx, ny)] = match &mut intensity {
                        Param::Literal(v) => *v,
                        Param::Range(min, max) => rng.uniform(*min, *max),
                        Param::Decay(d) => d.take()?,
                        Param::VolumeMean => mean,
                    };
                    changed += 1;
                }

                if let Running::Decaying(d) = &mut change_prob {
                    d.advance()?;
                }
            }
        }
    }

    log::debug!(
        "lesion seed={} start={:?} size={:?}: changed {} of {} voxels",
        seed, start, size, changed,
        (x1 - x0 + 1) * (y1 - y0 + 1) * (z1 - z0 + 1)
    );
    volume.derive_volume(data, None)
}

/// Load `source`, add a lesion and return the derived volume (not persisted)
pub fn lesion(source: &Path, settings: &LesionSettings, seed: u64) -> Result<Volume> {
    settings.validate()?;
    if settings.loc.is_some() && settings.atlas.is_none() {
        return Err(SynthError::Validation("region lesion requires an atlas path".into()));
    }
    let volume = Volume::load(source)?;
    let atlas = match (&settings.loc, &settings.atlas) {
        (Some(_), Some(path)) => Some(Atlas::load(path)?),
        _ => None,
    };
    log::debug!("lesion {} seed={}", source.display(), seed);
    lesion_volume(&volume, atlas.as_ref(), settings, seed)
}

impl Transform for LesionSettings {
    fn name(&self) -> &'static str {
        "lesion"
    }

    fn apply(&self, source: &Path, seed: u64) -> Result<Volume> {
        lesion(source, self, seed)
    }
}
