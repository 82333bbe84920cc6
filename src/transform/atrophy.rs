//! Multiplicative atrophy
//!
//! Target regions (or the whole volume) are scaled by an attenuation factor.
//! With regions, the factor is written into an atlas mask that can be
//! Gaussian-smoothed before it is multiplied into the volume, softening the
//! region boundary.
//!
//! Order of seeded steps, each reseeding with the call seed:
//! 1. region subset draw (only when `loc_max` is set)
//! 2. factor draw (only when `atrophy_val` is a range)

use std::path::{Path, PathBuf};

use crate::error::{Result, SynthError};
use crate::params::{resolve_scalar, Param, RegionSelector, Sigma};
use crate::random::RandomSource;
use crate::transform::Transform;
use crate::utils::{concat, gaussian_smooth_3d, random_region_subset, roi_mask};
use crate::volume::{Atlas, Volume};

#[derive(Clone, Debug)]
pub struct AtrophySettings {
    /// Attenuation factor, literal or `(min, max)` range
    pub atrophy_val: Param,
    /// Atlas file, required when `loc` is set
    pub atlas: Option<PathBuf>,
    /// Target regions; `None` scales the whole volume
    pub loc: Option<RegionSelector>,
    /// Keep a random subset of 1..=loc_max regions from `loc`
    pub loc_max: Option<usize>,
    /// Smooth the attenuation mask before applying it
    pub smoothing_sigma: Option<Sigma>,
}

impl Default for AtrophySettings {
    fn default() -> Self {
        Self {
            atrophy_val: Param::Literal(1.0),
            atlas: None,
            loc: None,
            loc_max: None,
            smoothing_sigma: None,
        }
    }
}

/// Settings after every seeded draw has been made
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAtrophy {
    pub labels: Option<Vec<f64>>,
    pub factor: f64,
}

impl AtrophySettings {
    /// Validate the settings and make the seeded draws, without touching any grid
    pub fn resolve(&self, seed: u64, rng: &mut RandomSource) -> Result<ResolvedAtrophy> {
        let mut labels = self.loc.as_ref().map(RegionSelector::labels).transpose()?;

        if let Some(loc_max) = self.loc_max {
            let loc = labels
                .as_deref()
                .ok_or_else(|| SynthError::Validation("loc_max requires loc".into()))?;
            labels = Some(random_region_subset(loc, loc_max, seed, rng)?);
        }

        let factor = resolve_scalar(&self.atrophy_val, seed, rng)?;
        Ok(ResolvedAtrophy { labels, factor })
    }
}

/// Scale `volume` according to already resolved settings
pub fn apply_atrophy(
    volume: &Volume,
    atlas: Option<&Atlas>,
    resolved: &ResolvedAtrophy,
    smoothing_sigma: Option<Sigma>,
) -> Result<Volume> {
    let data = match &resolved.labels {
        Some(labels) => {
            let atlas = atlas
                .ok_or_else(|| SynthError::Validation("region atrophy requires an atlas".into()))?;
            let mut mask = roi_mask(&RegionSelector::List(labels.clone()), resolved.factor, atlas)?;
            if let Some(sigma) = smoothing_sigma.filter(|s| !s.is_noop()) {
                mask = gaussian_smooth_3d(&mask, atlas.dims(), sigma);
            }
            concat(volume.data(), volume.dims(), &mask, atlas.dims())?
        }
        None => volume.data().iter().map(|v| v * resolved.factor).collect(),
    };
    volume.derive_volume(data, None)
}

/// Atrophy an in-memory volume
pub fn atrophy_volume(
    volume: &Volume,
    atlas: Option<&Atlas>,
    settings: &AtrophySettings,
    seed: u64,
) -> Result<Volume> {
    let mut rng = RandomSource::new(seed);
    let resolved = settings.resolve(seed, &mut rng)?;
    log::debug!(
        "atrophy seed={} factor={} regions={:?}",
        seed, resolved.factor, resolved.labels
    );
    apply_atrophy(volume, atlas, &resolved, settings.smoothing_sigma)
}

/// Load `source`, atrophy it and return the derived volume (not persisted)
pub fn atrophy(source: &Path, settings: &AtrophySettings, seed: u64) -> Result<Volume> {
    let mut rng = RandomSource::new(seed);
    let resolved = settings.resolve(seed, &mut rng)?;

    if resolved.labels.is_some() && settings.atlas.is_none() {
        return Err(SynthError::Validation("region atrophy requires an atlas path".into()));
    }
    let volume = Volume::load(source)?;
    let atlas = match (&resolved.labels, &settings.atlas) {
        (Some(_), Some(path)) => Some(Atlas::load(path)?),
        _ => None,
    };

    log::debug!(
        "atrophy {} seed={} factor={} regions={:?}",
        source.display(), seed, resolved.factor, resolved.labels
    );
    apply_atrophy(&volume, atlas.as_ref(), &resolved, settings.smoothing_sigma)
}

impl Transform for AtrophySettings {
    fn name(&self) -> &'static str {
        "atrophy"
    }

    fn apply(&self, source: &Path, seed: u64) -> Result<Volume> {
        atrophy(source, self, seed)
    }
}
