//! Transform parameters and their seeded resolution
//!
//! A parameter is a literal, a `(min, max)` range drawn once per call, a
//! running linear decay stepped per voxel, or (lesion intensity only) the
//! source volume's mean.

use crate::error::{Result, SynthError};
use crate::random::RandomSource;

#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Literal(f64),
    /// Uniform draw from `[min, max)`
    Range(f64, f64),
    Decay(Decay),
    /// Mean intensity of the volume being transformed
    VolumeMean,
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Literal(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Literal(value as f64)
    }
}

impl From<(f64, f64)> for Param {
    fn from((min, max): (f64, f64)) -> Self {
        Param::Range(min, max)
    }
}

impl From<Decay> for Param {
    fn from(decay: Decay) -> Self {
        Param::Decay(decay)
    }
}

/// Value that drops by `step` on every advance while it stays inside
/// `[lower, upper]`, and freezes at its last in-bound value otherwise
#[derive(Clone, Debug, PartialEq)]
pub struct Decay {
    value: f64,
    step: f64,
    lower: f64,
    upper: f64,
}

impl Decay {
    pub fn new(start: f64, step: f64, lower: f64, upper: f64) -> Self {
        Self { value: start, step, lower, upper }
    }

    pub fn current(&self) -> f64 {
        self.value
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    fn in_bounds(&self, v: f64) -> bool {
        self.lower <= v && v <= self.upper
    }

    /// Step once. Fails if the current value already sits outside the bounds.
    pub fn advance(&mut self) -> Result<()> {
        if !self.in_bounds(self.value) {
            return Err(SynthError::Precondition(format!(
                "decay value {} outside [{}, {}]",
                self.value, self.lower, self.upper
            )));
        }
        let next = self.value - self.step;
        if self.in_bounds(next) {
            self.value = next;
        }
        Ok(())
    }

    /// Current value, then advance
    pub fn take(&mut self) -> Result<f64> {
        let v = self.value;
        self.advance()?;
        Ok(v)
    }
}

/// Atlas regions a transform targets
#[derive(Clone, Debug, PartialEq)]
pub enum RegionSelector {
    Single(f64),
    List(Vec<f64>),
}

impl RegionSelector {
    /// Normalised, validated label list
    pub fn labels(&self) -> Result<Vec<f64>> {
        let labels = match self {
            RegionSelector::Single(label) => vec![*label],
            RegionSelector::List(labels) => labels.clone(),
        };
        if labels.is_empty() {
            return Err(SynthError::Validation("region list must not be empty".into()));
        }
        if let Some(bad) = labels.iter().find(|l| !l.is_finite()) {
            return Err(SynthError::Validation(format!("region label {} is not a finite number", bad)));
        }
        Ok(labels)
    }
}

impl From<i64> for RegionSelector {
    fn from(label: i64) -> Self {
        RegionSelector::Single(label as f64)
    }
}

impl From<Vec<i64>> for RegionSelector {
    fn from(labels: Vec<i64>) -> Self {
        RegionSelector::List(labels.into_iter().map(|l| l as f64).collect())
    }
}

/// Per-axis `[min, max]` offset bounds, both inclusive
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OffsetRange {
    pub min: [i64; 3],
    pub max: [i64; 3],
}

impl OffsetRange {
    pub fn new(min: [i64; 3], max: [i64; 3]) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<()> {
        for axis in 0..3 {
            if self.min[axis] > self.max[axis] {
                return Err(SynthError::Validation(format!(
                    "offset min {} exceeds max {} on axis {}",
                    self.min[axis], self.max[axis], axis
                )));
            }
        }
        Ok(())
    }
}

/// Gaussian sigma in voxels
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sigma {
    Isotropic(f64),
    PerAxis([f64; 3]),
}

impl Sigma {
    pub fn per_axis(&self) -> [f64; 3] {
        match *self {
            Sigma::Isotropic(s) => [s, s, s],
            Sigma::PerAxis(s) => s,
        }
    }

    /// All-zero sigma means no smoothing
    pub fn is_noop(&self) -> bool {
        self.per_axis().iter().all(|&s| s == 0.0)
    }
}

/// Resolve a literal-or-range parameter, reseeding with `seed` for a range
pub fn resolve_scalar(param: &Param, seed: u64, rng: &mut RandomSource) -> Result<f64> {
    match param {
        Param::Literal(v) => Ok(*v),
        Param::Range(min, max) => {
            rng.reseed(seed);
            Ok(rng.uniform(*min, *max))
        }
        other => Err(SynthError::Validation(format!(
            "expected a number or (min, max) range, got {:?}",
            other
        ))),
    }
}

/// Shift `pos` by a per-axis offset drawn inclusively from `range`
///
/// Reseeds with `seed`, then draws x, y and z in that order.
pub fn apply_offset(
    pos: (i64, i64, i64),
    range: &OffsetRange,
    seed: u64,
    rng: &mut RandomSource,
) -> Result<(i64, i64, i64)> {
    range.validate()?;
    rng.reseed(seed);
    let dx = rng.randint_inclusive(range.min[0], range.max[0]);
    let dy = rng.randint_inclusive(range.min[1], range.max[1]);
    let dz = rng.randint_inclusive(range.min[2], range.max[2]);
    let shift = |p: i64, d: i64| {
        p.checked_add(d).ok_or_else(|| {
            SynthError::OutOfBounds(format!("position {} + offset {} overflows", p, d))
        })
    };
    Ok((shift(pos.0, dx)?, shift(pos.1, dy)?, shift(pos.2, dz)?))
}
