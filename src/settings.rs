//! JSON transform configuration
//!
//! ```json
//! { "transform": "atrophy", "loc": [3, 4, 5], "atrophy_val": [0.3, 0.6],
//!   "atlas": "atlas.nii.gz", "smoothing_sigma": 3.4 }
//! { "transform": "lesion", "change_prob": [1.0, 0.001, 0.2, 1.0],
//!   "intensity": "mean", "size": [4, 4, 4],
//!   "pos_offset": [[-5, -5, -5], [5, 5, 5]] }
//! ```
//!
//! Dynamic fields are read untyped and validated here, so a malformed `loc`
//! or parameter fails before any volume is loaded.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SynthError};
use crate::params::{Decay, OffsetRange, Param, RegionSelector, Sigma};
use crate::transform::{AtrophySettings, LesionSettings, Transform};

#[derive(Debug, Deserialize)]
#[serde(tag = "transform", rename_all = "lowercase")]
pub enum TransformSettings {
    Atrophy(AtrophyConfig),
    Lesion(LesionConfig),
}

#[derive(Debug, Deserialize)]
pub struct AtrophyConfig {
    pub atrophy_val: Value,
    #[serde(default)]
    pub atlas: Option<PathBuf>,
    #[serde(default)]
    pub loc: Value,
    #[serde(default)]
    pub loc_max: Option<usize>,
    #[serde(default)]
    pub smoothing_sigma: Value,
}

#[derive(Debug, Deserialize)]
pub struct LesionConfig {
    pub change_prob: Value,
    pub intensity: Value,
    pub size: [i64; 3],
    #[serde(default)]
    pub size_offset: Option<[[i64; 3]; 2]>,
    #[serde(default)]
    pub pos_offset: Option<[[i64; 3]; 2]>,
    #[serde(default)]
    pub loc: Value,
    #[serde(default)]
    pub atlas: Option<PathBuf>,
}

impl TransformSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SynthError::Validation(format!("invalid transform settings: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SynthError::Load(format!("cannot read '{}': {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Validate into a ready-to-apply transform
    pub fn into_transform(self) -> Result<Box<dyn Transform>> {
        let transform: Box<dyn Transform> = match self {
            TransformSettings::Atrophy(cfg) => Box::new(cfg.into_settings()?),
            TransformSettings::Lesion(cfg) => Box::new(cfg.into_settings()?),
        };
        Ok(transform)
    }
}

impl AtrophyConfig {
    pub fn into_settings(self) -> Result<AtrophySettings> {
        let atrophy_val = parse_param(&self.atrophy_val, "atrophy_val")?;
        if matches!(atrophy_val, Param::Decay(_) | Param::VolumeMean) {
            return Err(SynthError::Validation("atrophy_val must be a number or [min, max]".into()));
        }
        Ok(AtrophySettings {
            atrophy_val,
            atlas: self.atlas,
            loc: parse_loc(&self.loc)?,
            loc_max: self.loc_max,
            smoothing_sigma: parse_sigma(&self.smoothing_sigma)?,
        })
    }
}

impl LesionConfig {
    pub fn into_settings(self) -> Result<LesionSettings> {
        let offset = |o: Option<[[i64; 3]; 2]>| o.map(|[min, max]| OffsetRange::new(min, max)).unwrap_or_default();
        let [sx, sy, sz] = self.size;
        let settings = LesionSettings {
            change_prob: parse_param(&self.change_prob, "change_prob")?,
            intensity: parse_param(&self.intensity, "intensity")?,
            size: (sx, sy, sz),
            size_offset: offset(self.size_offset),
            pos_offset: offset(self.pos_offset),
            loc: parse_loc(&self.loc)?,
            atlas: self.atlas,
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn number(v: &Value, what: &str) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| SynthError::Validation(format!("{} must be numeric, got {}", what, v)))
}

/// `null` -> whole volume, number -> one region, array of numbers -> regions
pub fn parse_loc(v: &Value) -> Result<Option<RegionSelector>> {
    let selector = match v {
        Value::Null => return Ok(None),
        Value::Number(_) => RegionSelector::Single(number(v, "loc")?),
        Value::Array(items) => RegionSelector::List(
            items
                .iter()
                .map(|item| number(item, "every loc element"))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(SynthError::Validation(format!(
                "loc must be a number or a list of numbers, got {}",
                other
            )))
        }
    };
    selector.labels()?;
    Ok(Some(selector))
}

/// number -> literal, [min, max] -> range, [start, step, lower, upper] -> decay,
/// "mean" -> volume mean
pub fn parse_param(v: &Value, name: &str) -> Result<Param> {
    match v {
        Value::Number(_) => Ok(Param::Literal(number(v, name)?)),
        Value::String(s) if s == "mean" => Ok(Param::VolumeMean),
        Value::Array(items) => {
            let nums = items.iter().map(|i| number(i, name)).collect::<Result<Vec<_>>>()?;
            match nums[..] {
                [min, max] => Ok(Param::Range(min, max)),
                [start, step, lower, upper] => Ok(Param::Decay(Decay::new(start, step, lower, upper))),
                _ => Err(SynthError::Validation(format!(
                    "{} takes 2 (range) or 4 (decay) values, got {}",
                    name,
                    nums.len()
                ))),
            }
        }
        other => Err(SynthError::Validation(format!("unsupported {}: {}", name, other))),
    }
}

/// `null`/`false`/0 -> none, number -> isotropic, [sx, sy, sz] -> per axis
pub fn parse_sigma(v: &Value) -> Result<Option<Sigma>> {
    let sigma = match v {
        Value::Null | Value::Bool(false) => return Ok(None),
        Value::Number(_) => Sigma::Isotropic(number(v, "smoothing_sigma")?),
        Value::Array(items) if items.len() == 3 => Sigma::PerAxis([
            number(&items[0], "smoothing_sigma")?,
            number(&items[1], "smoothing_sigma")?,
            number(&items[2], "smoothing_sigma")?,
        ]),
        other => {
            return Err(SynthError::Validation(format!("unsupported smoothing_sigma: {}", other)))
        }
    };
    if sigma.per_axis().iter().any(|&s| s < 0.0) {
        return Err(SynthError::Validation("smoothing_sigma must not be negative".into()));
    }
    Ok(if sigma.is_noop() { None } else { Some(sigma) })
}
