//! Named transfer-function presets for 3D volume rendering.
//!
//! The catalog is the Slicer `VolumeProperty` XML table: every preset is an
//! element whose attributes hold count-prefixed flat arrays
//! (`colorTransfer` = x r g b ..., `scalarOpacity` = x o ...) and the
//! shading scalars.

use crate::enums::Interpolation;

use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const BUILTIN_PRESETS: &str = include_str!("presets/slicer_presets.xml");

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("Failed to parse preset table: {0}")]
    Parse(String),

    #[error("Preset {name}: {reason}")]
    InvalidArray { name: String, reason: String },

    #[error("Preset {name}: attribute {attribute} is not a number")]
    InvalidScalar { name: String, attribute: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPoint {
    pub x: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityPoint {
    pub x: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorTransferFunction {
    pub points: Vec<ColorPoint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiecewiseFunction {
    pub points: Vec<OpacityPoint>,
}

impl ColorTransferFunction {
    /// Parses `[count, x, r, g, b, ...]`.
    pub fn from_flat(values: &[f64]) -> Result<Self, String> {
        let chunks = checked_payload(values, 4)?;
        Ok(Self {
            points: chunks
                .chunks_exact(4)
                .map(|c| ColorPoint {
                    x: c[0],
                    r: c[1],
                    g: c[2],
                    b: c[3],
                })
                .collect(),
        })
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = vec![(self.points.len() * 4) as f64];
        flat.extend(self.points.iter().flat_map(|p| [p.x, p.r, p.g, p.b]));
        flat
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        x_range(self.points.iter().map(|p| p.x))
    }

    pub fn rescaled(&self, range: (f64, f64)) -> Self {
        let remap = remapper(self.range(), range);
        Self {
            points: self
                .points
                .iter()
                .map(|p| ColorPoint { x: remap(p.x), ..*p })
                .collect(),
        }
    }
}

impl PiecewiseFunction {
    /// Parses `[count, x, opacity, ...]`.
    pub fn from_flat(values: &[f64]) -> Result<Self, String> {
        let chunks = checked_payload(values, 2)?;
        Ok(Self {
            points: chunks
                .chunks_exact(2)
                .map(|c| OpacityPoint {
                    x: c[0],
                    opacity: c[1],
                })
                .collect(),
        })
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = vec![(self.points.len() * 2) as f64];
        flat.extend(self.points.iter().flat_map(|p| [p.x, p.opacity]));
        flat
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        x_range(self.points.iter().map(|p| p.x))
    }

    pub fn rescaled(&self, range: (f64, f64)) -> Self {
        let remap = remapper(self.range(), range);
        Self {
            points: self
                .points
                .iter()
                .map(|p| OpacityPoint { x: remap(p.x), ..*p })
                .collect(),
        }
    }
}

fn checked_payload(values: &[f64], stride: usize) -> Result<&[f64], String> {
    let (count, payload) = values
        .split_first()
        .ok_or_else(|| "empty array".to_string())?;
    if *count != payload.len() as f64 {
        return Err(format!(
            "expected {} values, found {}",
            count,
            payload.len()
        ));
    }
    if payload.len() % stride != 0 {
        return Err(format!("{} values is not a multiple of {}", payload.len(), stride));
    }
    Ok(payload)
}

fn x_range(xs: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    xs.fold(None, |acc, x| match acc {
        None => Some((x, x)),
        Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
    })
}

/// Linear map from the native x domain onto `target`, preserving relative
/// spacing. A degenerate native domain collapses onto `target.0`.
fn remapper(native: Option<(f64, f64)>, target: (f64, f64)) -> impl Fn(f64) -> f64 {
    let (lo, hi) = native.unwrap_or((0.0, 0.0));
    let span = hi - lo;
    move |x| {
        if span == 0.0 {
            target.0
        } else {
            target.0 + (x - lo) / span * (target.1 - target.0)
        }
    }
}

/// Appearance of a volume in the 3D view
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProperty {
    pub color: ColorTransferFunction,
    pub scalar_opacity: PiecewiseFunction,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub specular_power: f64,
    pub shade: bool,
    pub interpolation: Interpolation,
}

impl Default for VolumeProperty {
    fn default() -> Self {
        Self {
            color: ColorTransferFunction::default(),
            scalar_opacity: PiecewiseFunction::default(),
            ambient: 0.0,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 10.0,
            shade: true,
            interpolation: Interpolation::Linear,
        }
    }
}

/// An immutable named rendering preset. Scalars absent from the table keep
/// the target's current value when applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub color: ColorTransferFunction,
    pub scalar_opacity: PiecewiseFunction,
    pub ambient: Option<f64>,
    pub diffuse: Option<f64>,
    pub specular: Option<f64>,
    pub specular_power: Option<f64>,
    pub shade: Option<bool>,
    pub interpolation: Option<Interpolation>,
}

impl Preset {
    /// Rewrites `target` with this preset, the transfer functions remapped
    /// onto `input_range` when given. Returns `false` and leaves `target`
    /// untouched if it already matches.
    pub fn apply(&self, target: &mut VolumeProperty, input_range: Option<(f64, f64)>) -> bool {
        let (color, scalar_opacity) = match input_range {
            Some(range) => (self.color.rescaled(range), self.scalar_opacity.rescaled(range)),
            None => (self.color.clone(), self.scalar_opacity.clone()),
        };
        let candidate = VolumeProperty {
            color,
            scalar_opacity,
            ambient: self.ambient.unwrap_or(target.ambient),
            diffuse: self.diffuse.unwrap_or(target.diffuse),
            specular: self.specular.unwrap_or(target.specular),
            specular_power: self.specular_power.unwrap_or(target.specular_power),
            shade: self.shade.unwrap_or(target.shade),
            interpolation: self.interpolation.unwrap_or(target.interpolation),
        };
        if candidate == *target {
            return false;
        }
        *target = candidate;
        true
    }
}

#[derive(Debug, Deserialize)]
struct PresetTable {
    #[serde(rename = "VolumeProperty", default)]
    presets: Vec<RawPreset>,
}

#[derive(Debug, Deserialize)]
struct RawPreset {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@colorTransfer")]
    color_transfer: String,
    #[serde(rename = "@scalarOpacity")]
    scalar_opacity: String,
    #[serde(rename = "@ambient", default)]
    ambient: Option<String>,
    #[serde(rename = "@diffuse", default)]
    diffuse: Option<String>,
    #[serde(rename = "@specular", default)]
    specular: Option<String>,
    #[serde(rename = "@specularPower", default)]
    specular_power: Option<String>,
    #[serde(rename = "@shade", default)]
    shade: Option<String>,
    #[serde(rename = "@interpolation", default)]
    interpolation: Option<String>,
}

impl RawPreset {
    fn into_preset(self) -> Result<Preset, PresetError> {
        let name = self.name;
        let array = |text: &str| -> Result<Vec<f64>, PresetError> {
            text.split_whitespace()
                .map(|v| v.parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|e| PresetError::InvalidArray {
                    name: name.clone(),
                    reason: e.to_string(),
                })
        };
        let invalid = |reason: String| PresetError::InvalidArray {
            name: name.clone(),
            reason,
        };
        let color = ColorTransferFunction::from_flat(&array(&self.color_transfer)?)
            .map_err(invalid)?;
        let scalar_opacity =
            PiecewiseFunction::from_flat(&array(&self.scalar_opacity)?).map_err(invalid)?;
        let scalar = |value: Option<String>, attribute: &'static str| {
            value
                .map(|v| v.trim().parse::<f64>())
                .transpose()
                .map_err(|_| PresetError::InvalidScalar {
                    name: name.clone(),
                    attribute,
                })
        };

        Ok(Preset {
            ambient: scalar(self.ambient, "ambient")?,
            diffuse: scalar(self.diffuse, "diffuse")?,
            specular: scalar(self.specular, "specular")?,
            specular_power: scalar(self.specular_power, "specularPower")?,
            shade: scalar(self.shade, "shade")?.map(|v| v != 0.0),
            interpolation: scalar(self.interpolation, "interpolation")?
                .map(|v| Interpolation::from_code(v as i64)),
            color,
            scalar_opacity,
            name: name.clone(),
        })
    }
}

/// The table of presets, loaded once per scene.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    /// Parses a preset table
    pub fn load(source: &str) -> Result<Self, PresetError> {
        let table: PresetTable = from_str(source).map_err(|e| PresetError::Parse(e.to_string()))?;
        let presets = table
            .presets
            .into_iter()
            .map(RawPreset::into_preset)
            .collect::<Result<_, _>>()?;
        Ok(Self { presets })
    }

    pub fn from_file(path: &Path) -> Result<Self, PresetError> {
        let content = std::fs::read_to_string(path)?;
        Self::load(&content)
    }

    /// The table shipped with the crate
    pub fn builtin() -> Result<Self, PresetError> {
        Self::load(BUILTIN_PRESETS)
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    pub fn first(&self) -> Option<&Preset> {
        self.presets.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = PresetCatalog::builtin().expect("builtin presets parse");
        assert_eq!(catalog.presets().len(), 5);
        let bone = catalog.get_by_name("CT-Bone").expect("CT-Bone exists");
        assert_eq!(bone.color.points.len(), 4);
        assert_eq!(bone.scalar_opacity.points.len(), 4);
        assert_eq!(bone.ambient, Some(0.2));
        assert_eq!(bone.shade, Some(true));
        assert!(catalog.get_by_name("CT-Unknown").is_none());
    }

    #[test]
    fn test_flat_arrays_round_trip_count_prefix() {
        let flat = [8.0, 0.0, 0.0, 0.0, 0.0, 10.0, 1.0, 1.0, 1.0];
        let color = ColorTransferFunction::from_flat(&flat).expect("valid array");
        assert_eq!(color.to_flat(), flat.to_vec());
        assert!(ColorTransferFunction::from_flat(&[5.0, 1.0, 2.0]).is_err());
        assert!(PiecewiseFunction::from_flat(&[3.0, 1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_rescale_preserves_relative_spacing() {
        let opacity = PiecewiseFunction::from_flat(&[6.0, 0.0, 0.0, 25.0, 0.5, 100.0, 1.0])
            .expect("valid array");
        let rescaled = opacity.rescaled((-1000.0, 1000.0));
        let xs: Vec<f64> = rescaled.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![-1000.0, -500.0, 1000.0]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let catalog = PresetCatalog::builtin().expect("builtin presets parse");
        let preset = catalog.get_by_name("CT-AAA").expect("CT-AAA exists");
        let mut property = VolumeProperty::default();

        assert!(preset.apply(&mut property, Some((0.0, 255.0))));
        let snapshot = property.clone();
        assert!(!preset.apply(&mut property, Some((0.0, 255.0))));
        assert_eq!(property, snapshot);
        assert!(preset.apply(&mut property, None));
    }

    #[test]
    fn test_mismatched_count_is_rejected() {
        let xml = r#"<VolumeProperties>
            <VolumeProperty name="Broken" colorTransfer="8 0 0 0 0" scalarOpacity="2 0 0"/>
        </VolumeProperties>"#;
        assert!(matches!(
            PresetCatalog::load(xml),
            Err(PresetError::InvalidArray { .. })
        ));
    }
}
