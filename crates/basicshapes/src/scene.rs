//! JSON scene files.
//!
//! A scene lists shapes to composite on one grid:
//!
//! ```json
//! {
//!   "grid": { "dimensions": [32, 32, 32], "spacing": [1.0, 1.0, 1.0] },
//!   "policy": "max",
//!   "dtype": "u16",
//!   "shapes": [
//!     { "kind": "sphere", "radius": 6.0, "center": [16, 16, 16], "label": 1 },
//!     { "kind": "cuboid", "half_extents": [4, 2, 8], "center": [10, 20, 16],
//!       "rotation": { "euler_degrees": [0, 0, 30] }, "label": 2 }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use basicshapes_core::{
    CompositePolicy, DVec3, Dtype, GridSpec, RasterOptions, Result, Rotation, ShapeDescriptor,
    ShapeKind, ShapesError,
};
use serde::{Deserialize, Serialize};

use crate::volume::{generate, AnyVolume};

fn default_label() -> f64 {
    1.0
}

/// One shape entry of a scene file.
///
/// Fields the entry's kind does not take, including misspelled ones, are
/// rejected when parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSceneShape")]
pub struct SceneShape {
    #[serde(flatten)]
    pub kind: ShapeKind,
    pub center: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(default = "default_label")]
    pub label: f64,
}

/// A scene shape as written, before its kind is resolved.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSceneShape {
    kind: String,
    center: [f64; 3],
    #[serde(default)]
    rotation: Option<Rotation>,
    #[serde(default = "default_label")]
    label: f64,
    radius: Option<f64>,
    radii: Option<[f64; 3]>,
    half_length: Option<f64>,
    half_extents: Option<[f64; 3]>,
    major_radius: Option<f64>,
    minor_radius: Option<f64>,
}

impl TryFrom<RawSceneShape> for SceneShape {
    type Error = String;

    fn try_from(raw: RawSceneShape) -> std::result::Result<Self, String> {
        let name = raw.kind.as_str();
        let need = |field: &str| format!("{name} needs '{field}'");
        let (kind, takes): (ShapeKind, &[&str]) = match name {
            "sphere" => (
                ShapeKind::Sphere {
                    radius: raw.radius.ok_or_else(|| need("radius"))?,
                },
                &["radius"],
            ),
            "ellipsoid" => (
                ShapeKind::Ellipsoid {
                    radii: raw.radii.ok_or_else(|| need("radii"))?,
                },
                &["radii"],
            ),
            "cylinder" => (
                ShapeKind::Cylinder {
                    radius: raw.radius.ok_or_else(|| need("radius"))?,
                    half_length: raw.half_length.ok_or_else(|| need("half_length"))?,
                },
                &["radius", "half_length"],
            ),
            "cuboid" => (
                ShapeKind::Cuboid {
                    half_extents: raw.half_extents.ok_or_else(|| need("half_extents"))?,
                },
                &["half_extents"],
            ),
            "torus" => (
                ShapeKind::Torus {
                    major_radius: raw.major_radius.ok_or_else(|| need("major_radius"))?,
                    minor_radius: raw.minor_radius.ok_or_else(|| need("minor_radius"))?,
                },
                &["major_radius", "minor_radius"],
            ),
            "capsule" => (
                ShapeKind::Capsule {
                    radius: raw.radius.ok_or_else(|| need("radius"))?,
                    half_length: raw.half_length.ok_or_else(|| need("half_length"))?,
                },
                &["radius", "half_length"],
            ),
            other => {
                return Err(format!(
                    "unknown shape kind '{other}', expected one of {}",
                    ShapeKind::NAMES.join(", ")
                ))
            }
        };

        let given = [
            ("radius", raw.radius.is_some()),
            ("radii", raw.radii.is_some()),
            ("half_length", raw.half_length.is_some()),
            ("half_extents", raw.half_extents.is_some()),
            ("major_radius", raw.major_radius.is_some()),
            ("minor_radius", raw.minor_radius.is_some()),
        ];
        if let Some((field, _)) = given
            .iter()
            .find(|(field, set)| *set && !takes.contains(field))
        {
            return Err(format!("{name} does not take '{field}'"));
        }

        Ok(Self {
            kind,
            center: raw.center,
            rotation: raw.rotation,
            label: raw.label,
        })
    }
}

impl SceneShape {
    /// Resolves the rotation and builds the descriptor.
    pub fn to_descriptor(&self) -> Result<ShapeDescriptor> {
        let mut shape = ShapeDescriptor::new(self.kind, DVec3::from_array(self.center), self.label);
        if let Some(rotation) = &self.rotation {
            shape = shape.with_rotation(rotation.to_quat()?);
        }
        Ok(shape)
    }
}

/// A full scene: grid, compositing settings and shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    #[serde(default)]
    pub grid: GridSpec,
    #[serde(default)]
    pub policy: CompositePolicy,
    #[serde(default)]
    pub dtype: Dtype,
    #[serde(default)]
    pub options: RasterOptions,
    pub shapes: Vec<SceneShape>,
}

impl SceneConfig {
    /// Parses a scene from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ShapesError::io(path, e))?;
        let scene = Self::from_json(&text)?;
        log::debug!(
            "loaded scene {} with {} shapes",
            path.display(),
            scene.shapes.len()
        );
        Ok(scene)
    }

    /// Builds the descriptors in file order, reporting the first bad entry by position.
    pub fn descriptors(&self) -> Result<Vec<ShapeDescriptor>> {
        self.shapes
            .iter()
            .enumerate()
            .map(|(position, shape)| shape.to_descriptor().map_err(|e| e.at_shape(position)))
            .collect()
    }

    /// Assembles the scene.
    pub fn generate(&self) -> Result<AnyVolume> {
        generate(
            self.descriptors()?,
            &self.grid,
            self.policy,
            &self.options,
            self.dtype,
        )
    }
}

#[cfg(test)]
mod tests {
    use basicshapes_core::UVec3;

    use super::*;

    const SCENE: &str = r#"{
        "grid": { "dimensions": [16, 12, 10], "spacing": [1.0, 1.0, 2.0] },
        "policy": "add",
        "dtype": "u16",
        "shapes": [
            { "kind": "sphere", "radius": 3, "center": [8, 6, 10], "label": 5 },
            { "kind": "cylinder", "radius": 2.0, "half_length": 4.0, "center": [8, 6, 10],
              "rotation": { "axis_angle": { "axis": [1, 0, 0], "degrees": 90 } } }
        ]
    }"#;

    #[test]
    fn test_parse_scene() {
        let scene = SceneConfig::from_json(SCENE).unwrap();
        assert_eq!(scene.grid.dimensions, UVec3::new(16, 12, 10));
        assert_eq!(scene.grid.origin, DVec3::ZERO);
        assert_eq!(scene.policy, CompositePolicy::Add);
        assert_eq!(scene.dtype, Dtype::U16);
        assert_eq!(scene.options, RasterOptions::default());
        assert_eq!(scene.shapes.len(), 2);
        assert_eq!(scene.shapes[0].kind, ShapeKind::Sphere { radius: 3.0 });
        assert_eq!(scene.shapes[1].label, 1.0);

        let shapes = scene.descriptors().unwrap();
        assert!(shapes[0].rotation.is_none());
        assert!(shapes[1].rotation.is_some());
    }

    #[test]
    fn test_defaults() {
        let scene = SceneConfig::from_json(
            r#"{ "shapes": [ { "kind": "torus", "major_radius": 10, "minor_radius": 2, "center": [32, 32, 32] } ] }"#,
        )
        .unwrap();
        assert_eq!(scene.grid, GridSpec::default());
        assert_eq!(scene.policy, CompositePolicy::Overwrite);
        assert_eq!(scene.dtype, Dtype::U8);
    }

    #[test]
    fn test_generate_scene() {
        let volume = SceneConfig::from_json(SCENE).unwrap().generate().unwrap();
        assert_eq!(volume.dtype(), Dtype::U16);
        assert_eq!(volume.policy(), CompositePolicy::Add);
        let values: Vec<f64> = volume.histogram().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![0.0, 1.0, 5.0, 6.0]);
    }

    #[test]
    fn test_bad_rotation_reports_position() {
        let scene = SceneConfig::from_json(
            r#"{ "shapes": [
                { "kind": "sphere", "radius": 1, "center": [0, 0, 0] },
                { "kind": "sphere", "radius": 1, "center": [0, 0, 0],
                  "rotation": { "quaternion": [0, 0, 0, 0] } }
            ] }"#,
        )
        .unwrap();
        let err = scene.descriptors().unwrap_err();
        assert!(matches!(err, ShapesError::InvalidShape { index: Some(1), .. }));
    }

    #[test]
    fn test_unknown_kind_and_field_rejected() {
        let unknown_kind =
            r#"{ "shapes": [ { "kind": "cone", "radius": 1, "center": [0, 0, 0] } ] }"#;
        assert!(matches!(
            SceneConfig::from_json(unknown_kind),
            Err(ShapesError::JsonError(_))
        ));
        let unknown_field = r#"{ "shapes": [], "colour": "red" }"#;
        assert!(SceneConfig::from_json(unknown_field).is_err());
    }

    #[test]
    fn test_misspelled_shape_field_rejected() {
        let misspelled = r#"{ "shapes": [ { "kind": "cuboid", "half_extents": [1, 2, 3],
            "center": [4, 4, 4], "rotaton": { "euler_degrees": [0, 0, 30] }, "lable": 7 } ] }"#;
        let err = SceneConfig::from_json(misspelled).unwrap_err();
        assert!(matches!(err, ShapesError::JsonError(_)));
        assert!(err.to_string().contains("rotaton"), "{err}");

        let foreign = r#"{ "shapes": [ { "kind": "sphere", "radius": 2, "radii": [1, 1, 1],
            "center": [4, 4, 4] } ] }"#;
        let err = SceneConfig::from_json(foreign).unwrap_err();
        assert!(err.to_string().contains("sphere does not take 'radii'"), "{err}");

        let missing = r#"{ "shapes": [ { "kind": "torus", "major_radius": 4, "center": [4, 4, 4] } ] }"#;
        let err = SceneConfig::from_json(missing).unwrap_err();
        assert!(err.to_string().contains("torus needs 'minor_radius'"), "{err}");
    }

    #[test]
    fn test_scene_shape_serializes_flat() {
        let scene = SceneConfig::from_json(SCENE).unwrap();
        let text = serde_json::to_string(&scene).unwrap();
        assert!(text.contains(r#""kind":"cylinder""#));
        assert_eq!(SceneConfig::from_json(&text).unwrap(), scene);
    }
}
