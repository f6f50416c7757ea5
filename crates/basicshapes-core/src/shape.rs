//! Shape descriptors.
//!
//! A [`ShapeDescriptor`] is a tagged variant over the supported primitive kinds.
//! Every kind is defined in its own local frame centred on the origin; the
//! descriptor places it in the world with a centre and an optional rotation.

use std::fmt;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapesError};
use crate::orientation::{rotated_half_extents, validate_quat};

/// Relative padding applied to world bounding boxes so rounding in the
/// rotation never drops a voxel that passes the inclusion test.
const BOUNDS_PADDING: f64 = 1e-9;

/// Geometric primitive kinds and their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeKind {
    /// Ball of the given radius.
    Sphere { radius: f64 },
    /// Axis-aligned (in the local frame) ellipsoid with per-axis radii.
    Ellipsoid { radii: [f64; 3] },
    /// Finite cylinder along the local Z axis.
    Cylinder { radius: f64, half_length: f64 },
    /// Box with per-axis half extents.
    Cuboid { half_extents: [f64; 3] },
    /// Ring in the local XY plane.
    Torus { major_radius: f64, minor_radius: f64 },
    /// Cylinder with hemispherical caps, core segment along the local Z axis.
    Capsule { radius: f64, half_length: f64 },
}

impl ShapeKind {
    /// Names of all kinds as used in files and on the command line.
    pub const NAMES: [&'static str; 6] = [
        "sphere",
        "ellipsoid",
        "cylinder",
        "cuboid",
        "torus",
        "capsule",
    ];

    /// Lowercase kind name.
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Sphere { .. } => "sphere",
            ShapeKind::Ellipsoid { .. } => "ellipsoid",
            ShapeKind::Cylinder { .. } => "cylinder",
            ShapeKind::Cuboid { .. } => "cuboid",
            ShapeKind::Torus { .. } => "torus",
            ShapeKind::Capsule { .. } => "capsule",
        }
    }

    /// Flat parameter list, in declaration order.
    pub fn parameters(&self) -> Vec<f64> {
        match *self {
            ShapeKind::Sphere { radius } => vec![radius],
            ShapeKind::Ellipsoid { radii } => radii.to_vec(),
            ShapeKind::Cylinder {
                radius,
                half_length,
            }
            | ShapeKind::Capsule {
                radius,
                half_length,
            } => vec![radius, half_length],
            ShapeKind::Cuboid { half_extents } => half_extents.to_vec(),
            ShapeKind::Torus {
                major_radius,
                minor_radius,
            } => vec![major_radius, minor_radius],
        }
    }

    /// Rebuilds a kind from its name and [`ShapeKind::parameters`].
    pub fn from_parameters(name: &str, params: &[f64]) -> Result<Self> {
        let expect = |n: usize| -> Result<()> {
            if params.len() == n {
                Ok(())
            } else {
                Err(ShapesError::invalid_shape(format!(
                    "{name} takes {n} parameters, got {}",
                    params.len()
                )))
            }
        };
        let kind = match name {
            "sphere" => {
                expect(1)?;
                ShapeKind::Sphere { radius: params[0] }
            }
            "ellipsoid" => {
                expect(3)?;
                ShapeKind::Ellipsoid {
                    radii: [params[0], params[1], params[2]],
                }
            }
            "cylinder" => {
                expect(2)?;
                ShapeKind::Cylinder {
                    radius: params[0],
                    half_length: params[1],
                }
            }
            "cuboid" => {
                expect(3)?;
                ShapeKind::Cuboid {
                    half_extents: [params[0], params[1], params[2]],
                }
            }
            "torus" => {
                expect(2)?;
                ShapeKind::Torus {
                    major_radius: params[0],
                    minor_radius: params[1],
                }
            }
            "capsule" => {
                expect(2)?;
                ShapeKind::Capsule {
                    radius: params[0],
                    half_length: params[1],
                }
            }
            other => {
                return Err(ShapesError::invalid_shape(format!(
                    "unknown shape kind '{other}'"
                )))
            }
        };
        Ok(kind)
    }

    /// Checks that every extent is finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let labels: &[&str] = match self {
            ShapeKind::Sphere { .. } => &["radius"],
            ShapeKind::Ellipsoid { .. } => &["radius x", "radius y", "radius z"],
            ShapeKind::Cylinder { .. } | ShapeKind::Capsule { .. } => &["radius", "half length"],
            ShapeKind::Cuboid { .. } => &["half extent x", "half extent y", "half extent z"],
            ShapeKind::Torus { .. } => &["major radius", "minor radius"],
        };
        for (label, value) in labels.iter().zip(self.parameters()) {
            if !value.is_finite() || value <= 0.0 {
                return Err(ShapesError::invalid_shape(format!(
                    "{} {label} must be finite and positive, got {value}",
                    self.name()
                )));
            }
        }
        Ok(())
    }

    /// Inclusion test in the shape's local frame.
    pub fn contains_local(&self, p: DVec3) -> bool {
        match *self {
            ShapeKind::Sphere { radius } => p.length_squared() <= radius * radius,
            ShapeKind::Ellipsoid { radii } => (p / DVec3::from_array(radii)).length_squared() <= 1.0,
            ShapeKind::Cylinder {
                radius,
                half_length,
            } => p.x * p.x + p.y * p.y <= radius * radius && p.z.abs() <= half_length,
            ShapeKind::Cuboid { half_extents } => {
                p.abs().cmple(DVec3::from_array(half_extents)).all()
            }
            ShapeKind::Torus {
                major_radius,
                minor_radius,
            } => {
                let ring = (p.x * p.x + p.y * p.y).sqrt() - major_radius;
                ring * ring + p.z * p.z <= minor_radius * minor_radius
            }
            ShapeKind::Capsule {
                radius,
                half_length,
            } => {
                let axial = p.z.clamp(-half_length, half_length);
                let d = DVec3::new(p.x, p.y, p.z - axial);
                d.length_squared() <= radius * radius
            }
        }
    }

    /// Half extents of the local-frame bounding box.
    pub fn local_half_extents(&self) -> DVec3 {
        match *self {
            ShapeKind::Sphere { radius } => DVec3::splat(radius),
            ShapeKind::Ellipsoid { radii } => DVec3::from_array(radii),
            ShapeKind::Cylinder {
                radius,
                half_length,
            } => DVec3::new(radius, radius, half_length),
            ShapeKind::Cuboid { half_extents } => DVec3::from_array(half_extents),
            ShapeKind::Torus {
                major_radius,
                minor_radius,
            } => DVec3::new(
                major_radius + minor_radius,
                major_radius + minor_radius,
                minor_radius,
            ),
            ShapeKind::Capsule {
                radius,
                half_length,
            } => DVec3::new(radius, radius, half_length + radius),
        }
    }
}

/// A primitive placed in the world with a label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    /// Kind and kind-specific parameters.
    #[serde(flatten)]
    pub kind: ShapeKind,
    /// World position of the local origin.
    pub center: DVec3,
    /// Rotation from the local frame into the world, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<DQuat>,
    /// Value written into covered voxels.
    pub label: f64,
}

impl ShapeDescriptor {
    /// Creates an unrotated descriptor.
    pub fn new(kind: ShapeKind, center: DVec3, label: f64) -> Self {
        Self {
            kind,
            center,
            rotation: None,
            label,
        }
    }

    /// Sphere of `radius` at `center`.
    pub fn sphere(center: DVec3, radius: f64, label: f64) -> Self {
        Self::new(ShapeKind::Sphere { radius }, center, label)
    }

    /// Ellipsoid with per-axis `radii` at `center`.
    pub fn ellipsoid(center: DVec3, radii: DVec3, label: f64) -> Self {
        Self::new(
            ShapeKind::Ellipsoid {
                radii: radii.to_array(),
            },
            center,
            label,
        )
    }

    /// Cylinder along Z with `radius` and `half_length` at `center`.
    pub fn cylinder(center: DVec3, radius: f64, half_length: f64, label: f64) -> Self {
        Self::new(
            ShapeKind::Cylinder {
                radius,
                half_length,
            },
            center,
            label,
        )
    }

    /// Box with `half_extents` at `center`.
    pub fn cuboid(center: DVec3, half_extents: DVec3, label: f64) -> Self {
        Self::new(
            ShapeKind::Cuboid {
                half_extents: half_extents.to_array(),
            },
            center,
            label,
        )
    }

    /// Torus in the XY plane at `center`.
    pub fn torus(center: DVec3, major_radius: f64, minor_radius: f64, label: f64) -> Self {
        Self::new(
            ShapeKind::Torus {
                major_radius,
                minor_radius,
            },
            center,
            label,
        )
    }

    /// Capsule along Z at `center`.
    pub fn capsule(center: DVec3, radius: f64, half_length: f64, label: f64) -> Self {
        Self::new(
            ShapeKind::Capsule {
                radius,
                half_length,
            },
            center,
            label,
        )
    }

    /// Sets the rotation from the local frame into the world.
    #[must_use]
    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// Checks extents, centre, rotation and label. Called before any allocation.
    pub fn validate(&self) -> Result<()> {
        self.kind.validate()?;
        if !self.center.is_finite() {
            return Err(ShapesError::invalid_shape(format!(
                "{} center must be finite",
                self.kind.name()
            )));
        }
        if let Some(q) = self.rotation {
            validate_quat(q)?;
        }
        if !self.label.is_finite() {
            return Err(ShapesError::invalid_shape(format!(
                "{} label must be finite",
                self.kind.name()
            )));
        }
        Ok(())
    }

    /// Maps a world point into the shape's local frame.
    pub fn to_local(&self, p: DVec3) -> DVec3 {
        let offset = p - self.center;
        match self.rotation {
            Some(q) => q.inverse() * offset,
            None => offset,
        }
    }

    /// Inclusion test for a world point.
    pub fn contains_world(&self, p: DVec3) -> bool {
        self.kind.contains_local(self.to_local(p))
    }

    /// World-space axis-aligned bounding box `(min, max)`.
    pub fn world_bounds(&self) -> (DVec3, DVec3) {
        let local = self.kind.local_half_extents();
        let half = match self.rotation {
            Some(q) => rotated_half_extents(q, local),
            None => local,
        };
        let half = half + (half + self.center.abs() + DVec3::ONE) * BOUNDS_PADDING;
        (self.center - half, self.center + half)
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} at {} label {}",
            self.kind.name(),
            self.kind.parameters(),
            self.center,
            self.label
        )?;
        if let Some(q) = self.rotation {
            write!(f, " rotated {q}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_positive_extents() {
        assert!(ShapeDescriptor::sphere(DVec3::ZERO, 0.0, 1.0).validate().is_err());
        assert!(ShapeDescriptor::sphere(DVec3::ZERO, -1.0, 1.0).validate().is_err());
        assert!(
            ShapeDescriptor::cuboid(DVec3::ZERO, DVec3::new(1.0, 0.0, 1.0), 1.0)
                .validate()
                .is_err()
        );
        assert!(ShapeDescriptor::cylinder(DVec3::ZERO, 1.0, f64::NAN, 1.0)
            .validate()
            .is_err());
        assert!(ShapeDescriptor::torus(DVec3::ZERO, 3.0, 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_center_label_rotation() {
        let s = ShapeDescriptor::sphere(DVec3::new(f64::INFINITY, 0.0, 0.0), 1.0, 1.0);
        assert!(s.validate().is_err());
        let s = ShapeDescriptor::sphere(DVec3::ZERO, 1.0, f64::NAN);
        assert!(s.validate().is_err());
        let s = ShapeDescriptor::sphere(DVec3::ZERO, 1.0, 1.0)
            .with_rotation(DQuat::from_xyzw(0.0, 0.0, 0.0, 3.0));
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_error_message_names_parameter() {
        let err = ShapeDescriptor::capsule(DVec3::ZERO, 1.0, -2.0, 1.0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("capsule half length"));
    }

    #[test]
    fn test_sphere_predicate() {
        let s = ShapeDescriptor::sphere(DVec3::splat(5.0), 2.0, 1.0);
        assert!(s.contains_world(DVec3::new(7.0, 5.0, 5.0)));
        assert!(!s.contains_world(DVec3::new(7.0, 6.0, 5.0)));
    }

    #[test]
    fn test_cylinder_predicate() {
        let s = ShapeDescriptor::cylinder(DVec3::ZERO, 1.0, 2.0, 1.0);
        assert!(s.contains_world(DVec3::new(0.0, 1.0, 2.0)));
        assert!(!s.contains_world(DVec3::new(0.0, 0.0, 2.1)));
        assert!(!s.contains_world(DVec3::new(0.8, 0.8, 0.0)));
    }

    #[test]
    fn test_rotated_cylinder_lies_along_x() {
        let q = DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2);
        let s = ShapeDescriptor::cylinder(DVec3::ZERO, 0.5, 3.0, 1.0).with_rotation(q);
        assert!(s.contains_world(DVec3::new(2.9, 0.0, 0.0)));
        assert!(!s.contains_world(DVec3::new(0.0, 0.0, 2.9)));
    }

    #[test]
    fn test_torus_predicate() {
        let s = ShapeDescriptor::torus(DVec3::ZERO, 3.0, 1.0, 1.0);
        assert!(s.contains_world(DVec3::new(3.0, 0.0, 0.0)));
        assert!(s.contains_world(DVec3::new(0.0, -4.0, 0.0)));
        assert!(!s.contains_world(DVec3::ZERO));
        assert!(!s.contains_world(DVec3::new(3.0, 0.0, 1.5)));
    }

    #[test]
    fn test_capsule_predicate() {
        let s = ShapeDescriptor::capsule(DVec3::ZERO, 1.0, 2.0, 1.0);
        assert!(s.contains_world(DVec3::new(0.0, 0.0, 3.0)));
        assert!(!s.contains_world(DVec3::new(0.0, 0.8, 2.8)));
        assert!(s.contains_world(DVec3::new(1.0, 0.0, -2.0)));
    }

    #[test]
    fn test_ellipsoid_predicate() {
        let s = ShapeDescriptor::ellipsoid(DVec3::ZERO, DVec3::new(4.0, 2.0, 1.0), 1.0);
        assert!(s.contains_world(DVec3::new(4.0, 0.0, 0.0)));
        assert!(!s.contains_world(DVec3::new(0.0, 3.0, 0.0)));
    }

    #[test]
    fn test_parameters_roundtrip_through_names() {
        let kinds = [
            ShapeKind::Sphere { radius: 1.0 },
            ShapeKind::Ellipsoid {
                radii: [1.0, 2.0, 3.0],
            },
            ShapeKind::Cylinder {
                radius: 1.0,
                half_length: 2.0,
            },
            ShapeKind::Cuboid {
                half_extents: [1.0, 2.0, 3.0],
            },
            ShapeKind::Torus {
                major_radius: 3.0,
                minor_radius: 1.0,
            },
            ShapeKind::Capsule {
                radius: 1.0,
                half_length: 2.0,
            },
        ];
        for kind in kinds {
            let back = ShapeKind::from_parameters(kind.name(), &kind.parameters()).unwrap();
            assert_eq!(back, kind);
        }
        assert_eq!(kinds.len(), ShapeKind::NAMES.len());
        assert!(ShapeKind::from_parameters("cone", &[1.0]).is_err());
        assert!(ShapeKind::from_parameters("sphere", &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_world_bounds_follow_rotation() {
        let q = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let s = ShapeDescriptor::cuboid(DVec3::ZERO, DVec3::new(3.0, 1.0, 1.0), 1.0)
            .with_rotation(q);
        let (min, max) = s.world_bounds();
        assert!((max.x - 1.0).abs() < 1e-6);
        assert!((max.y - 3.0).abs() < 1e-6);
        assert!((min.y + 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_serde_uses_kind_tag() {
        let s = ShapeDescriptor::sphere(DVec3::new(1.0, 2.0, 3.0), 2.5, 7.0);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"kind\":\"sphere\""));
        let back: ShapeDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
