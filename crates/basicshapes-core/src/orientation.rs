//! Shape orientation.
//!
//! Users describe rotations in whichever form is convenient; everything is
//! normalised into a unit [`DQuat`] before rasterization.

use glam::{DMat3, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapesError};

/// Tolerance for unit-length and orthonormality checks.
pub const ORIENTATION_TOLERANCE: f64 = 1e-6;

/// A rotation as written in a scene file or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Quaternion components `[x, y, z, w]`; normalised on conversion.
    Quaternion([f64; 4]),
    /// Row-major 3x3 rotation matrix. Must be orthonormal with determinant +1.
    Matrix([[f64; 3]; 3]),
    /// Intrinsic XYZ Euler angles in degrees.
    EulerDegrees([f64; 3]),
    /// Rotation of `degrees` about `axis`.
    AxisAngle { axis: [f64; 3], degrees: f64 },
}

impl Rotation {
    /// Converts to a unit quaternion, rejecting malformed input with `InvalidShape`.
    pub fn to_quat(&self) -> Result<DQuat> {
        match *self {
            Rotation::Quaternion([x, y, z, w]) => {
                let q = DQuat::from_xyzw(x, y, z, w);
                let len = q.length();
                if !q.is_finite() || len < ORIENTATION_TOLERANCE {
                    return Err(ShapesError::invalid_shape(
                        "rotation quaternion must be finite and non-zero",
                    ));
                }
                Ok(q / len)
            }
            Rotation::Matrix(rows) => {
                let m = DMat3::from_cols_array_2d(&rows).transpose();
                if !m.is_finite() {
                    return Err(ShapesError::invalid_shape("rotation matrix must be finite"));
                }
                let gram = m * m.transpose();
                if !gram.abs_diff_eq(DMat3::IDENTITY, ORIENTATION_TOLERANCE)
                    || (m.determinant() - 1.0).abs() > ORIENTATION_TOLERANCE
                {
                    return Err(ShapesError::invalid_shape(
                        "rotation matrix must be orthonormal with determinant 1",
                    ));
                }
                Ok(DQuat::from_mat3(&m).normalize())
            }
            Rotation::EulerDegrees([x, y, z]) => {
                if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                    return Err(ShapesError::invalid_shape("Euler angles must be finite"));
                }
                Ok(DQuat::from_euler(
                    EulerRot::XYZ,
                    x.to_radians(),
                    y.to_radians(),
                    z.to_radians(),
                ))
            }
            Rotation::AxisAngle { axis, degrees } => {
                let axis = DVec3::from_array(axis);
                if !axis.is_finite() || !degrees.is_finite() || axis.length() < ORIENTATION_TOLERANCE
                {
                    return Err(ShapesError::invalid_shape(
                        "rotation axis must be finite and non-zero",
                    ));
                }
                Ok(DQuat::from_axis_angle(axis.normalize(), degrees.to_radians()))
            }
        }
    }
}

/// Checks that a stored quaternion is usable as an orientation.
pub fn validate_quat(q: DQuat) -> Result<()> {
    if !q.is_finite() || (q.length() - 1.0).abs() > ORIENTATION_TOLERANCE {
        return Err(ShapesError::invalid_shape(
            "rotation must be a finite unit quaternion",
        ));
    }
    Ok(())
}

/// Half extents of the world-space box enclosing a local box of half extents
/// `half` after rotation by `q`.
pub fn rotated_half_extents(q: DQuat, half: DVec3) -> DVec3 {
    let m = DMat3::from_quat(q);
    DVec3::new(
        m.row(0).abs().dot(half),
        m.row(1).abs().dot(half),
        m.row(2).abs().dot(half),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quaternion_is_normalised() {
        let q = Rotation::Quaternion([0.0, 0.0, 0.0, 2.0]).to_quat().unwrap();
        assert!((q.length() - 1.0).abs() < 1e-12);
        assert!(q.abs_diff_eq(DQuat::IDENTITY, 1e-12));
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        assert!(Rotation::Quaternion([0.0; 4]).to_quat().is_err());
    }

    #[test]
    fn test_euler_z_quarter_turn() {
        let q = Rotation::EulerDegrees([0.0, 0.0, 90.0]).to_quat().unwrap();
        let v = q * DVec3::X;
        assert!(v.abs_diff_eq(DVec3::Y, 1e-12));
    }

    #[test]
    fn test_matrix_matches_euler() {
        // Row-major quarter turn about Z: x -> y.
        let rows = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let from_matrix = Rotation::Matrix(rows).to_quat().unwrap();
        let from_euler = Rotation::EulerDegrees([0.0, 0.0, 90.0]).to_quat().unwrap();
        assert!((from_matrix.dot(from_euler).abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_orthonormal_matrix_rejected() {
        let rows = [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(Rotation::Matrix(rows).to_quat().is_err());
        let mirror = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(Rotation::Matrix(mirror).to_quat().is_err());
    }

    #[test]
    fn test_axis_angle() {
        let q = Rotation::AxisAngle {
            axis: [0.0, 0.0, 3.0],
            degrees: 180.0,
        }
        .to_quat()
        .unwrap();
        assert!((q * DVec3::X).abs_diff_eq(-DVec3::X, 1e-12));
        assert!(Rotation::AxisAngle {
            axis: [0.0; 3],
            degrees: 10.0
        }
        .to_quat()
        .is_err());
    }

    #[test]
    fn test_validate_quat() {
        assert!(validate_quat(DQuat::IDENTITY).is_ok());
        assert!(validate_quat(DQuat::from_xyzw(0.0, 0.0, 0.0, 2.0)).is_err());
        assert!(validate_quat(DQuat::from_xyzw(f64::NAN, 0.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_rotated_half_extents_quarter_turn_swaps_axes() {
        let q = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let h = rotated_half_extents(q, DVec3::new(3.0, 1.0, 2.0));
        assert!(h.abs_diff_eq(DVec3::new(1.0, 3.0, 2.0), 1e-12));
    }

    mod prop {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn rotated_corners_stay_inside_box(
                euler in [-180.0f64..180.0, -180.0f64..180.0, -180.0f64..180.0],
                half in [0.1f64..10.0, 0.1f64..10.0, 0.1f64..10.0],
            ) {
                let q = Rotation::EulerDegrees(euler).to_quat().unwrap();
                prop_assert!(validate_quat(q).is_ok());
                let half = DVec3::from_array(half);
                let bound = rotated_half_extents(q, half) + DVec3::splat(1e-9);
                for corner in 0..8u32 {
                    let sign = DVec3::new(
                        if corner & 1 == 0 { -1.0 } else { 1.0 },
                        if corner & 2 == 0 { -1.0 } else { 1.0 },
                        if corner & 4 == 0 { -1.0 } else { 1.0 },
                    );
                    let p = (q * (sign * half)).abs();
                    prop_assert!(p.cmple(bound).all(), "{p} outside {bound}");
                }
            }
        }
    }
}
