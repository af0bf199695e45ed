//! Rotation-vector quaternion to roll/pitch/yaw.
//!
//! The matrix layout and the azimuth/pitch/roll extraction follow the
//! platform sensor-manager conventions: a row-major 3x3 rotation matrix
//! built from `(x, y, z, w)`, then
//! `azimuth = atan2(R[1], R[4])`, `pitch = asin(-R[7])`,
//! `roll = atan2(-R[6], R[8])`.

use crate::error::{MotionError, MotionResult};
use crate::models::EulerAngles;

/// Converts a 3- or 4-component rotation vector into Euler angles.
///
/// A missing `w` is reconstructed as `sqrt(max(0, 1 - x² - y² - z²))`.
pub fn resolve(rotation_vector: &[f32]) -> MotionResult<EulerAngles> {
    let quaternion = complete_quaternion(rotation_vector)?;
    let matrix = rotation_matrix(quaternion);
    let [azimuth, pitch, roll] = orientation_from_matrix(&matrix);

    Ok(EulerAngles {
        roll,
        pitch,
        yaw: azimuth,
    })
}

/// Returns `[x, y, z, w]`.
pub fn complete_quaternion(rotation_vector: &[f32]) -> MotionResult<[f32; 4]> {
    match *rotation_vector {
        [x, y, z, w] => Ok([x, y, z, w]),
        [x, y, z] => {
            let radicand = 1.0 - (x * x + y * y + z * z);
            let w = if radicand > 0.0 { radicand.sqrt() } else { 0.0 };
            Ok([x, y, z, w])
        }
        _ => Err(MotionError::InvalidInput(format!(
            "rotation vector must have 3 or 4 components, got {}",
            rotation_vector.len()
        ))),
    }
}

/// Row-major 3x3 rotation matrix for the quaternion `[x, y, z, w]`.
pub fn rotation_matrix([q1, q2, q3, q0]: [f32; 4]) -> [f32; 9] {
    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    [
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    ]
}

/// `[azimuth, pitch, roll]` in radians.
pub fn orientation_from_matrix(r: &[f32; 9]) -> [f32; 3] {
    // Float error can push |R[7]| slightly past 1 near gimbal lock.
    let sin_pitch = (-r[7]).clamp(-1.0, 1.0);
    [r[1].atan2(r[4]), sin_pitch.asin(), (-r[6]).atan2(r[8])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    fn half_angle(axis: [f32; 3], angle: f32) -> [f32; 4] {
        let s = (angle / 2.0).sin();
        [axis[0] * s, axis[1] * s, axis[2] * s, (angle / 2.0).cos()]
    }

    #[test]
    fn test_identity_is_level() {
        let angles = resolve(&[0.0, 0.0, 0.0, 1.0]).unwrap();
        assert_abs_diff_eq!(angles.roll, 0.0);
        assert_abs_diff_eq!(angles.pitch, 0.0);
        assert_abs_diff_eq!(angles.yaw, 0.0);
    }

    #[test]
    fn test_missing_w_reconstructs_unit_quaternion() {
        for q in [
            half_angle([0.0, 0.0, 1.0], 0.7),
            half_angle([1.0, 0.0, 0.0], -1.2),
            half_angle([0.0, 0.6, 0.8], 2.0),
        ] {
            let [x, y, z, w] = complete_quaternion(&q[..3]).unwrap();
            assert_abs_diff_eq!(x * x + y * y + z * z + w * w, 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(w, q[3].abs(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_negative_radicand_clamps_to_zero() {
        let [_, _, _, w] = complete_quaternion(&[0.9, 0.9, 0.0]).unwrap();
        assert_eq!(w, 0.0);
    }

    #[test]
    fn test_yaw_about_z_axis() {
        // Azimuth is measured clockwise, so a positive rotation about +z
        // shows up as a negative yaw.
        let angles = resolve(&half_angle([0.0, 0.0, 1.0], 0.5)).unwrap();
        assert_abs_diff_eq!(angles.yaw, -0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(angles.pitch, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(angles.roll, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_pitch_and_roll_axes() {
        let pitched = resolve(&half_angle([1.0, 0.0, 0.0], 0.4)).unwrap();
        assert_abs_diff_eq!(pitched.pitch, -0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(pitched.roll, 0.0, epsilon = 1e-5);

        let rolled = resolve(&half_angle([0.0, 1.0, 0.0], 0.3)).unwrap();
        assert_abs_diff_eq!(rolled.roll, 0.3, epsilon = 1e-5);
        assert_abs_diff_eq!(rolled.pitch, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_gimbal_lock_stays_finite() {
        let angles = resolve(&half_angle([1.0, 0.0, 0.0], -FRAC_PI_2)).unwrap();
        assert!(angles.pitch.is_finite());
        assert_abs_diff_eq!(angles.pitch, FRAC_PI_2, epsilon = 1e-3);
    }

    #[test]
    fn test_malformed_length_rejected() {
        let err = resolve(&[0.1, 0.2]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
        assert!(resolve(&[0.0; 5]).is_err());
    }
}
