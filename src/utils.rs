//! Helper functions

use nalgebra::{Matrix3, Vector3};
use crate::kinematic_traits::Joints;
use crate::rotation::{matrix_to_quaternion, quaternion_xyzw};

/// Convert angles in degrees to joint values in radians
pub fn joints_from_degrees(angles: &[f64]) -> Joints {
    angles.iter().map(|a| a.to_radians()).collect()
}

/// Convert joint values in radians to degrees
pub fn to_degrees(joints: &[f64]) -> Vec<f64> {
    joints.iter().map(|q| q.to_degrees()).collect()
}

// Unbounded limits are shown as "---"
fn format_joints(joints: &[f64]) -> String {
    let row: Vec<String> = joints.iter().map(|q| {
        if q.is_finite() { format!("{:5.2}", q.to_degrees()) } else { format!("{:>5}", "---") }
    }).collect();
    format!("[{}]", row.join(" "))
}

/// Print joint values, converting radians to degrees. Every value is converted, so values
/// of prismatic joints (meters) come out scaled by 180/PI.
pub fn dump_joints(joints: &[f64]) {
    println!("{}", format_joints(joints));
}

/// Print the outcome of an IK call.
pub fn dump_solution(solution: Option<&Joints>) {
    match solution {
        Some(joints) => dump_joints(joints),
        None => println!("No solution"),
    }
}

/// Print position and orientation quaternion (x, y, z, w) of the pose.
pub fn dump_pose(position: &Vector3<f64>, rotation: &Matrix3<f64>) {
    let q = quaternion_xyzw(&matrix_to_quaternion(rotation, true));
    println!("x: {:.5}, y: {:.5}, z: {:.5}, quat: {:.5} {:.5} {:.5} {:.5}",
             position.x, position.y, position.z, q[0], q[1], q[2], q[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_conversion() {
        let joints = joints_from_degrees(&[0.0, 90.0, -180.0]);
        assert!((joints[1] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        let back = to_degrees(&joints);
        assert!((back[2] + 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_format_joints() {
        assert_eq!(format_joints(&[0.0, std::f64::consts::PI]), "[ 0.00 180.00]");
        assert_eq!(format_joints(&[f64::NEG_INFINITY, 0.0, f64::INFINITY]), "[  ---  0.00   ---]");
    }
}
