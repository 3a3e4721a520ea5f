extern crate nalgebra as na;

use na::{Isometry3, Matrix4, Quaternion, Vector3};
use crate::chain::ChainDescriptor;
use crate::config::SolverConfig;
use crate::kinematics_error::KinematicsError;

/// Pose is used a pose of the chain tip. It contains both Cartesian position and rotation quaternion
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Joint values in chain order (from base to tip), radians for revolute and meters for
/// prismatic joints. The length always equals the degrees of freedom of the chain.
pub type Joints = Vec<f64>;

/// Capability an inverse kinematics engine must provide to be driven by
/// [`KinematicsSession`](crate::session::KinematicsSession). The session validates
/// dimensions before calling, so engines may assume slices of `joint_count()` length.
/// Dropping the engine releases everything it holds.
pub trait IkEngine: Send + Sized {
    /// Builds the engine for the chain between base and tip link of the descriptor.
    fn create(chain: &ChainDescriptor, config: &SolverConfig) -> Result<Self, KinematicsError>;

    /// Number of actuated joints in the chain.
    fn joint_count(&self) -> usize;

    /// Searches joint configuration reaching the target within the configured epsilon and timeout.
    /// The orientation quaternion stores its components as `(x, y, z, w)`.
    /// Returns None if no solution has been found in time.
    fn solve(&mut self, seed: &[f64], position: &Vector3<f64>, orientation: &Quaternion<f64>) -> Option<Joints>;

    /// Homogeneous transform of the tip link in the base link frame.
    fn forward_kinematics(&self, joints: &[f64]) -> Matrix4<f64>;

    /// Lower and upper joint limits. Unbounded joints report infinities.
    fn joint_limits(&self) -> (Vec<f64>, Vec<f64>);

    /// Overrides joint limits read from the chain document.
    fn set_joint_limits(&mut self, lower: &[f64], upper: &[f64]) -> Result<(), KinematicsError>;
}
