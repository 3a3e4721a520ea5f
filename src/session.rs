//! Kinematics session: one chain, one solver configuration and the engine bound to them.
//!
//! ```
//! use rs_trac_ik::chain::ChainDescriptor;
//! use rs_trac_ik::config::{SolveType, SolverConfig};
//! use rs_trac_ik::session::KinematicsSession;
//!
//! let urdf = std::fs::read_to_string("src/tests/data/dual_arm.urdf").unwrap();
//! let chain = ChainDescriptor::new("body", "right_tool0", urdf).unwrap();
//! let config = SolverConfig::new(0.1, 1e-5, SolveType::Speed).unwrap();
//! let mut session = KinematicsSession::new(chain, config).unwrap();
//!
//! let seed = vec![0.1; session.dof().unwrap()];
//! let (position, rotation) = session.compute_fk(&seed).unwrap();
//! let solution = session.solve_ik(&position, &rotation, &seed).unwrap();
//! assert!(solution.is_some());
//! session.release().unwrap();
//! ```

extern crate nalgebra as na;

use na::{Matrix3, Matrix4, RowVector4, Vector3};
use tracing::debug;
use crate::chain::ChainDescriptor;
use crate::config::SolverConfig;
use crate::kinematic_traits::{IkEngine, Joints};
use crate::kinematics_error::KinematicsError;
use crate::rotation::matrix_to_quaternion;
use crate::trac_ik::TracIkEngine;

/// Binds chain and solver configuration to an engine. The session is either constructed
/// (engine bound) or released (engine dropped); every call on a released session fails
/// with [`KinematicsError::UseAfterRelease`]. Solving requires exclusive access, so one
/// session serves one caller at a time. Separate sessions share nothing.
#[derive(Debug)]
pub struct KinematicsSession<E: IkEngine = TracIkEngine> {
    descriptor: ChainDescriptor,
    config: SolverConfig,
    dof: usize,
    engine: Option<E>,
}

impl KinematicsSession<TracIkEngine> {
    /// Creates the session with the default engine.
    pub fn new(descriptor: ChainDescriptor, config: SolverConfig) -> Result<Self, KinematicsError> {
        Self::with_engine(descriptor, config)
    }
}

impl<E: IkEngine> KinematicsSession<E> {
    /// Creates the session with the engine of the given type. If anything fails, the
    /// partially built engine is dropped before the error is returned.
    pub fn with_engine(descriptor: ChainDescriptor, config: SolverConfig) -> Result<Self, KinematicsError> {
        let engine = E::create(&descriptor, &config)?;
        let dof = descriptor.fix_degrees_of_freedom(engine.joint_count())?;
        debug!("Session '{}' -> '{}' ready: {} joints, timeout {:?}, epsilon {}, {}",
            descriptor.base_link(), descriptor.tip_link(), dof,
            config.timeout(), config.epsilon(), config.strategy());
        Ok(KinematicsSession {
            descriptor,
            config,
            dof,
            engine: Some(engine),
        })
    }

    fn engine(&self) -> Result<&E, KinematicsError> {
        self.engine.as_ref().ok_or(KinematicsError::UseAfterRelease)
    }

    fn engine_mut(&mut self) -> Result<&mut E, KinematicsError> {
        self.engine.as_mut().ok_or(KinematicsError::UseAfterRelease)
    }

    /// Number of actuated joints between base and tip.
    pub fn dof(&self) -> Result<usize, KinematicsError> {
        self.engine()?;
        Ok(self.dof)
    }

    pub fn descriptor(&self) -> &ChainDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    /// Solves inverse kinematics for the target position and rotation matrix, starting from
    /// the seed. The rotation must be orthonormal. Blocks for at most the configured timeout.
    ///
    /// # Returns
    /// - `Ok(Some(joints))` reaching the target within epsilon.
    /// - `Ok(None)` if no solution has been found in time. This is an expected outcome.
    /// - `Err(Dimension)` if the seed length differs from the degrees of freedom.
    /// - `Err(NonFinite)` if the seed or the target contains NaN or infinity.
    pub fn solve_ik(&mut self, position: &Vector3<f64>, rotation: &Matrix3<f64>, seed: &[f64])
                    -> Result<Option<Joints>, KinematicsError> {
        let dof = self.dof;
        let engine = self.engine_mut()?;
        KinematicsError::check_dimension(dof, seed.len())?;
        KinematicsError::check_finite("seed joint", seed)?;
        KinematicsError::check_finite("target position", position.as_slice())?;
        KinematicsError::check_finite("target rotation", rotation.as_slice())?;

        let orientation = matrix_to_quaternion(rotation, false);
        let solution = engine.solve(seed, position, &orientation);
        match &solution {
            Some(joints) => KinematicsError::check_dimension(dof, joints.len())
                .map_err(|_| KinematicsError::EngineFault(format!(
                    "Solution has {} joints, chain has {}", joints.len(), dof)))?,
            None => debug!("No IK solution for {:?} within {:?}", position.as_slice(), self.config.timeout()),
        }
        Ok(solution)
    }

    /// Computes position and rotation matrix of the tip link for the given joints.
    pub fn compute_fk(&self, joints: &[f64]) -> Result<(Vector3<f64>, Matrix3<f64>), KinematicsError> {
        let engine = self.engine()?;
        KinematicsError::check_dimension(self.dof, joints.len())?;
        KinematicsError::check_finite("joint", joints)?;
        split_homogeneous(&engine.forward_kinematics(joints))
    }

    /// Lower and upper limits of the joints.
    pub fn joint_limits(&self) -> Result<(Vec<f64>, Vec<f64>), KinematicsError> {
        Ok(self.engine()?.joint_limits())
    }

    /// Overrides joint limits taken from the chain document.
    pub fn set_joint_limits(&mut self, lower: &[f64], upper: &[f64]) -> Result<(), KinematicsError> {
        let dof = self.dof;
        let engine = self.engine_mut()?;
        KinematicsError::check_dimension(dof, lower.len())?;
        KinematicsError::check_dimension(dof, upper.len())?;
        engine.set_joint_limits(lower, upper)
    }

    /// Frees the engine. Releasing twice fails with `UseAfterRelease`, the engine is only
    /// dropped once. Dropping the session releases it as well.
    pub fn release(&mut self) -> Result<(), KinematicsError> {
        let engine = self.engine.take().ok_or(KinematicsError::UseAfterRelease)?;
        drop(engine);
        debug!("Session '{}' -> '{}' released", self.descriptor.base_link(), self.descriptor.tip_link());
        Ok(())
    }
}

/// Splits homogeneous transform into translation column and rotation block.
fn split_homogeneous(transform: &Matrix4<f64>) -> Result<(Vector3<f64>, Matrix3<f64>), KinematicsError> {
    if transform.iter().any(|v| !v.is_finite()) {
        return Err(KinematicsError::EngineFault(format!("Non-finite transform {}", transform)));
    }
    if transform.row(3) != RowVector4::new(0.0, 0.0, 0.0, 1.0) {
        return Err(KinematicsError::EngineFault(format!("Not a homogeneous transform {}", transform)));
    }
    let position = transform.fixed_view::<3, 1>(0, 3).into_owned();
    let rotation = transform.fixed_view::<3, 3>(0, 0).into_owned();
    Ok((position, rotation))
}
