//! Rust implementation of numeric inverse and forward kinematics for serial chains of arbitrary
//! length described in URDF, in the style of TRAC-IK.
//!
//! Two local solvers (Newton pseudo-inverse with joint-limit clamping and damped least squares)
//! race against a deadline, restarting from random configurations whenever they stall. Unlike
//! analytical solvers, this works for any chain including redundant (7 joint) arms, at the cost
//! of returning one solution per call and possibly none when the time budget is exhausted.
//!
//! # Features
//!
//! - The kinematic chain is extracted from URDF between any two links of the robot tree.
//!   Fixed joints are folded into the chain, continuous joints are unbounded.
//! - Four strategies to choose among solutions: `Speed` returns the first one, `Distance` the one
//!   closest to the seed, `Manip1` and `Manip2` maximize manipulability measures.
//! - Joint limits can be replaced at run time.
//! - Rotation matrices are converted to canonical quaternions (w >= 0) with a numerically robust
//!   eigenvector method or a faster trace based one.
//! - The session owns its engine and can be released explicitly. Further calls then fail with
//!   [`KinematicsError::UseAfterRelease`] instead of touching freed state.
//!
//! # Example
//!
//! ```
//! use rs_trac_ik::{ChainDescriptor, KinematicsSession, SolveType, SolverConfig};
//!
//! let urdf = std::fs::read_to_string("src/tests/data/dual_arm.urdf").unwrap();
//! let chain = ChainDescriptor::new("body", "left_tool0", urdf).unwrap();
//! let config = SolverConfig::new(0.1, 1e-5, SolveType::Speed).unwrap();
//! let mut session = KinematicsSession::new(chain, config).unwrap();
//!
//! let joints = vec![0.1, 0.5, -0.3, 0.2, 0.4, 1.0];
//! let (position, rotation) = session.compute_fk(&joints).unwrap();
//! let solution = session.solve_ik(&position, &rotation, &joints).unwrap();
//! assert!(solution.is_some());
//! ```

pub mod kinematics_error;
pub mod rotation;
pub mod config;
pub mod chain;
pub mod kinematic_traits;
pub mod kinematic_chain;
pub mod urdf;
pub mod trac_ik;
pub mod session;
pub mod utils;

pub use chain::ChainDescriptor;
pub use config::{SolveType, SolverConfig};
pub use kinematic_traits::{IkEngine, Joints, Pose};
pub use kinematics_error::KinematicsError;
pub use session::KinematicsSession;
pub use trac_ik::TracIkEngine;
