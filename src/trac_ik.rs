//! Default inverse kinematics engine, modelled after TRAC-IK.
//!
//! Two local solvers race against the same deadline: a Newton solver using the pseudo-inverse
//! of the Jacobian with joint-limit clamping, and a damped least squares solver with adaptive
//! damping. Whenever a local search stalls, it restarts from a random configuration inside the
//! joint limits. With [`SolveType::Speed`] the first solution wins; other strategies keep
//! collecting distinct solutions until the timeout and return the best one for their objective.

extern crate nalgebra as na;

use std::f64::consts::PI;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use na::{DMatrix, DVector, Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3, SVD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;
use crate::chain::ChainDescriptor;
use crate::config::{SolveType, SolverConfig};
use crate::kinematic_chain::{Chain, JointKind};
use crate::kinematic_traits::{IkEngine, Joints, Pose};
use crate::kinematics_error::KinematicsError;
use crate::urdf::parse_urdf;

/// Iterations of one local search before it is considered stuck.
const MAX_ITERATIONS: usize = 100;

/// Steps shorter than this mean the local search makes no progress.
const MIN_STEP: f64 = 1e-12;

/// Joint values closer than this are the same solution.
const SAME_SOLUTION: f64 = 1e-4;

/// Singular values below this are ignored by the pseudo-inverse.
const PSEUDO_INVERSE_EPS: f64 = 1e-10;

const INITIAL_DAMPING: f64 = 1e-2;
const MIN_DAMPING: f64 = 1e-8;
const MAX_DAMPING: f64 = 1e3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Newton,
    DampedLeastSquares,
}

#[derive(Debug)]
pub struct TracIkEngine {
    chain: Chain,
    config: SolverConfig,
    rng: StdRng,
}

impl TracIkEngine {
    pub fn new(chain: Chain, config: SolverConfig) -> Self {
        TracIkEngine {
            chain,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixes the seed of random restarts, for reproducible searches.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Searches the joint configuration for the given target pose.
    pub fn solve_pose(&mut self, seed: &[f64], target: &Pose) -> Option<Joints> {
        let search = Search {
            chain: &self.chain,
            target: *target,
            seed,
            epsilon: self.config.epsilon(),
            strategy: self.config.strategy(),
            // None if the timeout reaches past what Instant can represent
            deadline: Instant::now().checked_add(self.config.timeout()),
            stop: AtomicBool::new(false),
            found: Mutex::new(Vec::new()),
        };
        let newton_seed: u64 = self.rng.r#gen();
        let dls_seed: u64 = self.rng.r#gen();

        std::thread::scope(|scope| {
            scope.spawn(|| search.run(Method::DampedLeastSquares, dls_seed));
            search.run(Method::Newton, newton_seed);
        });

        let solutions = search.found.into_inner().unwrap_or_else(|e| e.into_inner());
        debug!("{} solution(s) found with {} strategy", solutions.len(), self.config.strategy());
        select(&self.chain, self.config.strategy(), seed, solutions)
    }
}

impl IkEngine for TracIkEngine {
    fn create(chain: &ChainDescriptor, config: &SolverConfig) -> Result<Self, KinematicsError> {
        let model = parse_urdf(chain.chain_document())?;
        let extracted = model.extract_chain(chain.base_link(), chain.tip_link())?;
        debug!("Chain '{}' -> '{}' of robot '{}': joints {:?}",
            chain.base_link(), chain.tip_link(), model.name, extracted.joint_names());
        Ok(TracIkEngine::new(extracted, *config))
    }

    fn joint_count(&self) -> usize {
        self.chain.dof()
    }

    fn solve(&mut self, seed: &[f64], position: &Vector3<f64>, orientation: &Quaternion<f64>) -> Option<Joints> {
        let target = Pose::from_parts(
            Translation3::from(*position),
            UnitQuaternion::from_quaternion(*orientation),
        );
        self.solve_pose(seed, &target)
    }

    fn forward_kinematics(&self, joints: &[f64]) -> Matrix4<f64> {
        self.chain.forward(joints).to_homogeneous()
    }

    fn joint_limits(&self) -> (Vec<f64>, Vec<f64>) {
        self.chain.limits()
    }

    fn set_joint_limits(&mut self, lower: &[f64], upper: &[f64]) -> Result<(), KinematicsError> {
        KinematicsError::check_dimension(self.chain.dof(), lower.len())?;
        KinematicsError::check_dimension(self.chain.dof(), upper.len())?;
        for (i, (l, u)) in lower.iter().zip(upper).enumerate() {
            // Also rejects NaN
            if !(l <= u) {
                return Err(KinematicsError::configuration(format!(
                    "Joint {}: lower limit {} is not below upper limit {}", i, l, u)));
            }
        }
        self.chain.set_limits(lower, upper);
        Ok(())
    }
}

/// State shared by both racing solvers of one IK call.
struct Search<'a> {
    chain: &'a Chain,
    target: Pose,
    seed: &'a [f64],
    epsilon: f64,
    strategy: SolveType,
    deadline: Option<Instant>,
    stop: AtomicBool,
    found: Mutex<Vec<Joints>>,
}

impl Search<'_> {
    fn finished(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn run(&self, method: Method, random_seed: u64) {
        let mut rng = StdRng::seed_from_u64(random_seed);
        let mut qs = self.clamped(self.seed.to_vec());
        loop {
            if let Some(solution) = self.local_search(method, qs) {
                let solution = self.unwrapped(solution);
                self.record(solution);
                if self.strategy.first_found() {
                    self.stop.store(true, Ordering::Relaxed);
                }
            }
            if self.finished() {
                return;
            }
            qs = self.random_configuration(&mut rng);
        }
    }

    /// Twist from the current pose to the target: linear part first, then angular.
    fn error(&self, pose: &Pose) -> (Vector3<f64>, Vector3<f64>) {
        let linear = self.target.translation.vector - pose.translation.vector;
        let angular = (self.target.rotation * pose.rotation.inverse()).scaled_axis();
        (linear, angular)
    }

    fn converged(&self, error: &(Vector3<f64>, Vector3<f64>)) -> bool {
        error.0.norm() <= self.epsilon && error.1.norm() <= self.epsilon
    }

    fn local_search(&self, method: Method, mut qs: Joints) -> Option<Joints> {
        let (pose, mut jacobian) = self.chain.forward_with_jacobian(&qs);
        let mut error = self.error(&pose);
        let mut damping = INITIAL_DAMPING;

        for _ in 0..MAX_ITERATIONS {
            if self.converged(&error) {
                return Some(qs);
            }
            if self.finished() {
                return None;
            }
            let twist = DVector::from_iterator(6, error.0.iter().chain(error.1.iter()).copied());
            let step = match method {
                Method::Newton => newton_step(&jacobian, &twist)?,
                Method::DampedLeastSquares => damped_step(&jacobian, &twist, damping)?,
            };
            if step.norm() < MIN_STEP {
                return None;
            }

            let candidate = self.clamped(qs.iter().zip(step.iter()).map(|(q, d)| q + d).collect());
            let (candidate_pose, candidate_jacobian) = self.chain.forward_with_jacobian(&candidate);
            let candidate_error = self.error(&candidate_pose);

            if method == Method::DampedLeastSquares {
                if weight(&candidate_error) >= weight(&error) {
                    damping *= 10.0;
                    if damping > MAX_DAMPING {
                        return None;
                    }
                    continue;
                }
                damping = (damping * 0.5).max(MIN_DAMPING);
            } else if candidate.iter().zip(&qs).all(|(a, b)| (a - b).abs() < MIN_STEP) {
                // Clamped against joint limits
                return None;
            }

            qs = candidate;
            jacobian = candidate_jacobian;
            error = candidate_error;
        }
        if self.converged(&error) { Some(qs) } else { None }
    }

    fn clamped(&self, mut qs: Joints) -> Joints {
        for (q, joint) in qs.iter_mut().zip(self.chain.joints()) {
            *q = q.clamp(joint.lower, joint.upper);
        }
        qs
    }

    /// Joints without limits are brought within PI of the seed.
    fn unwrapped(&self, mut qs: Joints) -> Joints {
        for ((q, joint), seed) in qs.iter_mut().zip(self.chain.joints()).zip(self.seed) {
            let revolute = matches!(joint.kind, JointKind::Revolute | JointKind::Continuous);
            if revolute && !joint.is_bounded() {
                *q = seed + normalize_angle(*q - seed);
            }
        }
        qs
    }

    fn random_configuration(&self, rng: &mut StdRng) -> Joints {
        self.chain.joints().zip(self.seed).map(|(joint, &seed)| {
            if joint.is_bounded() {
                rng.gen_range(joint.lower..=joint.upper)
            } else if joint.kind == JointKind::Prismatic {
                seed
            } else {
                rng.gen_range(-PI..=PI)
            }
        }).collect()
    }

    fn record(&self, solution: Joints) {
        let mut found = self.found.lock().unwrap_or_else(|e| e.into_inner());
        let duplicate = found.iter().any(|known| {
            known.iter().zip(&solution).all(|(a, b)| (a - b).abs() < SAME_SOLUTION)
        });
        if !duplicate {
            found.push(solution);
        }
    }
}

fn weight(error: &(Vector3<f64>, Vector3<f64>)) -> f64 {
    error.0.norm_squared() + error.1.norm_squared()
}

fn newton_step(jacobian: &DMatrix<f64>, twist: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = SVD::new(jacobian.clone(), true, true);
    svd.pseudo_inverse(PSEUDO_INVERSE_EPS).ok().map(|inverse| inverse * twist)
}

fn damped_step(jacobian: &DMatrix<f64>, twist: &DVector<f64>, damping: f64) -> Option<DVector<f64>> {
    let damped = jacobian * jacobian.transpose() + DMatrix::identity(6, 6) * (damping * damping);
    damped.cholesky().map(|c| jacobian.transpose() * c.solve(twist))
}

/// Maps the angle into (-PI, PI]
fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(2.0 * PI);
    if a > PI { a - 2.0 * PI } else { a }
}

/// Picks the solution to return according to the strategy.
fn select(chain: &Chain, strategy: SolveType, seed: &[f64], solutions: Vec<Joints>) -> Option<Joints> {
    match strategy {
        SolveType::Speed => solutions.into_iter().next(),
        SolveType::Distance => solutions.into_iter().min_by(|a, b| {
            displacement(seed, a).total_cmp(&displacement(seed, b))
        }),
        SolveType::Manip1 | SolveType::Manip2 => solutions
            .into_par_iter()
            .map(|qs| (manipulability(chain, strategy, &qs), qs))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, qs)| qs),
    }
}

fn displacement(seed: &[f64], qs: &[f64]) -> f64 {
    seed.iter().zip(qs).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// Manipulability measure, scaled down near joint limits. Manip1 is the product of singular
/// values of J (sqrt(det(J * J^T)) for chains with 6 or more joints), Manip2 is the ratio of
/// the smallest to the largest singular value.
pub(crate) fn manipulability(chain: &Chain, strategy: SolveType, qs: &[f64]) -> f64 {
    let singular_values = chain.jacobian(qs).singular_values();
    let measure = match strategy {
        SolveType::Manip2 => {
            let max = singular_values.max();
            if max > 0.0 { singular_values.min() / max } else { 0.0 }
        }
        _ => singular_values.product(),
    };
    limits_penalty(chain, qs) * measure
}

/// Close to 1 in the middle of the joint ranges, drops to 0 at the limits.
fn limits_penalty(chain: &Chain, qs: &[f64]) -> f64 {
    let mut penalty = 1.0;
    for (joint, &q) in chain.joints().zip(qs) {
        if joint.is_bounded() && joint.upper > joint.lower {
            let range = joint.upper - joint.lower;
            penalty *= (q - joint.lower) * (joint.upper - q) / (range * range);
        }
    }
    (1.0 - (-penalty).exp()).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::kinematic_chain::tests::planar_chain;

    fn engine(strategy: SolveType, timeout: f64) -> TracIkEngine {
        let config = SolverConfig::new(timeout, 1e-6, strategy).unwrap();
        TracIkEngine::new(planar_chain(), config).with_random_seed(42)
    }

    #[test]
    fn test_seed_at_target_is_returned() {
        let mut engine = engine(SolveType::Speed, 0.05);
        let qs = vec![0.4, -0.3, 0.1];
        let target = engine.chain().forward(&qs);
        let solution = engine.solve_pose(&qs, &target).expect("solution");
        for (a, b) in solution.iter().zip(&qs) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_timeout_past_instant_range() {
        let config = SolverConfig::new(1e19, 1e-6, SolveType::Speed).unwrap();
        let mut engine = TracIkEngine::new(planar_chain(), config).with_random_seed(42);
        let qs = vec![0.2, 0.9, 0.05];
        let target = engine.chain().forward(&qs);
        let solution = engine.solve_pose(&qs, &target).expect("solution");
        assert!(displacement(&qs, &solution) < 1e-12, "{:?}", solution);
    }

    #[test]
    fn test_reaches_target_from_other_seed() {
        let mut engine = engine(SolveType::Speed, 0.5);
        let target = engine.chain().forward(&[0.8, -1.1, 0.25]);
        let solution = engine.solve_pose(&[0.0, 0.0, 0.0], &target).expect("solution");
        let reached = engine.chain().forward(&solution);
        assert!((reached.translation.vector - target.translation.vector).norm() < 1e-6);
        assert!(reached.rotation.angle_to(&target.rotation) < 1e-6);
    }

    #[test]
    fn test_unreachable_returns_none_in_time() {
        let mut engine = engine(SolveType::Speed, 0.05);
        let target = Pose::translation(10.0, 10.0, 10.0);
        let start = Instant::now();
        assert!(engine.solve_pose(&[0.0, 0.0, 0.0], &target).is_none());
        assert!(start.elapsed() < Duration::from_millis(250), "took {:?}", start.elapsed());
    }

    #[test]
    fn test_distance_prefers_seed() {
        let mut engine = engine(SolveType::Distance, 0.05);
        let qs = vec![0.5, 0.5, 0.1];
        let target = engine.chain().forward(&qs);
        let solution = engine.solve_pose(&qs, &target).expect("solution");
        assert!(displacement(&qs, &solution) < 1e-12, "{:?}", solution);
    }

    #[test]
    fn test_set_joint_limits_validation() {
        let mut engine = engine(SolveType::Speed, 0.05);
        assert!(matches!(engine.set_joint_limits(&[0.0; 2], &[1.0; 2]),
            Err(KinematicsError::Dimension { expected: 3, found: 2 })));
        assert!(matches!(engine.set_joint_limits(&[0.0, 2.0, 0.0], &[1.0, 1.0, 1.0]),
            Err(KinematicsError::Configuration(_))));
        engine.set_joint_limits(&[-1.0, -1.0, 0.0], &[1.0, 1.0, 0.3]).unwrap();
        assert_eq!(engine.joint_limits(), (vec![-1.0, -1.0, 0.0], vec![1.0, 1.0, 0.3]));
    }

    #[test]
    fn test_solutions_respect_limits() {
        let mut engine = engine(SolveType::Speed, 0.5);
        let target = engine.chain().forward(&[0.3, 0.6, 0.05]);
        let solution = engine.solve_pose(&[-0.5, -0.5, 0.2], &target).expect("solution");
        let (lower, upper) = engine.joint_limits();
        for i in 0..3 {
            assert!(solution[i] >= lower[i] && solution[i] <= upper[i]);
        }
    }

    #[test]
    fn test_penalty_vanishes_at_limits() {
        let chain = planar_chain();
        assert_eq!(limits_penalty(&chain, &[3.0, 0.0, 0.0]), 0.0);
        assert!(limits_penalty(&chain, &[0.0, 0.0, 0.0]) > 0.0);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(-PI / 4.0) + PI / 4.0).abs() < 1e-12);
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);
    }
}
