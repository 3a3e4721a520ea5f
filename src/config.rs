//! Solver settings shared by the session and the engine

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use crate::kinematics_error::KinematicsError;

/// Objective used by the engine to choose among several valid solutions.
/// The acceptance criterion (epsilon) is the same for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SolveType {
    /// Return the first solution found.
    #[default]
    Speed,
    /// Search until timeout, return the solution closest to the seed.
    Distance,
    /// Search until timeout, maximize sqrt(det(J * J^T)).
    Manip1,
    /// Search until timeout, maximize the ratio of the smallest to the largest singular value of J.
    Manip2,
}

impl SolveType {
    pub const ALL: [SolveType; 4] = [
        SolveType::Speed, SolveType::Distance, SolveType::Manip1, SolveType::Manip2,
    ];

    /// True if the engine stops at the first solution.
    pub fn first_found(&self) -> bool {
        matches!(self, SolveType::Speed)
    }
}

impl fmt::Display for SolveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveType::Speed => "Speed",
            SolveType::Distance => "Distance",
            SolveType::Manip1 => "Manip1",
            SolveType::Manip2 => "Manip2",
        };
        f.write_str(name)
    }
}

impl FromStr for SolveType {
    type Err = KinematicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SolveType::ALL
            .into_iter()
            .find(|t| t.to_string() == s)
            .ok_or_else(|| KinematicsError::configuration(
                format!("Unsupported solver type: {}", s)))
    }
}

/// Time budget, tolerance and strategy of the IK search. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    timeout: Duration,
    epsilon: f64,
    strategy: SolveType,
}

/// Default time budget per IK call, seconds.
pub const DEFAULT_TIMEOUT: f64 = 0.005;

/// Default pose error tolerance.
pub const DEFAULT_EPSILON: f64 = 1e-5;

impl SolverConfig {
    /// Validates and builds the configuration. Both timeout (in seconds) and epsilon must be
    /// finite and strictly positive.
    pub fn new(timeout_seconds: f64, epsilon: f64, strategy: SolveType) -> Result<Self, KinematicsError> {
        if !(timeout_seconds.is_finite() && timeout_seconds > 0.0) {
            return Err(KinematicsError::configuration(
                format!("Timeout must be positive, got {}", timeout_seconds)));
        }
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(KinematicsError::configuration(
                format!("Epsilon must be positive, got {}", epsilon)));
        }
        let timeout = Duration::try_from_secs_f64(timeout_seconds)
            .map_err(|e| KinematicsError::configuration(
                format!("Timeout {} s out of range: {}", timeout_seconds, e)))?;
        Ok(SolverConfig {
            timeout,
            epsilon,
            strategy,
        })
    }

    /// Same as [`SolverConfig::new`] with the strategy given by name
    /// ("Speed", "Distance", "Manip1" or "Manip2").
    pub fn parse(timeout_seconds: f64, epsilon: f64, strategy: &str) -> Result<Self, KinematicsError> {
        SolverConfig::new(timeout_seconds, epsilon, strategy.parse()?)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_seconds(&self) -> f64 {
        self.timeout.as_secs_f64()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn strategy(&self) -> SolveType {
        self.strategy
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT),
            epsilon: DEFAULT_EPSILON,
            strategy: SolveType::Speed,
        }
    }
}
