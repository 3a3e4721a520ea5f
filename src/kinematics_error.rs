//! Error handling for chain loading, session construction and solver calls

use std::io;

/// Unified error reported by the session and the engines behind it.
/// Failing to find an IK solution is not an error, see
/// [`KinematicsSession::solve_ik`](crate::session::KinematicsSession::solve_ik).
#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    /// Reading the chain document from disk failed.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Invalid chain document, unknown links, broken chain or bad solver settings.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// Joint vector does not match the degrees of freedom of the chain.
    #[error("Invalid Length: expected {expected}, found {found}")]
    Dimension { expected: usize, found: usize },

    /// Joint values or target given by the caller contain NaN or infinity.
    #[error("Non-finite {what} at index {index}: {value}")]
    NonFinite { what: &'static str, index: usize, value: f64 },

    /// The session has been released and its engine freed.
    #[error("Session already released")]
    UseAfterRelease,

    /// The engine returned something that breaks its contract.
    #[error("Engine Fault: {0}")]
    EngineFault(String),
}

impl KinematicsError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        KinematicsError::Configuration(message.into())
    }

    /// Returns an error for the first value that is NaN or infinite.
    pub(crate) fn check_finite(what: &'static str, values: &[f64]) -> Result<(), Self> {
        match values.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(KinematicsError::NonFinite { what, index, value: values[index] }),
            None => Ok(()),
        }
    }

    /// Returns an error unless `found` equals `expected`.
    pub(crate) fn check_dimension(expected: usize, found: usize) -> Result<(), Self> {
        if expected == found {
            Ok(())
        } else {
            Err(KinematicsError::Dimension { expected, found })
        }
    }
}
