//! Description of the kinematic chain a session is built for.

use std::sync::OnceLock;
use crate::kinematics_error::KinematicsError;

/// Base link, tip link and the URDF document text. Read-only after construction,
/// except for the degrees of freedom that are fixed once the engine reports them.
#[derive(Debug, Clone)]
pub struct ChainDescriptor {
    base_link: String,
    tip_link: String,
    chain_document: String,
    dof: OnceLock<usize>,
}

impl ChainDescriptor {
    /// Link names and document must be non-empty. Whether the links exist and form a chain
    /// is only checked when the session is built.
    pub fn new(base_link: impl Into<String>, tip_link: impl Into<String>,
               chain_document: impl Into<String>) -> Result<Self, KinematicsError> {
        let descriptor = ChainDescriptor {
            base_link: base_link.into(),
            tip_link: tip_link.into(),
            chain_document: chain_document.into(),
            dof: OnceLock::new(),
        };
        if descriptor.base_link.trim().is_empty() || descriptor.tip_link.trim().is_empty() {
            return Err(KinematicsError::configuration("Base and tip link names must be given"));
        }
        if descriptor.chain_document.trim().is_empty() {
            return Err(KinematicsError::configuration("Chain document is empty"));
        }
        Ok(descriptor)
    }

    /// Reads the URDF document from file.
    ///
    /// # Example
    /// ```
    /// use rs_trac_ik::chain::ChainDescriptor;
    /// let chain = ChainDescriptor::from_urdf_file(
    ///     "src/tests/data/dual_arm.urdf", "body", "right_tool0").unwrap();
    /// assert_eq!(chain.tip_link(), "right_tool0");
    /// ```
    #[cfg(feature = "allow_filesystem")]
    pub fn from_urdf_file<P: AsRef<std::path::Path>>(path: P, base_link: &str, tip_link: &str)
                                                     -> Result<Self, KinematicsError> {
        let document = std::fs::read_to_string(path)?;
        ChainDescriptor::new(base_link, tip_link, document)
    }

    pub fn base_link(&self) -> &str {
        &self.base_link
    }

    pub fn tip_link(&self) -> &str {
        &self.tip_link
    }

    pub fn chain_document(&self) -> &str {
        &self.chain_document
    }

    /// Number of actuated joints between base and tip, None until an engine was built.
    pub fn degrees_of_freedom(&self) -> Option<usize> {
        self.dof.get().copied()
    }

    /// Records the joint count reported by the engine. Once recorded, the value cannot change.
    pub(crate) fn fix_degrees_of_freedom(&self, dof: usize) -> Result<usize, KinematicsError> {
        if dof == 0 {
            return Err(KinematicsError::configuration(format!(
                "No actuated joints between '{}' and '{}'", self.base_link, self.tip_link)));
        }
        let recorded = *self.dof.get_or_init(|| dof);
        if recorded != dof {
            return Err(KinematicsError::EngineFault(format!(
                "Engine reports {} joints, chain already has {}", dof, recorded)));
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = "<robot name=\"r\"></robot>";

    #[test]
    fn test_new_keeps_fields() {
        let chain = ChainDescriptor::new("base", "tool0", DOCUMENT).expect("valid descriptor");
        assert_eq!(chain.base_link(), "base");
        assert_eq!(chain.tip_link(), "tool0");
        assert_eq!(chain.chain_document(), DOCUMENT);
        assert_eq!(chain.degrees_of_freedom(), None);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(matches!(ChainDescriptor::new("", "tool0", DOCUMENT),
            Err(KinematicsError::Configuration(_))));
        assert!(matches!(ChainDescriptor::new("base", " ", DOCUMENT),
            Err(KinematicsError::Configuration(_))));
        assert!(matches!(ChainDescriptor::new("base", "tool0", "\n"),
            Err(KinematicsError::Configuration(_))));
    }

    #[test]
    fn test_dof_fixed_once() {
        let chain = ChainDescriptor::new("base", "tool0", DOCUMENT).unwrap();
        assert_eq!(chain.fix_degrees_of_freedom(6).unwrap(), 6);
        assert_eq!(chain.fix_degrees_of_freedom(6).unwrap(), 6);
        assert!(matches!(chain.fix_degrees_of_freedom(7), Err(KinematicsError::EngineFault(_))));
        assert_eq!(chain.degrees_of_freedom(), Some(6));
    }

    #[test]
    fn test_zero_dof_rejected() {
        let chain = ChainDescriptor::new("base", "tool0", DOCUMENT).unwrap();
        assert!(matches!(chain.fix_degrees_of_freedom(0), Err(KinematicsError::Configuration(_))));
        assert_eq!(chain.degrees_of_freedom(), None);
    }

    #[test]
    #[cfg(feature = "allow_filesystem")]
    fn test_missing_file() {
        let result = ChainDescriptor::from_urdf_file("src/tests/data/no_such.urdf", "a", "b");
        assert!(matches!(result, Err(KinematicsError::Io(_))));
    }
}
