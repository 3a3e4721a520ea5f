//! Extracts the serial chain between two links from URDF

extern crate nalgebra as na;
extern crate sxd_document;

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use na::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use regex::Regex;
use sxd_document::{dom, parser, QName};
use tracing::warn;
use crate::kinematic_chain::{Chain, JointKind, Segment};
use crate::kinematics_error::KinematicsError;

/// Matches the ${radians(<number>)} format that is common in xacro
static RADIANS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\$\{radians\((-?\d+(\.\d+)?)\)\}$"));

/// Joint as declared in the URDF document.
#[derive(Debug, Clone)]
pub struct UrdfJoint {
    pub name: String,
    pub kind: JointKind,
    pub parent: String,
    pub child: String,
    pub origin: Isometry3<f64>,
    pub axis: Vector3<f64>,
    /// Lower and upper limit if declared and not both zero
    pub limits: Option<(f64, f64)>,
}

/// Links and joints of the robot description, without geometry or inertia.
#[derive(Debug, Clone, Default)]
pub struct UrdfModel {
    pub name: String,
    pub links: HashSet<String>,
    pub joints: Vec<UrdfJoint>,
}

/// Parses URDF XML content. Only the kinematic part (links, joints, origins,
/// axes and limits) is read.
///
/// # Example
/// ```
/// use rs_trac_ik::urdf::parse_urdf;
/// let model = parse_urdf(r#"
///     <robot name="pendulum">
///       <link name="base"/>
///       <link name="arm"/>
///       <joint name="swing" type="continuous">
///         <parent link="base"/>
///         <child link="arm"/>
///         <axis xyz="0 1 0"/>
///       </joint>
///     </robot>"#).unwrap();
/// let chain = model.extract_chain("base", "arm").unwrap();
/// assert_eq!(chain.dof(), 1);
/// ```
pub fn parse_urdf(xml: &str) -> Result<UrdfModel, KinematicsError> {
    let package = parser::parse(xml)
        .map_err(|e| KinematicsError::configuration(format!("Failed to parse URDF: {}", e)))?;
    let document = package.as_document();

    // Access the root element
    let root_element = document.root().children().into_iter()
        .find_map(|e| e.element())
        .ok_or_else(|| KinematicsError::configuration("No root element found"))?;
    if root_element.name() != QName::new("robot") {
        return Err(KinematicsError::configuration(format!(
            "Root element must be 'robot', found '{}'", root_element.name().local_part())));
    }

    let mut model = UrdfModel {
        name: root_element.attribute_value("name").unwrap_or_default().to_string(),
        ..Default::default()
    };
    collect(root_element, &mut model)?;
    Ok(model)
}

// Recursive function to collect links and joints (xacro may wrap them into other elements)
fn collect(element: dom::Element, model: &mut UrdfModel) -> Result<(), KinematicsError> {
    let link_tag = QName::new("link");
    let joint_tag = QName::new("joint");

    for child in element.children().into_iter().filter_map(|e| e.element()) {
        if child.name() == link_tag {
            let name = required_attribute(child, "name", "link")?;
            if !model.links.insert(name.clone()) {
                return Err(KinematicsError::configuration(format!("Duplicate link '{}'", name)));
            }
        } else if child.name() == joint_tag {
            model.joints.push(read_joint(child)?);
        } else {
            collect(child, model)?;
        }
    }
    Ok(())
}

fn read_joint(element: dom::Element) -> Result<UrdfJoint, KinematicsError> {
    let name = required_attribute(element, "name", "joint")?;
    let joint_type = required_attribute(element, "type", &name)?;
    let kind = match joint_type.as_str() {
        "revolute" => JointKind::Revolute,
        "continuous" => JointKind::Continuous,
        "prismatic" => JointKind::Prismatic,
        "fixed" => JointKind::Fixed,
        other => {
            warn!("Converting unknown joint type '{}' of joint '{}' into a fixed joint", other, name);
            JointKind::Fixed
        }
    };

    let parent = child_element(element, "parent")
        .ok_or_else(|| KinematicsError::configuration(format!("Joint '{}' has no parent", name)))
        .and_then(|e| required_attribute(e, "link", &name))?;
    let child = child_element(element, "child")
        .ok_or_else(|| KinematicsError::configuration(format!("Joint '{}' has no child", name)))
        .and_then(|e| required_attribute(e, "link", &name))?;

    let origin = match child_element(element, "origin") {
        Some(origin) => read_origin(origin)?,
        None => Isometry3::identity(),
    };
    let axis = match child_element(element, "axis").and_then(|e| e.attribute_value("xyz")) {
        Some(xyz) => Vector3::from(parse_triple(xyz, parse_number)?),
        None => Vector3::x(),
    };

    let limits = match child_element(element, "limit") {
        Some(limit) if kind != JointKind::Continuous => read_limits(limit, &name)?,
        _ => None,
    };

    Ok(UrdfJoint { name, kind, parent, child, origin, axis, limits })
}

fn read_origin(element: dom::Element) -> Result<Isometry3<f64>, KinematicsError> {
    let xyz = element.attribute_value("xyz")
        .map(|v| parse_triple(v, parse_number)).transpose()?.unwrap_or([0.0; 3]);
    let rpy = element.attribute_value("rpy")
        .map(|v| parse_triple(v, parse_angle)).transpose()?.unwrap_or([0.0; 3]);
    Ok(Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    ))
}

// URDF defaults missing limits to zero; the range 0 to 0 means unbounded.
fn read_limits(element: dom::Element, joint: &str) -> Result<Option<(f64, f64)>, KinematicsError> {
    let lower = element.attribute_value("lower").map(parse_angle).transpose()?.unwrap_or(0.0);
    let upper = element.attribute_value("upper").map(parse_angle).transpose()?.unwrap_or(0.0);
    if lower == 0.0 && upper == 0.0 {
        return Ok(None);
    }
    if lower > upper {
        return Err(KinematicsError::configuration(format!(
            "Joint '{}' has lower limit {} above upper limit {}", joint, lower, upper)));
    }
    Ok(Some((lower, upper)))
}

fn child_element<'d>(element: dom::Element<'d>, tag: &str) -> Option<dom::Element<'d>> {
    let tag = QName::new(tag);
    element.children().into_iter()
        .find_map(|e| e.element().filter(|el| el.name() == tag))
}

fn required_attribute(element: dom::Element, attribute: &str, owner: &str) -> Result<String, KinematicsError> {
    element.attribute_value(attribute)
        .map(str::to_string)
        .ok_or_else(|| KinematicsError::configuration(
            format!("Attribute '{}' missing in {}", attribute, owner)))
}

/// Finite number only, "nan" and "inf" are rejected.
fn parse_number(value: &str) -> Result<f64, KinematicsError> {
    value.trim().parse::<f64>().ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| KinematicsError::configuration(format!("Not a finite number: '{}'", value)))
}

/// Plain number in radians or `${radians(degrees)}`.
fn parse_angle(value: &str) -> Result<f64, KinematicsError> {
    let re = RADIANS.as_ref()
        .map_err(|_| KinematicsError::configuration("Invalid regex pattern"))?;
    if let Some(degrees) = re.captures(value).and_then(|caps| caps.get(1)) {
        Ok(parse_number(degrees.as_str())?.to_radians())
    } else {
        parse_number(value)
    }
}

fn parse_triple(value: &str, parse: fn(&str) -> Result<f64, KinematicsError>)
                -> Result<[f64; 3], KinematicsError> {
    let values: Vec<f64> = value.split_whitespace()
        .map(parse)
        .collect::<Result<_, _>>()?;
    <[f64; 3]>::try_from(values).map_err(|_| KinematicsError::configuration(
        format!("Expected three values, found '{}'", value)))
}

impl UrdfModel {
    /// Builds the serial chain from `base` to `tip`. Both links must exist, every link must
    /// have at most one parent joint and there must be at least one actuated joint in between.
    pub fn extract_chain(&self, base: &str, tip: &str) -> Result<Chain, KinematicsError> {
        for link in [base, tip] {
            if !self.links.contains(link) {
                return Err(KinematicsError::configuration(format!("Link '{}' not found", link)));
            }
        }

        let mut parent_joint: HashMap<&str, &UrdfJoint> = HashMap::new();
        for joint in &self.joints {
            if parent_joint.insert(joint.child.as_str(), joint).is_some() {
                return Err(KinematicsError::configuration(format!(
                    "Link '{}' has more than one parent joint", joint.child)));
            }
        }

        let mut path = Vec::new();
        let mut current = tip;
        while current != base {
            let joint = parent_joint.get(current).ok_or_else(|| KinematicsError::configuration(
                format!("No chain from '{}' to '{}'", base, tip)))?;
            if path.len() >= self.joints.len() {
                return Err(KinematicsError::configuration("Joints form a loop"));
            }
            path.push(*joint);
            current = joint.parent.as_str();
        }
        path.reverse();

        let segments = path.into_iter()
            .map(to_segment)
            .collect::<Result<Vec<_>, _>>()?;
        let chain = Chain::new(segments);
        if chain.dof() == 0 {
            return Err(KinematicsError::configuration(format!(
                "No actuated joints between '{}' and '{}'", base, tip)));
        }
        Ok(chain)
    }
}

fn to_segment(joint: &UrdfJoint) -> Result<Segment, KinematicsError> {
    let axis = if joint.kind.is_actuated() {
        Unit::try_new(joint.axis, 1e-9).ok_or_else(|| KinematicsError::configuration(
            format!("Joint '{}' has zero axis", joint.name)))?
    } else {
        Vector3::x_axis()
    };
    let (lower, upper) = match (joint.kind, joint.limits) {
        (JointKind::Revolute | JointKind::Prismatic, Some(limits)) => limits,
        _ => (f64::NEG_INFINITY, f64::INFINITY),
    };
    Ok(Segment {
        name: joint.name.clone(),
        kind: joint.kind,
        origin: joint.origin,
        axis,
        lower,
        upper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const ARM: &str = r#"
        <robot name="arm">
            <link name="world"/>
            <link name="base"/>
            <link name="upper"/>
            <link name="lower"/>
            <link name="hand"/>
            <link name="camera"/>
            <joint name="mount" type="fixed">
                <origin xyz="0 0 0.1"/>
                <parent link="world"/>
                <child link="base"/>
            </joint>
            <joint name="shoulder" type="revolute">
                <origin xyz="0 0 0.3" rpy="0 0 ${radians(90)}"/>
                <parent link="base"/>
                <child link="upper"/>
                <axis xyz="0 0 1"/>
                <limit lower="${radians(-170)}" upper="2.96" effort="10" velocity="1"/>
            </joint>
            <joint name="elbow" type="continuous">
                <origin xyz="0.5 0 0"/>
                <parent link="upper"/>
                <child link="lower"/>
                <axis xyz="0 -1 0"/>
                <limit lower="-1" upper="1" effort="10" velocity="1"/>
            </joint>
            <joint name="slide" type="prismatic">
                <origin xyz="0.4 0 0"/>
                <parent link="lower"/>
                <child link="hand"/>
                <axis xyz="1 0 0"/>
                <limit lower="0" upper="0.2" effort="10" velocity="1"/>
            </joint>
            <joint name="camera_mount" type="floating">
                <parent link="lower"/>
                <child link="camera"/>
            </joint>
        </robot>
    "#;

    #[test]
    fn test_parse_links_and_joints() {
        let model = parse_urdf(ARM).expect("Failed to parse URDF");
        assert_eq!(model.name, "arm");
        assert_eq!(model.links.len(), 6);
        assert_eq!(model.joints.len(), 5);

        let shoulder = &model.joints[1];
        assert_eq!(shoulder.name, "shoulder");
        assert_eq!(shoulder.kind, JointKind::Revolute);
        assert_eq!(shoulder.parent, "base");
        assert_eq!(shoulder.child, "upper");
        let (lower, upper) = shoulder.limits.expect("shoulder limits");
        assert!((lower - (-170.0_f64).to_radians()).abs() < 1e-12);
        assert_eq!(upper, 2.96);
        assert!((shoulder.origin.rotation.euler_angles().2 - FRAC_PI_2).abs() < 1e-12);

        // Continuous joint ignores limits, unknown joint type becomes fixed
        assert_eq!(model.joints[2].limits, None);
        assert_eq!(model.joints[4].kind, JointKind::Fixed);
    }

    #[test]
    fn test_extract_chain() {
        let model = parse_urdf(ARM).unwrap();
        let chain = model.extract_chain("world", "hand").expect("chain");
        assert_eq!(chain.dof(), 3);
        assert_eq!(chain.joint_names(), vec!["shoulder", "elbow", "slide"]);
        let (lower, upper) = chain.limits();
        assert_eq!(lower[1], f64::NEG_INFINITY);
        assert_eq!(upper[1], f64::INFINITY);
        assert_eq!((lower[2], upper[2]), (0.0, 0.2));

        // Shoulder turned 90 degrees, so the arm extends along Y
        let pose = chain.forward(&[0.0, 0.0, 0.1]);
        let p = pose.translation.vector;
        assert!((p - Vector3::new(0.0, 1.0, 0.4)).norm() < 1e-9, "{}", p);
    }

    #[test]
    fn test_sub_chain() {
        let model = parse_urdf(ARM).unwrap();
        let chain = model.extract_chain("upper", "lower").unwrap();
        assert_eq!(chain.joint_names(), vec!["elbow"]);
    }

    #[test]
    fn test_unknown_link() {
        let model = parse_urdf(ARM).unwrap();
        let result = model.extract_chain("world", "gripper");
        match result {
            Err(KinematicsError::Configuration(message)) => assert!(message.contains("gripper")),
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reversed_chain_rejected() {
        let model = parse_urdf(ARM).unwrap();
        assert!(matches!(model.extract_chain("hand", "world"), Err(KinematicsError::Configuration(_))));
    }

    #[test]
    fn test_side_branch_rejected() {
        // camera hangs off 'lower', it is not below 'hand'
        let model = parse_urdf(ARM).unwrap();
        assert!(matches!(model.extract_chain("hand", "camera"), Err(KinematicsError::Configuration(_))));
    }

    #[test]
    fn test_fixed_only_chain_rejected() {
        let model = parse_urdf(ARM).unwrap();
        assert!(matches!(model.extract_chain("world", "base"), Err(KinematicsError::Configuration(_))));
        assert!(matches!(model.extract_chain("lower", "camera"), Err(KinematicsError::Configuration(_))));
    }

    #[test]
    fn test_two_parents_rejected() {
        let xml = r#"
            <robot name="loop">
                <link name="a"/><link name="b"/><link name="c"/>
                <joint name="ab" type="revolute"><parent link="a"/><child link="b"/></joint>
                <joint name="cb" type="revolute"><parent link="c"/><child link="b"/></joint>
            </robot>"#;
        let model = parse_urdf(xml).unwrap();
        assert!(matches!(model.extract_chain("a", "b"), Err(KinematicsError::Configuration(_))));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(parse_urdf("<robot"), Err(KinematicsError::Configuration(_))));
        assert!(matches!(parse_urdf("<model name=\"x\"/>"), Err(KinematicsError::Configuration(_))));
        let bad_origin = r#"
            <robot name="r">
                <link name="a"/><link name="b"/>
                <joint name="j" type="revolute">
                    <origin xyz="0 1"/><parent link="a"/><child link="b"/>
                </joint>
            </robot>"#;
        assert!(matches!(parse_urdf(bad_origin), Err(KinematicsError::Configuration(_))));
    }

    fn single_joint(joint_body: &str) -> String {
        format!(r#"
            <robot name="r">
                <link name="a"/><link name="b"/>
                <joint name="j" type="revolute">
                    <parent link="a"/><child link="b"/>
                    {}
                </joint>
            </robot>"#, joint_body)
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for body in [
            r#"<limit lower="nan" upper="1"/>"#,
            r#"<limit lower="-1" upper="inf"/>"#,
            r#"<origin xyz="0 NaN 0"/>"#,
            r#"<origin rpy="0 0 -inf"/>"#,
            r#"<axis xyz="0 0 nan"/>"#,
        ] {
            let result = parse_urdf(&single_joint(body));
            assert!(matches!(result, Err(KinematicsError::Configuration(_))), "{} accepted", body);
        }
        let model = parse_urdf(&single_joint(r#"<limit lower="-1" upper="1"/>"#)).unwrap();
        assert_eq!(model.joints[0].limits, Some((-1.0, 1.0)));
    }

    #[test]
    fn test_parse_angle() {
        assert!((parse_angle("${radians(-90)}").unwrap() + FRAC_PI_2).abs() < 1e-12);
        assert_eq!(parse_angle("1.5").unwrap(), 1.5);
        assert!(parse_angle("${pi}").is_err());
        assert!(parse_angle("${radians(nan)}").is_err());
    }
}
