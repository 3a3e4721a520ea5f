//! Serial chain of joints between the base and the tip link, with forward kinematics
//! and the geometric Jacobian used by the iterative solvers.

extern crate nalgebra as na;

use na::{DMatrix, Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use crate::kinematic_traits::Pose;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Fixed,
    Revolute,
    /// Revolute joint without limits
    Continuous,
    Prismatic,
}

impl JointKind {
    pub fn is_actuated(&self) -> bool {
        !matches!(self, JointKind::Fixed)
    }
}

/// Joint together with the fixed transform from the parent link to the joint frame.
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub kind: JointKind,
    /// Parent link frame to joint frame
    pub origin: Isometry3<f64>,
    /// Joint axis expressed in the joint frame
    pub axis: Unit<Vector3<f64>>,
    /// Lower limit, NEG_INFINITY if unbounded
    pub lower: f64,
    /// Upper limit, INFINITY if unbounded
    pub upper: f64,
}

impl Segment {
    /// Motion of the joint frame for the given joint value.
    fn motion(&self, q: f64) -> Isometry3<f64> {
        match self.kind {
            JointKind::Fixed => Isometry3::identity(),
            JointKind::Revolute | JointKind::Continuous => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, q),
            ),
            JointKind::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * q),
                UnitQuaternion::identity(),
            ),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    segments: Vec<Segment>,
    dof: usize,
}

impl Chain {
    pub fn new(segments: Vec<Segment>) -> Self {
        let dof = segments.iter().filter(|s| s.kind.is_actuated()).count();
        Chain { segments, dof }
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Actuated joints only, in chain order.
    pub fn joints(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.kind.is_actuated())
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.joints().map(|s| s.name.as_str()).collect()
    }

    pub fn limits(&self) -> (Vec<f64>, Vec<f64>) {
        self.joints().map(|s| (s.lower, s.upper)).unzip()
    }

    /// Replaces limits of the actuated joints. Slices must have `dof()` length.
    pub fn set_limits(&mut self, lower: &[f64], upper: &[f64]) {
        let actuated = self.segments.iter_mut().filter(|s| s.kind.is_actuated());
        for ((segment, &from), &to) in actuated.zip(lower).zip(upper) {
            segment.lower = from;
            segment.upper = to;
        }
    }

    /// Pose of the tip link in the base link frame.
    pub fn forward(&self, qs: &[f64]) -> Pose {
        let mut pose = Isometry3::identity();
        let mut values = qs.iter();
        for segment in &self.segments {
            pose *= segment.origin;
            if segment.kind.is_actuated() {
                let q = values.next().copied().unwrap_or(0.0);
                pose *= segment.motion(q);
            }
        }
        pose
    }

    /// Tip pose and the 6 x dof geometric Jacobian in the base frame. Rows 0..3 are linear,
    /// rows 3..6 angular velocity components.
    pub fn forward_with_jacobian(&self, qs: &[f64]) -> (Pose, DMatrix<f64>) {
        // Joint origins and world axes, collected while walking the chain
        let mut axes: Vec<(JointKind, Vector3<f64>, Vector3<f64>)> = Vec::with_capacity(self.dof);
        let mut pose = Isometry3::identity();
        let mut values = qs.iter();
        for segment in &self.segments {
            pose *= segment.origin;
            if segment.kind.is_actuated() {
                let axis = pose.rotation * segment.axis.into_inner();
                axes.push((segment.kind, pose.translation.vector, axis));
                let q = values.next().copied().unwrap_or(0.0);
                pose *= segment.motion(q);
            }
        }

        let tip = pose.translation.vector;
        let mut jacobian = DMatrix::zeros(6, self.dof);
        for (i, (kind, origin, axis)) in axes.into_iter().enumerate() {
            let (linear, angular) = match kind {
                JointKind::Prismatic => (axis, Vector3::zeros()),
                _ => (axis.cross(&(tip - origin)), axis),
            };
            jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&linear);
            jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&angular);
        }
        (pose, jacobian)
    }

    pub fn jacobian(&self, qs: &[f64]) -> DMatrix<f64> {
        self.forward_with_jacobian(qs).1
    }
}
