//! Conversion between 3x3 rotation matrices and unit quaternions.
//!
//! The engine boundary expects orientation as a quaternion in `(x, y, z, w)` order,
//! while callers hand rotation matrices. Two conversion paths are provided:
//!
//! - the default path builds a symmetric 4x4 matrix from the rotation and takes the eigenvector
//!   of its largest eigenvalue. It tolerates slightly noisy matrices.
//! - the precise path uses the trace of the matrix and a branch on the dominant diagonal axis.
//!   It is cheaper and exact for matrices known to be orthonormal.
//!
//! Both paths return the representative of the double cover `q ≡ -q` with a non-negative
//! scalar part. The input is not validated: a matrix that is not a rotation produces an
//! unspecified quaternion.
//!
//! ```
//! use nalgebra::Matrix3;
//! use rs_trac_ik::rotation::{matrix_to_quaternion, quaternion_xyzw};
//!
//! // Rotation by PI around X
//! let m = Matrix3::new(
//!     1.0, 0.0, 0.0,
//!     0.0, -1.0, 0.0,
//!     0.0, 0.0, -1.0);
//! let q = quaternion_xyzw(&matrix_to_quaternion(&m, false));
//! assert!((q[0] - 1.0).abs() < 1e-9);
//! ```

extern crate nalgebra as na;

use na::{Matrix3, Matrix4, Quaternion, SymmetricEigen, UnitQuaternion};

/// Homogeneous bottom-right value of a pure rotation.
const HOMOGENEOUS: f64 = 1.0;

/// Scalar parts this close to zero are treated as zero when choosing the sign.
const SIGN_TIE: f64 = 1e-12;

/// Converts rotation matrix into the unit quaternion with non-negative `w`.
/// The precise flag selects the trace-based method instead of eigen decomposition.
pub fn matrix_to_quaternion(m: &Matrix3<f64>, precise: bool) -> Quaternion<f64> {
    let [x, y, z, w] = if precise {
        from_trace(m)
    } else {
        from_eigen(m)
    };
    let [x, y, z, w] = canonical([x, y, z, w]);
    Quaternion::new(w, x, y, z)
}

/// Rotation matrix of the given quaternion. The quaternion is normalized first.
pub fn quaternion_to_matrix(q: &Quaternion<f64>) -> Matrix3<f64> {
    UnitQuaternion::from_quaternion(*q)
        .to_rotation_matrix()
        .into_inner()
}

/// Components in `(x, y, z, w)` order, the order expected by engines.
pub fn quaternion_xyzw(q: &Quaternion<f64>) -> [f64; 4] {
    [q.i, q.j, q.k, q.w]
}

// Eigenvector of the largest eigenvalue of K, components come out as (x, y, z, w).
fn from_eigen(m: &Matrix3<f64>) -> [f64; 4] {
    let (m00, m01, m02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (m10, m11, m12) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
    let (m20, m21, m22) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);

    let k = Matrix4::new(
        m00 - m11 - m22, m01 + m10, m02 + m20, m21 - m12,
        m01 + m10, m11 - m00 - m22, m12 + m21, m02 - m20,
        m02 + m20, m12 + m21, m22 - m00 - m11, m10 - m01,
        m21 - m12, m02 - m20, m10 - m01, m00 + m11 + m22,
    ) / 3.0;

    let eigen = SymmetricEigen::new(k);
    // Exact ties between the largest eigenvalues resolve to whichever column comes first.
    let largest = eigen.eigenvalues.imax();
    let v = eigen.eigenvectors.column(largest);
    [v[0], v[1], v[2], v[3]]
}

fn from_trace(m: &Matrix3<f64>) -> [f64; 4] {
    let mut q = [0.0; 4];
    let mut t = m.trace() + HOMOGENEOUS;
    if t > HOMOGENEOUS {
        q[0] = m[(2, 1)] - m[(1, 2)];
        q[1] = m[(0, 2)] - m[(2, 0)];
        q[2] = m[(1, 0)] - m[(0, 1)];
        q[3] = t;
    } else {
        let (mut i, mut j, mut k) = (0, 1, 2);
        if m[(1, 1)] > m[(0, 0)] {
            (i, j, k) = (1, 2, 0);
        }
        if m[(2, 2)] > m[(i, i)] {
            (i, j, k) = (2, 0, 1);
        }
        t = m[(i, i)] - (m[(j, j)] + m[(k, k)]) + HOMOGENEOUS;
        q[i] = t;
        q[j] = m[(i, j)] + m[(j, i)];
        q[k] = m[(k, i)] + m[(i, k)];
        q[3] = m[(k, j)] - m[(j, k)];
    }
    let scale = 0.5 / (t * HOMOGENEOUS).sqrt();
    q.map(|c| c * scale)
}

/// Picks the representative with `w >= 0`. For rotations by PI the scalar part is zero up to
/// rounding, so the first non-zero vector component is made positive instead. The result is
/// always `q` or `-q`, a scalar part inside the tie zone may stay slightly negative.
fn canonical(q: [f64; 4]) -> [f64; 4] {
    let [x, y, z, w] = q;
    let negative = if w.abs() > SIGN_TIE {
        w < 0.0
    } else {
        [x, y, z]
            .into_iter()
            .find(|c| c.abs() > SIGN_TIE)
            .is_some_and(|c| c < 0.0)
    };
    if negative { q.map(|c| -c) } else { q }
}
