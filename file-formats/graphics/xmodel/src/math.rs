//! Vector, quaternion and matrix helpers used by the animation core
//!
//! The linear algebra types come from `glam` (column-major `Mat4`, `Quat`
//! stored as x, y, z, w). This module adds the interpolation rules the model
//! format relies on:
//!
//! - Vector slerp that also blends the vector length, so non-unit axes keep a
//!   meaningful magnitude
//! - Quaternion slerp with the same length blending
//! - Axis-angle and single-axis rotation builders
//! - Shortest-arc rotation between two vectors
//! - Matrix blending that slerps the axis columns and lerps everything else

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Cosine above which two directions are treated as parallel
const PARALLEL_COS: f32 = 0.9995;

/// Normalize a vector, leaving a zero vector unchanged
pub fn normalize(v: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(v)
}

/// Normalize a quaternion, leaving a zero quaternion unchanged
pub fn normalize_quat(q: Quat) -> Quat {
    let length = q.length();
    if length > 0.0 { q / length } else { q }
}

/// Scalar linear interpolation, `t` is not clamped
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Spherical interpolation between two vectors
///
/// The direction follows the great circle between `a` and `b` while the
/// length is interpolated linearly. Zero-length inputs and anti-parallel
/// inputs fall back to a plain lerp, nearly parallel inputs to a normalized
/// lerp.
pub fn slerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    let len_a = a.length();
    let len_b = b.length();
    if len_a == 0.0 || len_b == 0.0 {
        return a.lerp(b, t);
    }

    let dir_a = a / len_a;
    let dir_b = b / len_b;
    let length = lerp(len_a, len_b, t);
    let cos = dir_a.dot(dir_b);

    if cos <= -1.0 {
        return a.lerp(b, t);
    }
    if cos >= PARALLEL_COS {
        return normalize(dir_a.lerp(dir_b, t)) * length;
    }

    let angle = cos.acos();
    let sin = angle.sin();
    let wa = ((1.0 - t) * angle).sin() / sin;
    let wb = (t * angle).sin() / sin;
    (dir_a * wa + dir_b * wb) * length
}

/// Spherical interpolation between two quaternions
///
/// Interpolates along the shorter arc: when the two points lie in opposite
/// hemispheres of the 4D sphere `b` is negated first, so `t == 1` yields `b`
/// or `-b`, which is the same rotation. The quaternion length is interpolated linearly like
/// [`slerp_vec3`].
pub fn slerp_quat(a: Quat, b: Quat, t: f32) -> Quat {
    let va = Vec4::from(a);
    let vb = Vec4::from(b);
    let len_a = va.length();
    let len_b = vb.length();
    if len_a == 0.0 || len_b == 0.0 {
        return Quat::from_vec4(va.lerp(vb, t));
    }

    let dir_a = va / len_a;
    let dir_b = vb / len_b;
    let length = lerp(len_a, len_b, t);
    let cos = dir_a.dot(dir_b);
    let (dir_b, cos) = if cos < 0.0 { (-dir_b, -cos) } else { (dir_b, cos) };

    if cos >= PARALLEL_COS {
        let mixed = dir_a.lerp(dir_b, t);
        return Quat::from_vec4(mixed.try_normalize().unwrap_or(mixed) * length);
    }

    let angle = cos.acos();
    let sin = angle.sin();
    let wa = ((1.0 - t) * angle).sin() / sin;
    let wb = (t * angle).sin() / sin;
    Quat::from_vec4((dir_a * wa + dir_b * wb) * length)
}

/// Build a rotation of `angle` radians about `axis`
///
/// With `normalize` set the axis is normalized first; pass `false` only for
/// axes already known to be unit length. A zero axis yields the identity.
pub fn quat_from_axis_angle(axis: Vec3, angle: f32, normalize_axis: bool) -> Quat {
    let axis = if normalize_axis { normalize(axis) } else { axis };
    if axis == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let (sin, cos) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(axis.x * sin, axis.y * sin, axis.z * sin, cos)
}

/// Rotation about the i (x) axis
pub fn quat_from_i_axis(angle: f32) -> Quat {
    let (sin, cos) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(sin, 0.0, 0.0, cos)
}

/// Rotation about the j (y) axis
pub fn quat_from_j_axis(angle: f32) -> Quat {
    let (sin, cos) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(0.0, sin, 0.0, cos)
}

/// Rotation about the k (z) axis
pub fn quat_from_k_axis(angle: f32) -> Quat {
    let (sin, cos) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(0.0, 0.0, sin, cos)
}

/// Right-multiply `q` by a rotation of `angle` about `axis`
pub fn mul_rotate(q: Quat, axis: Vec3, angle: f32, normalize_axis: bool) -> Quat {
    q * quat_from_axis_angle(axis, angle, normalize_axis)
}

/// Right-multiply `q` by a rotation about the i axis
pub fn mul_i_axis_rotate(q: Quat, angle: f32) -> Quat {
    let (s, c) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(
        q.w * s + q.x * c,
        q.y * c + q.z * s,
        q.z * c - q.y * s,
        q.w * c - q.x * s,
    )
}

/// Right-multiply `q` by a rotation about the j axis
pub fn mul_j_axis_rotate(q: Quat, angle: f32) -> Quat {
    let (s, c) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(
        q.x * c - q.z * s,
        q.w * s + q.y * c,
        q.x * s + q.z * c,
        q.w * c - q.y * s,
    )
}

/// Right-multiply `q` by a rotation about the k axis
pub fn mul_k_axis_rotate(q: Quat, angle: f32) -> Quat {
    let (s, c) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(
        q.x * c + q.y * s,
        q.y * c - q.x * s,
        q.w * s + q.z * c,
        q.w * c - q.z * s,
    )
}

/// Rotation turning `from` towards `to`
///
/// `t` scales the rotation angle (1 rotates all the way). The identity is
/// returned when either input has zero length, when the vectors are already
/// aligned, or when they are exactly anti-parallel and no rotation axis can
/// be derived.
pub fn shortest_arc(from: Vec3, normalize_from: bool, to: Vec3, normalize_to: bool, t: f32) -> Quat {
    let from = if normalize_from { normalize(from) } else { from };
    if from.length_squared() == 0.0 {
        return Quat::IDENTITY;
    }
    let to = if normalize_to { normalize(to) } else { to };
    if to.length_squared() == 0.0 {
        return Quat::IDENTITY;
    }

    let cos = from.dot(to);
    if cos >= 1.0 {
        return Quat::IDENTITY;
    }
    let axis = from.cross(to);
    if axis.length_squared() == 0.0 {
        return Quat::IDENTITY;
    }

    let half = cos.clamp(-1.0, 1.0).acos() * 0.5 * t;
    let (sin, cos) = half.sin_cos();
    let axis = normalize(axis) * sin;
    Quat::from_xyzw(axis.x, axis.y, axis.z, cos)
}

/// Blend two matrices
///
/// The x, y and z axis columns are slerped with [`slerp_vec3`], their w rows
/// and the whole translation column are lerped.
pub fn blend_matrix(a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
    let blend_axis = |ca: Vec4, cb: Vec4| {
        slerp_vec3(ca.truncate(), cb.truncate(), t).extend(lerp(ca.w, cb.w, t))
    };
    Mat4::from_cols(
        blend_axis(a.x_axis, b.x_axis),
        blend_axis(a.y_axis, b.y_axis),
        blend_axis(a.z_axis, b.z_axis),
        a.w_axis.lerp(b.w_axis, t),
    )
}

/// Reduce a matrix to its axis block
///
/// Drops the translation and projective parts. With `normalize_axes` set each
/// axis column is normalized, leaving a pure rotation for matrices without
/// shear.
pub fn axis_matrix(m: &Mat4, normalize_axes: bool) -> Mat4 {
    let axes = Mat3::from_mat4(*m);
    if !normalize_axes {
        return Mat4::from_mat3(axes);
    }
    Mat4::from_mat3(Mat3::from_cols(
        normalize(axes.x_axis),
        normalize(axes.y_axis),
        normalize(axes.z_axis),
    ))
}
