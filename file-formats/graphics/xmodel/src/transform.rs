//! Node transform parameters
//!
//! A node has four transform slots, evaluated in the fixed order
//! [`TransformSlot::Matrix`], [`TransformSlot::Translate`],
//! [`TransformSlot::Scale`], [`TransformSlot::Rotate`]. Each present slot
//! holds a [`Transform`]: an `initial` (bind pose) value plus two working
//! values, one per [`BlendSlot`]. Keyframe evaluation writes the working
//! values; the compositor mixes them by a blend weight and folds the result
//! into the node's local matrix.

use glam::{Mat4, Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::math::{blend_matrix, lerp, normalize, normalize_quat, quat_from_axis_angle, slerp_quat, slerp_vec3};
use crate::structure::{Identity, Structure, StructureType, identity_eq};

/// Number of working values carried by every transform
pub const NUM_BLEND_SLOTS: usize = 2;

/// Number of transform slots on a node
pub const NUM_TRANSFORM_SLOTS: usize = 4;

/// Working value of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum BlendSlot {
    /// Base layer, normally the bind pose
    Base = 0,
    /// Layer written by keyframe animation
    #[default]
    Animated = 1,
}

impl BlendSlot {
    /// Both slots in index order
    pub const ALL: [Self; NUM_BLEND_SLOTS] = [Self::Base, Self::Animated];

    /// Index into the working value array
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Transform slot of a node, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum TransformSlot {
    Matrix = 0,
    Translate = 1,
    Scale = 2,
    Rotate = 3,
}

impl TransformSlot {
    /// All slots in evaluation order
    pub const ALL: [Self; NUM_TRANSFORM_SLOTS] =
        [Self::Matrix, Self::Translate, Self::Scale, Self::Rotate];

    /// Index into a node's transform array
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Rotation of `angle` radians about `axis`
///
/// The axis does not have to be unit length; it is normalized when the
/// rotation is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct AxisAngle {
    pub angle: f32,
    pub axis: Vec3,
}

impl AxisAngle {
    pub const fn new(axis: Vec3, angle: f32) -> Self {
        Self { angle, axis }
    }

    /// Quaternion form, identity for a zero axis
    pub fn to_quat(self) -> Quat {
        quat_from_axis_angle(self.axis, self.angle, true)
    }
}

impl Default for AxisAngle {
    fn default() -> Self {
        Self {
            angle: 0.0,
            axis: Vec3::Z,
        }
    }
}

/// A value that can be stored in a transform and interpolated
///
/// Values are read from and written to flat float buffers using the model
/// format's component layout, which is what animation keys carry.
pub trait Blend: Copy {
    /// Number of float components
    const SIZE: usize;

    /// Decode from the leading components of `src`
    fn from_components(src: &[f32]) -> Option<Self>;

    /// Read one component
    fn component(&self, index: usize) -> Option<f32>;

    /// Write one component, returns false if the index is out of range
    fn set_component(&mut self, index: usize, value: f32) -> bool;

    /// Keyframe interpolation towards `other`
    fn interpolate(&self, other: &Self, t: f32) -> Self;

    /// Restore the invariants of the value after a blend
    #[must_use]
    fn renormalize(self) -> Self {
        self
    }

    /// Mix two working values by `weight`
    ///
    /// The endpoints are exact: at or below zero `self` is returned
    /// unchanged, at or above one `other` is.
    fn blend(&self, other: &Self, weight: f32) -> Self {
        if weight <= 0.0 {
            *self
        } else if weight >= 1.0 {
            *other
        } else {
            self.interpolate(other, weight).renormalize()
        }
    }
}

// angle, x, y, z
impl Blend for AxisAngle {
    const SIZE: usize = StructureType::AXIS_ROTATE_SIZE;

    fn from_components(src: &[f32]) -> Option<Self> {
        match src {
            [angle, x, y, z, ..] => Some(Self::new(Vec3::new(*x, *y, *z), *angle)),
            _ => None,
        }
    }

    fn component(&self, index: usize) -> Option<f32> {
        match index {
            0 => Some(self.angle),
            1..=3 => Some(self.axis[index - 1]),
            _ => None,
        }
    }

    fn set_component(&mut self, index: usize, value: f32) -> bool {
        match index {
            0 => self.angle = value,
            1..=3 => self.axis[index - 1] = value,
            _ => return false,
        }
        true
    }

    fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            angle: lerp(self.angle, other.angle, t),
            axis: slerp_vec3(self.axis, other.axis, t),
        }
    }

    fn renormalize(self) -> Self {
        Self {
            axis: normalize(self.axis),
            ..self
        }
    }
}

// r, i, j, k
impl Blend for Quat {
    const SIZE: usize = StructureType::QUATERNION_SIZE;

    fn from_components(src: &[f32]) -> Option<Self> {
        match src {
            [r, i, j, k, ..] => Some(Self::from_xyzw(*i, *j, *k, *r)),
            _ => None,
        }
    }

    fn component(&self, index: usize) -> Option<f32> {
        match index {
            0 => Some(self.w),
            1 => Some(self.x),
            2 => Some(self.y),
            3 => Some(self.z),
            _ => None,
        }
    }

    fn set_component(&mut self, index: usize, value: f32) -> bool {
        let [mut x, mut y, mut z, mut w] = self.to_array();
        match index {
            0 => w = value,
            1 => x = value,
            2 => y = value,
            3 => z = value,
            _ => return false,
        }
        *self = Self::from_xyzw(x, y, z, w);
        true
    }

    fn interpolate(&self, other: &Self, t: f32) -> Self {
        slerp_quat(*self, *other, t)
    }

    fn renormalize(self) -> Self {
        normalize_quat(self)
    }
}

impl Blend for Vec3 {
    const SIZE: usize = 3;

    fn from_components(src: &[f32]) -> Option<Self> {
        match src {
            [x, y, z, ..] => Some(Self::new(*x, *y, *z)),
            _ => None,
        }
    }

    fn component(&self, index: usize) -> Option<f32> {
        (index < Self::SIZE).then(|| self[index])
    }

    fn set_component(&mut self, index: usize, value: f32) -> bool {
        if index < Self::SIZE {
            self[index] = value;
            true
        } else {
            false
        }
    }

    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.lerp(*other, t)
    }
}

// column-major
impl Blend for Mat4 {
    const SIZE: usize = StructureType::MATRIX_SIZE;

    fn from_components(src: &[f32]) -> Option<Self> {
        src.get(..Self::SIZE).map(Self::from_cols_slice)
    }

    fn component(&self, index: usize) -> Option<f32> {
        self.to_cols_array().get(index).copied()
    }

    fn set_component(&mut self, index: usize, value: f32) -> bool {
        let mut cols = self.to_cols_array();
        let Some(slot) = cols.get_mut(index) else {
            return false;
        };
        *slot = value;
        *self = Self::from_cols_array(&cols);
        true
    }

    fn interpolate(&self, other: &Self, t: f32) -> Self {
        blend_matrix(self, other, t)
    }
}

/// Bind-pose value plus the two working values of a transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<T> {
    pub initial: T,
    pub value: [T; NUM_BLEND_SLOTS],
}

impl<T: Blend> Param<T> {
    /// Both working values start at `initial`
    pub fn new(initial: T) -> Self {
        Self {
            initial,
            value: [initial; NUM_BLEND_SLOTS],
        }
    }

    pub fn get(&self, slot: BlendSlot) -> T {
        self.value[slot.index()]
    }

    pub fn set(&mut self, slot: BlendSlot, value: T) {
        self.value[slot.index()] = value;
    }

    /// Copy `initial` into one working value
    pub fn reset_slot(&mut self, slot: BlendSlot) {
        self.value[slot.index()] = self.initial;
    }

    pub fn copy_slot(&mut self, dest: BlendSlot, src: BlendSlot) {
        self.value[dest.index()] = self.value[src.index()];
    }

    /// Working values mixed by `weight`
    pub fn blended(&self, weight: f32) -> T {
        self.value[0].blend(&self.value[1], weight)
    }
}

/// The closed set of transform kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformValue {
    AxisRotate(Param<AxisAngle>),
    Quaternion(Param<Quat>),
    Scale(Param<Vec3>),
    Translate(Param<Vec3>),
    Matrix(Param<Mat4>),
}

/// A transform parameter held by one of a node's transform slots
#[derive(Debug)]
pub struct Transform {
    identity: Identity,
    value: TransformValue,
}

identity_eq!(Transform);

impl Structure for Transform {
    fn structure_type(&self) -> StructureType {
        match self.value {
            TransformValue::AxisRotate(_) => StructureType::AxisRotate,
            TransformValue::Quaternion(_) => StructureType::Quaternion,
            TransformValue::Scale(_) => StructureType::Scale,
            TransformValue::Translate(_) => StructureType::Translate,
            TransformValue::Matrix(_) => StructureType::Matrix,
        }
    }

    fn identity(&self) -> Identity {
        self.identity
    }
}

impl Transform {
    pub fn new(value: TransformValue) -> Self {
        Self {
            identity: Identity::next(),
            value,
        }
    }

    pub fn axis_rotate(initial: AxisAngle) -> Self {
        Self::new(TransformValue::AxisRotate(Param::new(initial)))
    }

    pub fn quaternion(initial: Quat) -> Self {
        Self::new(TransformValue::Quaternion(Param::new(initial)))
    }

    pub fn scale(initial: Vec3) -> Self {
        Self::new(TransformValue::Scale(Param::new(initial)))
    }

    pub fn translate(initial: Vec3) -> Self {
        Self::new(TransformValue::Translate(Param::new(initial)))
    }

    pub fn matrix(initial: Mat4) -> Self {
        Self::new(TransformValue::Matrix(Param::new(initial)))
    }

    pub const fn value(&self) -> &TransformValue {
        &self.value
    }

    pub const fn value_mut(&mut self) -> &mut TransformValue {
        &mut self.value
    }

    /// Number of float components in one working value
    pub const fn size(&self) -> usize {
        match self.value {
            TransformValue::AxisRotate(_) => AxisAngle::SIZE,
            TransformValue::Quaternion(_) => Quat::SIZE,
            TransformValue::Scale(_) | TransformValue::Translate(_) => Vec3::SIZE,
            TransformValue::Matrix(_) => Mat4::SIZE,
        }
    }

    /// Restore the base working value from `initial`
    ///
    /// The animated value is left untouched.
    pub fn reset(&mut self) {
        self.reset_slot(BlendSlot::Base);
    }

    /// Restore one working value from `initial`
    pub fn reset_slot(&mut self, slot: BlendSlot) {
        match &mut self.value {
            TransformValue::AxisRotate(p) => p.reset_slot(slot),
            TransformValue::Quaternion(p) => p.reset_slot(slot),
            TransformValue::Scale(p) | TransformValue::Translate(p) => p.reset_slot(slot),
            TransformValue::Matrix(p) => p.reset_slot(slot),
        }
    }

    /// Copy one working value over the other
    pub fn copy_slot(&mut self, dest: BlendSlot, src: BlendSlot) {
        match &mut self.value {
            TransformValue::AxisRotate(p) => p.copy_slot(dest, src),
            TransformValue::Quaternion(p) => p.copy_slot(dest, src),
            TransformValue::Scale(p) | TransformValue::Translate(p) => p.copy_slot(dest, src),
            TransformValue::Matrix(p) => p.copy_slot(dest, src),
        }
    }

    /// Read one float component of a working value
    pub fn component(&self, slot: BlendSlot, index: usize) -> Option<f32> {
        match &self.value {
            TransformValue::AxisRotate(p) => p.get(slot).component(index),
            TransformValue::Quaternion(p) => p.get(slot).component(index),
            TransformValue::Scale(p) | TransformValue::Translate(p) => p.get(slot).component(index),
            TransformValue::Matrix(p) => p.get(slot).component(index),
        }
    }

    /// Write one float component of a working value
    ///
    /// Returns false if `index` is past the end of the value.
    pub fn set_component(&mut self, slot: BlendSlot, index: usize, value: f32) -> bool {
        fn write<T: Blend>(param: &mut Param<T>, slot: BlendSlot, index: usize, value: f32) -> bool {
            let mut current = param.get(slot);
            let written = current.set_component(index, value);
            param.set(slot, current);
            written
        }

        match &mut self.value {
            TransformValue::AxisRotate(p) => write(p, slot, index, value),
            TransformValue::Quaternion(p) => write(p, slot, index, value),
            TransformValue::Scale(p) | TransformValue::Translate(p) => write(p, slot, index, value),
            TransformValue::Matrix(p) => write(p, slot, index, value),
        }
    }

    /// Matrix of the working values mixed by `weight`
    pub fn matrix_at(&self, weight: f32) -> Mat4 {
        match &self.value {
            TransformValue::AxisRotate(p) => Mat4::from_quat(p.blended(weight).to_quat()),
            TransformValue::Quaternion(p) => {
                let q = normalize_quat(p.blended(weight));
                if q.length_squared() == 0.0 {
                    Mat4::IDENTITY
                } else {
                    Mat4::from_quat(q)
                }
            }
            TransformValue::Scale(p) => Mat4::from_scale(p.blended(weight)),
            TransformValue::Translate(p) => Mat4::from_translation(p.blended(weight)),
            TransformValue::Matrix(p) => p.blended(weight),
        }
    }

    /// Right-multiply `m` by this transform at `weight`
    pub fn apply_to(&self, m: Mat4, weight: f32) -> Mat4 {
        m * self.matrix_at(weight)
    }
}
