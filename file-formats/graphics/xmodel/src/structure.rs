//! Structure tags and process-unique identities
//!
//! Every element of the model graph carries a [`StructureType`] tag and an
//! [`Identity`]. Identities are handed out from a process-wide counter and are
//! never reused, so two elements compare equal only if they are the same
//! element.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a model element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(u64);

impl Identity {
    /// Allocate the next identity
    pub fn next() -> Self {
        Self(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Type tag of a model element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum StructureType {
    Null = 0,
    AxisRotate = 1,
    Quaternion = 2,
    Scale = 3,
    Translate = 4,
    Matrix = 5,
    Container = 6,
    Texture = 7,
    Material = 8,
    Mesh = 9,
    Node = 10,
    Ik = 11,
    Animation = 12,
    AnimationKey = 13,
    AnimationSet = 14,
    MeshSubset = 15,
}

impl StructureType {
    /// Number of floats in an axis-angle value (angle, x, y, z)
    pub const AXIS_ROTATE_SIZE: usize = 4;
    /// Number of floats in a quaternion value (r, i, j, k)
    pub const QUATERNION_SIZE: usize = 4;
    /// Number of floats in a scale value
    pub const SCALE_SIZE: usize = 3;
    /// Number of floats in a translation value
    pub const TRANSLATE_SIZE: usize = 3;
    /// Number of floats in a column-major 4x4 matrix
    pub const MATRIX_SIZE: usize = 16;

    /// Parse a raw tag
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Null,
            1 => Self::AxisRotate,
            2 => Self::Quaternion,
            3 => Self::Scale,
            4 => Self::Translate,
            5 => Self::Matrix,
            6 => Self::Container,
            7 => Self::Texture,
            8 => Self::Material,
            9 => Self::Mesh,
            10 => Self::Node,
            11 => Self::Ik,
            12 => Self::Animation,
            13 => Self::AnimationKey,
            14 => Self::AnimationSet,
            15 => Self::MeshSubset,
            _ => return None,
        })
    }

    /// Raw tag value
    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Whether this tag names one of the transform kinds a node slot can hold
    pub const fn is_transform(self) -> bool {
        matches!(
            self,
            Self::AxisRotate | Self::Quaternion | Self::Scale | Self::Translate | Self::Matrix
        )
    }

    /// Number of floats in one blend slot of a transform of this kind
    pub const fn value_size(self) -> Option<usize> {
        match self {
            Self::AxisRotate => Some(Self::AXIS_ROTATE_SIZE),
            Self::Quaternion => Some(Self::QUATERNION_SIZE),
            Self::Scale => Some(Self::SCALE_SIZE),
            Self::Translate => Some(Self::TRANSLATE_SIZE),
            Self::Matrix => Some(Self::MATRIX_SIZE),
            _ => None,
        }
    }
}

/// Common surface of every tagged model element
pub trait Structure {
    /// Type tag
    fn structure_type(&self) -> StructureType;

    /// Process-unique identity
    fn identity(&self) -> Identity;
}

/// Implement identity-based equality and hashing for a [`Structure`]
macro_rules! identity_eq {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    $crate::structure::Structure::identity(self)
                        == $crate::structure::Structure::identity(other)
                }
            }

            impl Eq for $ty {}

            impl std::hash::Hash for $ty {
                fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                    std::hash::Hash::hash(&$crate::structure::Structure::identity(self), state);
                }
            }
        )+
    };
}

pub(crate) use identity_eq;
