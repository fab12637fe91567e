//! Matrix-palette vertex skinning
//!
//! Skinning runs after the node tree has been composed for the current tick:
//!
//! 1. [`update_matrix_palette`] combines every bone's world matrix with its
//!    bind-pose inverse.
//! 2. [`update_vertices`] blends each vertex by its weighted bone influences.
//!
//! Positions use the full affine transform. Normals use only the axis block
//! of each palette matrix, so translation never leaks into them.
//!
//! # Example
//!
//! ```rust
//! use glam::{Mat4, Vec3};
//! use xmodel::node::{Node, NodeTree};
//! use xmodel::skin::Skin;
//! use xmodel::skinning::{SkinnedMesh, Skinner, SkinningOptions};
//! use xmodel::transform::{Transform, TransformSlot};
//!
//! let mut tree = NodeTree::new();
//! let bone = tree.add_root(
//!     Node::new("bone").with_transform(TransformSlot::Translate, Transform::translate(Vec3::Y)),
//! );
//! xmodel::animation::update_combination(&mut tree, 0.0);
//!
//! let skin = Skin::new(1, vec![0], vec![1.0], vec![Some(bone)], vec![Mat4::IDENTITY])?;
//! let mut mesh = SkinnedMesh::new(&[Vec3::ZERO], &[Vec3::Z]);
//!
//! let mut skinner = Skinner::new(SkinningOptions::default());
//! skinner.update_palette(&skin, &tree);
//! skinner.skin_mesh(&skin, &mut mesh);
//!
//! assert_eq!(mesh.position(0), Some(Vec3::Y));
//! assert_eq!(mesh.normal(0), Some(Vec3::Z));
//! # Ok::<(), xmodel::ModelError>(())
//! ```

use glam::{Mat4, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::math::axis_matrix;
use crate::node::NodeTree;
use crate::skin::Skin;

/// Floats per vector in a vertex stream
const VECTOR_SIZE: usize = 3;

/// Which transform a vertex stream receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorKind {
    /// Affine transform, translation applied
    Position,
    /// Axis block only, translation ignored
    Normal,
}

impl VectorKind {
    pub fn transform(self, m: &Mat4, v: Vec3) -> Vec3 {
        match self {
            Self::Position => m.transform_point3(v),
            Self::Normal => m.transform_vector3(v),
        }
    }
}

/// Write bone matrices for `skin` into `out`
///
/// `out[i] = combined(nodes[i]) * offset_matrices[i]`. A missing bone writes
/// the identity. At most `out.len()` entries are written; the number written
/// is returned.
pub fn update_matrix_palette(skin: &Skin, tree: &NodeTree, out: &mut [Mat4]) -> usize {
    let count = skin.num_nodes().min(out.len());
    let bones = skin.nodes().iter().zip(skin.offset_matrices());

    for (entry, (id, offset)) in out.iter_mut().zip(bones) {
        *entry = match id.and_then(|id| tree.get(id)) {
            Some(node) => node.combined_matrix * *offset,
            None => {
                if let Some(id) = id {
                    log::warn!("Skin bone {id} is not in the node tree, using identity");
                }
                Mat4::IDENTITY
            }
        };
    }

    if count < skin.num_nodes() {
        log::trace!(
            "Palette truncated to {count} of {} bones",
            skin.num_nodes()
        );
    }
    count
}

/// Turn a position palette into a normal palette in place
///
/// Drops translation and, with `normalize_axes`, removes scale from each
/// axis column.
pub fn prepare_normal_palette(palette: &mut [Mat4], normalize_axes: bool) {
    for m in palette {
        *m = axis_matrix(m, normalize_axes);
    }
}

/// Flat float buffer holding one 3-vector every `stride` floats
#[derive(Debug, Clone, Copy)]
pub struct VertexStream<'a> {
    pub data: &'a [f32],
    pub stride: usize,
}

/// Mutable counterpart of [`VertexStream`]
#[derive(Debug)]
pub struct VertexStreamMut<'a> {
    pub data: &'a mut [f32],
    pub stride: usize,
}

/// Per-vertex bone influences
///
/// Vertex `v` reads its influences from `indices`/`weights` starting at
/// `v * stride`. `count` is the number of influences per vertex; `sizes`
/// optionally lowers it per vertex.
#[derive(Debug, Clone, Copy)]
pub struct Influences<'a> {
    pub indices: &'a [u16],
    pub weights: &'a [f32],
    pub stride: usize,
    pub count: usize,
    pub sizes: Option<&'a [u8]>,
}

impl<'a> Influences<'a> {
    pub fn from_skin(skin: &'a Skin) -> Self {
        Self {
            indices: skin.indices(),
            weights: skin.weights(),
            stride: skin.weighted_index_stride(),
            count: skin.weighted_index_stride(),
            sizes: skin.weighted_index_sizes(),
        }
    }
}

/// Number of vectors of `width` floats that fit in `len` floats at `stride`
fn rows(len: usize, stride: usize, width: usize) -> usize {
    if len < width { 0 } else { (len - width) / stride + 1 }
}

/// Skin a vertex stream with `palette`
///
/// A single influence per vertex transforms directly by its bone. Several
/// influences are accumulated as `sum(weight * transform(bone, v))`, skipping
/// influences whose weight is not positive. A vertex whose size entry is zero
/// has no influences and keeps its source vector in either path. Strides below
/// their natural minimum are raised to it. Indices outside the palette use the
/// identity.
///
/// Returns the number of vertices written, bounded by the shortest input.
pub fn update_vertices(
    palette: &[Mat4],
    source: VertexStream<'_>,
    dest: VertexStreamMut<'_>,
    influences: &Influences<'_>,
    kind: VectorKind,
) -> usize {
    let count = influences.count.max(1);
    let src_stride = source.stride.max(VECTOR_SIZE);
    let dest_stride = dest.stride.max(VECTOR_SIZE);
    let inf_stride = influences.stride.max(count);

    let vertices = rows(source.data.len(), src_stride, VECTOR_SIZE)
        .min(rows(dest.data.len(), dest_stride, VECTOR_SIZE))
        .min(rows(influences.indices.len(), inf_stride, count))
        .min(rows(influences.weights.len(), inf_stride, count));
    let bone = |index: u16| palette.get(usize::from(index)).unwrap_or(&Mat4::IDENTITY);

    for v in 0..vertices {
        let src = &source.data[v * src_stride..v * src_stride + VECTOR_SIZE];
        let vector = Vec3::from_slice(src);
        let base = v * inf_stride;
        let n = influences
            .sizes
            .and_then(|sizes| sizes.get(v))
            .map_or(count, |&size| usize::from(size).min(count));

        let skinned = if n == 0 {
            vector
        } else if count == 1 {
            kind.transform(bone(influences.indices[base]), vector)
        } else {
            let mut sum = Vec3::ZERO;
            for j in base..base + n {
                let weight = influences.weights[j];
                if weight > 0.0 {
                    sum += kind.transform(bone(influences.indices[j]), vector) * weight;
                }
            }
            sum
        };

        let out = &mut dest.data[v * dest_stride..v * dest_stride + VECTOR_SIZE];
        skinned.write_to_slice(out);
    }

    log::trace!("Skinned {vertices} {kind:?} vectors");
    vertices
}

/// Options for the CPU skinner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SkinningOptions {
    /// Whether normals are skinned along with positions
    pub update_normals: bool,
    /// Whether the normal palette has scale removed from its axes
    pub normalize_normal_axes: bool,
}

impl Default for SkinningOptions {
    fn default() -> Self {
        Self {
            update_normals: true,
            normalize_normal_axes: true,
        }
    }
}

/// Bind-pose vertex data and its skinned copy
#[derive(Debug, Clone, Default)]
pub struct SkinnedMesh {
    bind_positions: Vec<f32>,
    bind_normals: Vec<f32>,
    positions: Vec<f32>,
    normals: Vec<f32>,
}

impl SkinnedMesh {
    /// Mesh from bind-pose positions and normals; `normals` may be empty
    pub fn new(positions: &[Vec3], normals: &[Vec3]) -> Self {
        let flatten = |vs: &[Vec3]| vs.iter().flat_map(|v| v.to_array()).collect::<Vec<_>>();
        let bind_positions = flatten(positions);
        let bind_normals = flatten(normals);
        Self {
            positions: bind_positions.clone(),
            normals: bind_normals.clone(),
            bind_positions,
            bind_normals,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.bind_positions.len() / VECTOR_SIZE
    }

    /// Skinned positions, three floats per vertex
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Skinned normals, three floats per vertex
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn position(&self, index: usize) -> Option<Vec3> {
        vector_at(&self.positions, index)
    }

    pub fn normal(&self, index: usize) -> Option<Vec3> {
        vector_at(&self.normals, index)
    }
}

fn vector_at(data: &[f32], index: usize) -> Option<Vec3> {
    let start = index.checked_mul(VECTOR_SIZE)?;
    data.get(start..start + VECTOR_SIZE).map(Vec3::from_slice)
}

/// CPU skinning driver holding the palettes between ticks
#[derive(Debug, Clone, Default)]
pub struct Skinner {
    options: SkinningOptions,
    palette: Vec<Mat4>,
    normal_palette: Vec<Mat4>,
}

impl Skinner {
    pub fn new(options: SkinningOptions) -> Self {
        Self {
            options,
            palette: Vec::new(),
            normal_palette: Vec::new(),
        }
    }

    pub const fn options(&self) -> &SkinningOptions {
        &self.options
    }

    /// Bone matrices from the last [`Skinner::update_palette`]
    pub fn palette(&self) -> &[Mat4] {
        &self.palette
    }

    pub fn normal_palette(&self) -> &[Mat4] {
        &self.normal_palette
    }

    /// Rebuild the palettes from the composed node tree
    pub fn update_palette(&mut self, skin: &Skin, tree: &NodeTree) -> usize {
        self.palette.resize(skin.num_nodes(), Mat4::IDENTITY);
        let written = update_matrix_palette(skin, tree, &mut self.palette);

        if self.options.update_normals {
            self.normal_palette.clone_from(&self.palette);
            prepare_normal_palette(&mut self.normal_palette, self.options.normalize_normal_axes);
        }
        written
    }

    /// Re-skin `mesh` with the current palettes, returns vertices written
    pub fn skin_mesh(&self, skin: &Skin, mesh: &mut SkinnedMesh) -> usize {
        let influences = Influences::from_skin(skin);
        let written = update_vertices(
            &self.palette,
            VertexStream {
                data: &mesh.bind_positions,
                stride: VECTOR_SIZE,
            },
            VertexStreamMut {
                data: &mut mesh.positions,
                stride: VECTOR_SIZE,
            },
            &influences,
            VectorKind::Position,
        );

        if self.options.update_normals && !mesh.bind_normals.is_empty() {
            update_vertices(
                &self.normal_palette,
                VertexStream {
                    data: &mesh.bind_normals,
                    stride: VECTOR_SIZE,
                },
                VertexStreamMut {
                    data: &mut mesh.normals,
                    stride: VECTOR_SIZE,
                },
                &influences,
                VectorKind::Normal,
            );
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::update_combination;
    use crate::node::{Node, NodeId};
    use crate::transform::{Transform, TransformSlot};
    use glam::Quat;
    use pretty_assertions::assert_eq;
    use std::f32::consts::FRAC_PI_2;
    use test_case::test_case;

    const EPSILON: f32 = 1e-5;

    fn influences<'a>(indices: &'a [u16], weights: &'a [f32], count: usize) -> Influences<'a> {
        Influences {
            indices,
            weights,
            stride: count,
            count,
            sizes: None,
        }
    }

    fn skin_all(palette: &[Mat4], src: &[f32], inf: &Influences<'_>, kind: VectorKind) -> Vec<f32> {
        let mut out = vec![0.0; src.len()];
        update_vertices(
            palette,
            VertexStream { data: src, stride: 3 },
            VertexStreamMut {
                data: &mut out,
                stride: 3,
            },
            inf,
            kind,
        );
        out
    }

    #[test]
    fn test_palette_combines_world_and_offset() {
        let mut tree = NodeTree::new();
        let bone = tree.add_root(Node::new("bone"));
        tree.get_mut(bone).unwrap().combined_matrix = Mat4::from_translation(Vec3::X);
        let offset = Mat4::from_translation(Vec3::NEG_Y);
        let skin = Skin::new(1, vec![0], vec![1.0], vec![Some(bone), None], vec![offset, offset]).unwrap();

        let mut palette = [Mat4::ZERO; 2];
        assert_eq!(update_matrix_palette(&skin, &tree, &mut palette), 2);
        assert_eq!(palette[0], Mat4::from_translation(Vec3::new(1.0, -1.0, 0.0)));
        assert_eq!(palette[1], Mat4::IDENTITY);
    }

    #[test]
    fn test_palette_truncates_to_capacity() {
        let tree = NodeTree::new();
        let skin = Skin::new(1, vec![0], vec![1.0], vec![None; 3], vec![Mat4::IDENTITY; 3]).unwrap();
        let mut palette = [Mat4::ZERO; 2];
        assert_eq!(update_matrix_palette(&skin, &tree, &mut palette), 2);

        let mut larger = [Mat4::ZERO; 5];
        assert_eq!(update_matrix_palette(&skin, &tree, &mut larger), 3);
        assert_eq!(larger[3], Mat4::ZERO);
    }

    #[test]
    fn test_palette_dangling_bone_is_identity() {
        let tree = NodeTree::new();
        let mut other = NodeTree::new();
        let foreign: NodeId = other.add_root(Node::new("elsewhere"));
        let skin = Skin::new(1, vec![0], vec![1.0], vec![Some(foreign)], vec![Mat4::ZERO]).unwrap();
        let mut palette = [Mat4::ZERO; 1];
        update_matrix_palette(&skin, &tree, &mut palette);
        assert_eq!(palette[0], Mat4::IDENTITY);
    }

    #[test]
    fn test_single_influence_fast_path_matches_general_path() {
        let palette = [
            Mat4::from_rotation_translation(Quat::from_rotation_z(0.3), Vec3::new(1.0, 2.0, 3.0)),
            Mat4::from_scale(Vec3::new(2.0, 1.0, 0.5)),
        ];
        let src = [1.0, 0.0, 0.0, 0.5, -2.0, 4.0, 0.0, 0.0, 1.0];
        let indices = [1u16, 0, 1];

        let fast = skin_all(&palette, &src, &influences(&indices, &[1.0; 3], 1), VectorKind::Position);

        // Same influences padded to two slots with a zero-weight second bone.
        let padded_indices = [1u16, 0, 0, 1, 1, 0];
        let padded_weights = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let general = skin_all(
            &palette,
            &src,
            &influences(&padded_indices, &padded_weights, 2),
            VectorKind::Position,
        );

        assert_eq!(fast, general);
        for v in 0..3 {
            let direct = palette[usize::from(indices[v])].transform_point3(Vec3::from_slice(&src[v * 3..]));
            assert_eq!(Vec3::from_slice(&fast[v * 3..]), direct);
        }
    }

    #[test]
    fn test_normals_ignore_translation() {
        let palette = [Mat4::from_translation(Vec3::new(10.0, -4.0, 7.0))];
        let normal = [0.0, 1.0, 0.0];
        let out = skin_all(&palette, &normal, &influences(&[0], &[1.0], 1), VectorKind::Normal);
        assert_eq!(out, normal.to_vec());

        let out = skin_all(&palette, &normal, &influences(&[0], &[1.0], 1), VectorKind::Position);
        assert_eq!(out, vec![10.0, -3.0, 7.0]);
    }

    #[test]
    fn test_weighted_blend() {
        let palette = [
            Mat4::from_translation(Vec3::X * 2.0),
            Mat4::from_translation(Vec3::Y * 2.0),
        ];
        let out = skin_all(
            &palette,
            &[0.0, 0.0, 0.0],
            &influences(&[0, 1], &[0.5, 0.5], 2),
            VectorKind::Position,
        );
        assert_eq!(out, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_sizes_limit_influences_and_bad_index_is_identity() {
        let palette = [Mat4::from_translation(Vec3::X)];
        let inf = Influences {
            indices: &[0, 0, 9, 9],
            weights: &[1.0, 1.0, 1.0, 0.0],
            stride: 2,
            count: 2,
            sizes: Some(&[1, 2]),
        };
        let out = skin_all(&palette, &[0.0, 0.0, 0.0, 5.0, 5.0, 5.0], &inf, VectorKind::Position);
        assert_eq!(out, vec![1.0, 0.0, 0.0, 5.0, 5.0, 5.0]);
    }

    #[test_case(1 ; "single influence")]
    #[test_case(2 ; "two influences")]
    fn test_vertex_without_influences_keeps_source(count: usize) {
        let palette = [Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))];
        let indices = vec![0; count * 2];
        let weights = vec![1.0; count * 2];
        let sizes = [0, 1];
        let inf = Influences {
            indices: &indices,
            weights: &weights,
            stride: count,
            count,
            sizes: Some(&sizes),
        };
        let out = skin_all(&palette, &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0], &inf, VectorKind::Position);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 6.0, 1.0, 1.0]);
    }

    #[test]
    fn test_strides_are_clamped_and_inputs_bound_count() {
        let palette = [Mat4::from_translation(Vec3::Z)];
        let src = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut out = [0.0; 6];
        let written = update_vertices(
            &palette,
            VertexStream { data: &src, stride: 1 },
            VertexStreamMut {
                data: &mut out,
                stride: 0,
            },
            &influences(&[0], &[1.0], 1),
            VectorKind::Position,
        );
        assert_eq!(written, 1);
        assert_eq!(out, [1.0, 2.0, 4.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_interleaved_stream() {
        let palette = [Mat4::from_translation(Vec3::X)];
        // position, then two floats of unrelated attributes
        let src = [0.0, 0.0, 0.0, 9.0, 9.0, 1.0, 1.0, 1.0, 9.0, 9.0];
        let mut out = [0.0; 10];
        let written = update_vertices(
            &palette,
            VertexStream { data: &src, stride: 5 },
            VertexStreamMut {
                data: &mut out,
                stride: 5,
            },
            &influences(&[0, 0], &[1.0, 1.0], 1),
            VectorKind::Position,
        );
        assert_eq!(written, 2);
        assert_eq!(out, [1.0, 0.0, 0.0, 0.0, 0.0, 2.0, 1.0, 1.0, 0.0, 0.0]);
    }

    fn rotated_bone() -> (NodeTree, NodeId) {
        let mut tree = NodeTree::new();
        let bone = tree.add_root(
            Node::new("bone")
                .with_transform(TransformSlot::Translate, Transform::translate(Vec3::new(0.0, 0.0, 5.0)))
                .with_transform(TransformSlot::Scale, Transform::scale(Vec3::splat(3.0)))
                .with_transform(TransformSlot::Rotate, Transform::quaternion(Quat::from_rotation_z(FRAC_PI_2))),
        );
        update_combination(&mut tree, 0.0);
        (tree, bone)
    }

    #[test]
    fn test_skinner_normal_palette_is_rotation_only() {
        let (tree, bone) = rotated_bone();
        let skin = Skin::new(1, vec![0], vec![1.0], vec![Some(bone)], vec![Mat4::IDENTITY]).unwrap();
        let mut mesh = SkinnedMesh::new(&[Vec3::X], &[Vec3::X]);
        let mut skinner = Skinner::new(SkinningOptions::default());

        assert_eq!(skinner.update_palette(&skin, &tree), 1);
        assert_eq!(skinner.skin_mesh(&skin, &mut mesh), 1);

        assert!(mesh.position(0).unwrap().abs_diff_eq(Vec3::new(0.0, 3.0, 5.0), EPSILON));
        assert!(mesh.normal(0).unwrap().abs_diff_eq(Vec3::Y, EPSILON));
        assert_eq!(mesh.vertex_count(), 1);
        assert_eq!(mesh.position(1), None);
    }

    #[test]
    fn test_skinner_can_skip_normals() {
        let (tree, bone) = rotated_bone();
        let skin = Skin::new(1, vec![0], vec![1.0], vec![Some(bone)], vec![Mat4::IDENTITY]).unwrap();
        let mut mesh = SkinnedMesh::new(&[Vec3::X], &[Vec3::X]);
        let mut skinner = Skinner::new(SkinningOptions {
            update_normals: false,
            ..SkinningOptions::default()
        });

        skinner.update_palette(&skin, &tree);
        skinner.skin_mesh(&skin, &mut mesh);

        assert_eq!(mesh.normal(0), Some(Vec3::X));
        assert!(skinner.normal_palette().is_empty());
    }
}
