//! Skin bone bindings and per-vertex influences

use glam::{Mat4, Quat};

use crate::error::{ModelError, Result};
use crate::node::{NodeId, NodeTree};

/// Bone bindings and weighted indices of a skinned mesh
///
/// Influences are stored as `weighted_index_stride` consecutive
/// (index, weight) pairs per vertex. `indices` refer to positions in
/// `nodes`/`offset_matrices`, which run in parallel.
#[derive(Debug)]
pub struct Skin {
    weighted_index_stride: usize,
    weighted_index_sizes: Option<Vec<u8>>,
    indices: Vec<u16>,
    weights: Vec<f32>,
    nodes: Vec<Option<NodeId>>,
    offset_matrices: Vec<Mat4>,
    offset_quaternions: Vec<Quat>,
}

impl Skin {
    /// Create a skin, checking that the buffers agree with each other
    pub fn new(
        weighted_index_stride: usize,
        indices: Vec<u16>,
        weights: Vec<f32>,
        nodes: Vec<Option<NodeId>>,
        offset_matrices: Vec<Mat4>,
    ) -> Result<Self> {
        if weighted_index_stride == 0 {
            return Err(ModelError::InvalidSkin(
                "weighted index stride must be at least 1".to_string(),
            ));
        }
        if indices.len() != weights.len() {
            return Err(ModelError::InvalidSkin(format!(
                "{} indices but {} weights",
                indices.len(),
                weights.len()
            )));
        }
        if indices.len() % weighted_index_stride != 0 {
            return Err(ModelError::InvalidSkin(format!(
                "{} influences is not a multiple of stride {weighted_index_stride}",
                indices.len()
            )));
        }
        if nodes.len() != offset_matrices.len() {
            return Err(ModelError::InvalidSkin(format!(
                "{} bones but {} offset matrices",
                nodes.len(),
                offset_matrices.len()
            )));
        }

        Ok(Self {
            weighted_index_stride,
            weighted_index_sizes: None,
            indices,
            weights,
            nodes,
            offset_matrices,
            offset_quaternions: Vec::new(),
        })
    }

    /// Attach per-vertex influence counts
    pub fn with_weighted_index_sizes(mut self, sizes: Vec<u8>) -> Result<Self> {
        if sizes.len() != self.vertex_count() {
            return Err(ModelError::InvalidSkin(format!(
                "{} influence counts for {} vertices",
                sizes.len(),
                self.vertex_count()
            )));
        }
        if let Some(&size) = sizes
            .iter()
            .find(|&&size| usize::from(size) > self.weighted_index_stride)
        {
            return Err(ModelError::InvalidSkin(format!(
                "influence count {size} exceeds stride {}",
                self.weighted_index_stride
            )));
        }
        self.weighted_index_sizes = Some(sizes);
        Ok(self)
    }

    /// Attach legacy per-bone offset rotations; carried, never evaluated
    #[must_use]
    pub fn with_offset_quaternions(mut self, quats: Vec<Quat>) -> Self {
        self.offset_quaternions = quats;
        self
    }

    /// Check that every bound bone exists in `tree`
    pub fn validate(&self, tree: &NodeTree) -> Result<()> {
        match self.nodes.iter().flatten().find(|&&id| !tree.contains(id)) {
            Some(&id) => Err(ModelError::NodeNotFound(id)),
            None => Ok(()),
        }
    }

    pub const fn weighted_index_stride(&self) -> usize {
        self.weighted_index_stride
    }

    pub fn weighted_index_sizes(&self) -> Option<&[u8]> {
        self.weighted_index_sizes.as_deref()
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn nodes(&self) -> &[Option<NodeId>] {
        &self.nodes
    }

    pub fn offset_matrices(&self) -> &[Mat4] {
        &self.offset_matrices
    }

    pub fn offset_quaternions(&self) -> &[Quat] {
        &self.offset_quaternions
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.indices.len() / self.weighted_index_stride
    }

    /// Copy each bound node's offset matrix into the skin
    ///
    /// Used after [`NodeTree::update_offsets`] when a model ships without
    /// precomputed bind-pose inverses.
    pub fn offsets_from_nodes(&mut self, tree: &NodeTree) {
        for (offset, id) in self.offset_matrices.iter_mut().zip(&self.nodes) {
            if let Some(node) = id.and_then(|id| tree.get(id)) {
                *offset = node.offset_matrix;
            }
        }
    }
}
