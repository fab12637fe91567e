//! Node hierarchy
//!
//! Nodes live in a [`NodeTree`] arena and refer to each other through
//! [`NodeId`] handles. The tree owns every node; parent links, skin bone
//! lists and animation targets only hold handles.
//!
//! A child can only be attached to a node that already exists, so a parent
//! always has a lower index than its children. Walking the arena in index
//! order therefore visits parents first.

use std::fmt;
use std::f32::consts::PI;

use bitflags::bitflags;
use glam::{Mat4, Vec3};

use crate::error::{ModelError, Result};
use crate::structure::{Identity, Structure, StructureType, identity_eq};
use crate::transform::{BlendSlot, NUM_TRANSFORM_SLOTS, Transform, TransformSlot};

bitflags! {
    /// Per-axis flags used by inverse kinematics
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisFlags: u8 {
        const X = 0x01;
        const Y = 0x02;
        const Z = 0x04;
    }
}

/// Handle of a node inside a [`NodeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in the arena
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bone or grouping node of the model
#[derive(Debug)]
pub struct Node {
    identity: Identity,
    pub name: String,
    /// Whether the node is attached to its parent's bone chain
    pub connected: bool,
    pub lock_axes: AxisFlags,
    pub limit_angles: AxisFlags,
    pub min_angles: Vec3,
    pub max_angles: Vec3,
    pub bone_tail: Vec3,
    transforms: [Option<Transform>; NUM_TRANSFORM_SLOTS],
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Inverse of the bind-pose world matrix
    pub offset_matrix: Mat4,
    /// World matrix, recomputed by every composition pass
    pub combined_matrix: Mat4,
}

identity_eq!(Node);

impl Structure for Node {
    fn structure_type(&self) -> StructureType {
        StructureType::Node
    }

    fn identity(&self) -> Identity {
        self.identity
    }
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: Identity::next(),
            name: name.into(),
            connected: true,
            lock_axes: AxisFlags::empty(),
            limit_angles: AxisFlags::empty(),
            min_angles: Vec3::splat(-PI),
            max_angles: Vec3::splat(PI),
            bone_tail: Vec3::ZERO,
            transforms: [None, None, None, None],
            parent: None,
            children: Vec::new(),
            offset_matrix: Mat4::IDENTITY,
            combined_matrix: Mat4::IDENTITY,
        }
    }

    /// Builder form of [`Node::set_transform`]
    #[must_use]
    pub fn with_transform(mut self, slot: TransformSlot, transform: Transform) -> Self {
        self.transforms[slot.index()] = Some(transform);
        self
    }

    /// Store a transform, returning the one it replaces
    pub fn set_transform(&mut self, slot: TransformSlot, transform: Transform) -> Option<Transform> {
        self.transforms[slot.index()].replace(transform)
    }

    pub fn take_transform(&mut self, slot: TransformSlot) -> Option<Transform> {
        self.transforms[slot.index()].take()
    }

    pub fn transform(&self, slot: TransformSlot) -> Option<&Transform> {
        self.transforms[slot.index()].as_ref()
    }

    pub fn transform_mut(&mut self, slot: TransformSlot) -> Option<&mut Transform> {
        self.transforms[slot.index()].as_mut()
    }

    /// Present transforms in evaluation order
    pub fn transforms(&self) -> impl Iterator<Item = (TransformSlot, &Transform)> {
        TransformSlot::ALL
            .into_iter()
            .zip(&self.transforms)
            .filter_map(|(slot, t)| t.as_ref().map(|t| (slot, t)))
    }

    pub fn transforms_mut(&mut self) -> impl Iterator<Item = &mut Transform> {
        self.transforms.iter_mut().flatten()
    }

    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Reset base values from `initial` and copy them into the animated slot
    pub fn reset_transforms(&mut self) {
        for transform in self.transforms_mut() {
            transform.reset();
            transform.copy_slot(BlendSlot::Animated, BlendSlot::Base);
        }
    }
}

/// Arena owning every node of a model
#[derive(Debug, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> NodeId {
        // Handles are u32; a tree with more nodes than that is not addressable.
        NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX))
    }

    /// Add a top-level node
    pub fn add_root(&mut self, node: Node) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node { parent: None, ..node });
        self.roots.push(id);
        id
    }

    /// Attach `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(ModelError::NodeNotFound(parent));
        }
        let id = self.next_id();
        self.nodes.push(Node {
            parent: Some(parent),
            ..node
        });
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Like [`NodeTree::get`] but reports a missing node as an error
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(ModelError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.get_mut(id).ok_or(ModelError::NodeNotFound(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[][..], Node::children)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handles in arena order, parents before children
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    /// First node with the given name, in pre-order
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.pre_order()
            .map(|(id, _)| id)
            .find(|id| self.nodes[id.index()].name == name)
    }

    /// Depth-first pre-order walk yielding each node with its depth
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: self.roots.iter().rev().map(|&id| (id, 0)).collect(),
        }
    }

    /// Every node flattened in pre-order
    pub fn flatten(&self) -> Vec<NodeId> {
        self.pre_order().map(|(id, _)| id).collect()
    }

    /// Visit every node in pre-order with its depth below the roots
    pub fn for_each_with_depth<F>(&self, mut callback: F)
    where
        F: FnMut(NodeId, &Node, usize),
    {
        for (id, depth) in self.pre_order() {
            callback(id, &self.nodes[id.index()], depth);
        }
    }

    /// Reset every transform to its bind pose in both working slots
    pub fn reset_transforms(&mut self) {
        for node in &mut self.nodes {
            node.reset_transforms();
        }
    }

    /// Bake each node's offset matrix from its current combined matrix
    ///
    /// Nodes with a singular combined matrix keep their previous offset.
    pub fn update_offsets(&mut self) {
        let mut singular = 0usize;
        for node in &mut self.nodes {
            let det = node.combined_matrix.determinant();
            if det == 0.0 || !det.is_finite() {
                singular += 1;
                continue;
            }
            node.offset_matrix = node.combined_matrix.inverse();
        }
        if singular > 0 {
            log::warn!("Kept previous offset matrix for {singular} node(s) with a singular pose");
        }
        log::debug!("Baked offset matrices for {} nodes", self.nodes.len());
    }
}

/// Pre-order iterator over a [`NodeTree`]
pub struct PreOrder<'a> {
    tree: &'a NodeTree,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for PreOrder<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let children = self.tree.children(id);
        self.stack
            .extend(children.iter().rev().map(|&child| (child, depth + 1)));
        Some((id, depth))
    }
}
