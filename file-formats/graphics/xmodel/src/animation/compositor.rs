//! Local and world matrix composition
//!
//! A node's local matrix is the product of its present transforms in slot
//! order (matrix, translate, scale, rotate), each taken at the blend weight.
//! World matrices are built top-down: `combined = parent.combined * local`.

use glam::Mat4;

use crate::node::{Node, NodeTree};

/// Local matrix of `node` with its working values mixed by `weight`
///
/// At `weight <= 0` only the base values are used, at `weight >= 1` only the
/// animated ones.
pub fn local_matrix(node: &Node, weight: f32) -> Mat4 {
    node.transforms()
        .fold(Mat4::IDENTITY, |m, (_, transform)| transform.apply_to(m, weight))
}

/// Recompute every combined matrix, roots relative to the identity
pub fn update_combination(tree: &mut NodeTree, weight: f32) {
    update_combination_from(tree, Mat4::IDENTITY, weight);
}

/// Recompute every combined matrix, roots relative to `root_parent`
pub fn update_combination_from(tree: &mut NodeTree, root_parent: Mat4, weight: f32) {
    let ids: Vec<_> = tree.ids().collect();
    for &id in &ids {
        // Parents precede their children in the arena.
        let parent = tree
            .parent(id)
            .and_then(|p| tree.get(p))
            .map_or(root_parent, |p| p.combined_matrix);
        if let Some(node) = tree.get_mut(id) {
            node.combined_matrix = parent * local_matrix(node, weight);
        }
    }
    log::trace!("Composed {} node matrices at weight {weight}", ids.len());
}
