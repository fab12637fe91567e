//! Keyframe sampling
//!
//! Tracks are sampled by locating the pair of keys around the query time and
//! interpolating between them with the rule of the target's transform kind.
//! Queries before the first key or after the last one hold the boundary key.

use glam::{Mat4, Quat, Vec3};

use super::types::{Animation, AnimationKey, AnimationSet, AnimationTarget};
use crate::math::lerp;
use crate::node::NodeTree;
use crate::transform::{AxisAngle, Blend, BlendSlot, Param, TransformValue};

/// Keys to interpolate between and the fraction from `start` to `end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyBracket {
    pub start: usize,
    pub end: usize,
    pub rate: f32,
}

impl KeyBracket {
    const fn hold(index: usize) -> Self {
        Self {
            start: index,
            end: index,
            rate: 0.0,
        }
    }
}

/// Locate the keys around `time`
///
/// Returns `None` for an empty track. An exact hit, a single key and any
/// time outside the key range all resolve to one key with a rate of zero.
pub fn find_key_bracket(keys: &[AnimationKey], time: f64) -> Option<KeyBracket> {
    let last = keys.len().checked_sub(1)?;
    if last == 0 {
        return Some(KeyBracket::hold(0));
    }

    match keys.binary_search_by(|key| key.time.total_cmp(&time)) {
        Ok(index) => Some(KeyBracket::hold(index)),
        Err(0) => Some(KeyBracket::hold(0)),
        Err(insert) if insert > last => Some(KeyBracket::hold(last)),
        Err(insert) => {
            let start = insert - 1;
            let span = keys[insert].time - keys[start].time;
            let rate = if span > 0.0 {
                ((time - keys[start].time) / span) as f32
            } else {
                0.0
            };
            Some(KeyBracket {
                start,
                end: insert,
                rate,
            })
        }
    }
}

/// Sample `animation` and its children at `time` into `slot`
pub fn evaluate_animation(tree: &mut NodeTree, animation: &Animation, time: f64, slot: BlendSlot) {
    if let Some(target) = animation.target
        && let Some(bracket) = find_key_bracket(&animation.keys, time)
    {
        apply_bracket(tree, animation, target, bracket, slot);
    }

    for child in &animation.children {
        evaluate_animation(tree, child, time, slot);
    }
}

/// Sample every root track of `set` at `time` into `slot`
pub fn evaluate_animation_set(tree: &mut NodeTree, set: &AnimationSet, time: f64, slot: BlendSlot) {
    for animation in &set.animations {
        evaluate_animation(tree, animation, time, slot);
    }
}

fn apply_bracket(
    tree: &mut NodeTree,
    animation: &Animation,
    target: AnimationTarget,
    bracket: KeyBracket,
    slot: BlendSlot,
) {
    let Some(transform) = tree
        .get_mut(target.node)
        .and_then(|node| node.transform_mut(target.slot))
    else {
        log::warn!(
            "Animation '{}' targets node {} slot {:?} which has no transform",
            animation.name,
            target.node,
            target.slot
        );
        return;
    };

    let start = &animation.keys[bracket.start].value;
    let end = &animation.keys[bracket.end].value;
    let rate = bracket.rate;

    let written = if let Some(index) = animation.component {
        match (start.first(), end.first()) {
            (Some(&a), Some(&b)) => {
                let value = if rate <= 0.0 { a } else { lerp(a, b, rate) };
                transform.set_component(slot, index, value)
            }
            _ => false,
        }
    } else {
        match transform.value_mut() {
            TransformValue::AxisRotate(p) => interpolate_into::<AxisAngle>(p, start, end, rate, slot),
            TransformValue::Quaternion(p) => interpolate_into::<Quat>(p, start, end, rate, slot),
            TransformValue::Scale(p) | TransformValue::Translate(p) => {
                interpolate_into::<Vec3>(p, start, end, rate, slot)
            }
            TransformValue::Matrix(p) => interpolate_into::<Mat4>(p, start, end, rate, slot),
        }
    };

    if !written {
        log::warn!(
            "Animation '{}' has keys too short for its target, skipped",
            animation.name
        );
    }
}

fn interpolate_into<T: Blend>(
    param: &mut Param<T>,
    start: &[f32],
    end: &[f32],
    rate: f32,
    slot: BlendSlot,
) -> bool {
    let Some(a) = T::from_components(start) else {
        return false;
    };
    let value = if rate <= 0.0 {
        a
    } else {
        let Some(b) = T::from_components(end) else {
            return false;
        };
        a.interpolate(&b, rate)
    };
    param.set(slot, value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeId};
    use crate::transform::{Transform, TransformSlot};
    use pretty_assertions::assert_eq;
    use std::f32::consts::FRAC_PI_2;
    use test_case::test_case;

    const EPSILON: f32 = 1e-5;

    fn keys_at(times: &[f64]) -> Vec<AnimationKey> {
        times
            .iter()
            .map(|&t| AnimationKey::new(t, vec![t as f32]))
            .collect()
    }

    #[test_case(1.5, 1, 2, 0.5 ; "between keys")]
    #[test_case(-1.0, 0, 0, 0.0 ; "before first key")]
    #[test_case(100.0, 4, 4, 0.0 ; "after last key")]
    #[test_case(2.0, 2, 2, 0.0 ; "exact hit")]
    #[test_case(0.25, 0, 1, 0.25 ; "first interval")]
    fn test_find_key_bracket(time: f64, start: usize, end: usize, rate: f32) {
        let keys = keys_at(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            find_key_bracket(&keys, time),
            Some(KeyBracket { start, end, rate })
        );
    }

    #[test]
    fn test_find_key_bracket_small_tracks() {
        assert_eq!(find_key_bracket(&[], 1.0), None);
        assert_eq!(
            find_key_bracket(&keys_at(&[3.0]), 10.0),
            Some(KeyBracket::hold(0))
        );
    }

    #[test]
    fn test_find_key_bracket_duplicate_times() {
        let keys = keys_at(&[0.0, 1.0, 1.0, 2.0]);
        let bracket = find_key_bracket(&keys, 1.0).unwrap();
        assert_eq!(bracket.rate, 0.0);
        assert_eq!(keys[bracket.start].time, 1.0);
    }

    fn single_node(slot: TransformSlot, transform: Transform) -> (NodeTree, NodeId) {
        let mut tree = NodeTree::new();
        let id = tree.add_root(Node::new("bone").with_transform(slot, transform));
        (tree, id)
    }

    #[test]
    fn test_translate_track_lerps() {
        let (mut tree, id) = single_node(TransformSlot::Translate, Transform::translate(Vec3::ZERO));
        let anim = Animation::new("move")
            .with_target(id, TransformSlot::Translate)
            .with_keys(vec![
                AnimationKey::new(0.0, vec![0.0, 0.0, 0.0]),
                AnimationKey::new(2.0, vec![2.0, 4.0, 6.0]),
            ]);

        evaluate_animation(&mut tree, &anim, 0.5, BlendSlot::Animated);

        let t = tree.get(id).unwrap().transform(TransformSlot::Translate).unwrap();
        assert_eq!(t.component(BlendSlot::Animated, 0), Some(0.5));
        assert_eq!(t.component(BlendSlot::Animated, 1), Some(1.0));
        assert_eq!(t.component(BlendSlot::Animated, 2), Some(1.5));
        assert_eq!(t.component(BlendSlot::Base, 0), Some(0.0));
    }

    #[test]
    fn test_quaternion_track_slerps() {
        let (mut tree, id) = single_node(TransformSlot::Rotate, Transform::quaternion(Quat::IDENTITY));
        let quarter = Quat::from_rotation_y(FRAC_PI_2);
        let anim = Animation::new("turn")
            .with_target(id, TransformSlot::Rotate)
            .with_keys(vec![
                AnimationKey::new(0.0, vec![1.0, 0.0, 0.0, 0.0]),
                AnimationKey::new(1.0, vec![quarter.w, quarter.x, quarter.y, quarter.z]),
            ]);

        evaluate_animation(&mut tree, &anim, 0.5, BlendSlot::Animated);

        let node = tree.get(id).unwrap();
        let TransformValue::Quaternion(p) = node.transform(TransformSlot::Rotate).unwrap().value() else {
            panic!("expected quaternion");
        };
        let expected = Quat::from_rotation_y(FRAC_PI_2 * 0.5);
        assert!(p.get(BlendSlot::Animated).abs_diff_eq(expected, EPSILON));
    }

    #[test]
    fn test_axis_rotate_track_decouples_angle_and_axis() {
        let (mut tree, id) = single_node(TransformSlot::Rotate, Transform::axis_rotate(AxisAngle::default()));
        let anim = Animation::new("swing")
            .with_target(id, TransformSlot::Rotate)
            .with_keys(vec![
                AnimationKey::new(0.0, vec![0.0, 1.0, 0.0, 0.0]),
                AnimationKey::new(1.0, vec![2.0, 0.0, 1.0, 0.0]),
            ]);

        evaluate_animation(&mut tree, &anim, 0.5, BlendSlot::Animated);

        let node = tree.get(id).unwrap();
        let TransformValue::AxisRotate(p) = node.transform(TransformSlot::Rotate).unwrap().value() else {
            panic!("expected axis rotation");
        };
        let value = p.get(BlendSlot::Animated);
        assert!((value.angle - 1.0).abs() < EPSILON);
        assert!(value.axis.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0).normalize(), EPSILON));
    }

    #[test]
    fn test_matrix_track_lerps_translation() {
        let (mut tree, id) = single_node(TransformSlot::Matrix, Transform::matrix(Mat4::IDENTITY));
        let a = Mat4::IDENTITY.to_cols_array().to_vec();
        let b = Mat4::from_translation(Vec3::new(0.0, 0.0, 8.0)).to_cols_array().to_vec();
        let anim = Animation::new("slide")
            .with_target(id, TransformSlot::Matrix)
            .with_keys(vec![AnimationKey::new(0.0, a), AnimationKey::new(4.0, b)]);

        evaluate_animation(&mut tree, &anim, 1.0, BlendSlot::Animated);

        let t = tree.get(id).unwrap().transform(TransformSlot::Matrix).unwrap();
        assert_eq!(t.component(BlendSlot::Animated, 14), Some(2.0));
        assert_eq!(t.component(BlendSlot::Animated, 0), Some(1.0));
    }

    #[test]
    fn test_matrix_track_slerps_rotation_block() {
        let (mut tree, id) = single_node(TransformSlot::Matrix, Transform::matrix(Mat4::IDENTITY));
        let turned = Mat4::from_rotation_translation(Quat::from_rotation_z(FRAC_PI_2), Vec3::new(0.0, 0.0, 8.0));
        let anim = Animation::new("spin")
            .with_target(id, TransformSlot::Matrix)
            .with_keys(vec![
                AnimationKey::new(0.0, Mat4::IDENTITY.to_cols_array().to_vec()),
                AnimationKey::new(4.0, turned.to_cols_array().to_vec()),
            ]);

        evaluate_animation(&mut tree, &anim, 2.0, BlendSlot::Animated);

        let node = tree.get(id).unwrap();
        let TransformValue::Matrix(p) = node.transform(TransformSlot::Matrix).unwrap().value() else {
            panic!("expected matrix");
        };
        let m = p.get(BlendSlot::Animated);
        let expected = Mat4::from_rotation_translation(Quat::from_rotation_z(FRAC_PI_2 * 0.5), Vec3::new(0.0, 0.0, 4.0));
        assert!(m.abs_diff_eq(expected, EPSILON), "{m} != {expected}");
        assert!((m.x_axis.truncate().length() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_scalar_track_writes_one_component() {
        let (mut tree, id) = single_node(TransformSlot::Scale, Transform::scale(Vec3::ONE));
        let anim = Animation::new("stretch")
            .with_target(id, TransformSlot::Scale)
            .with_component(1)
            .with_keys(vec![
                AnimationKey::new(0.0, vec![1.0]),
                AnimationKey::new(1.0, vec![3.0]),
            ]);

        evaluate_animation(&mut tree, &anim, 0.5, BlendSlot::Animated);

        let t = tree.get(id).unwrap().transform(TransformSlot::Scale).unwrap();
        assert_eq!(t.component(BlendSlot::Animated, 0), Some(1.0));
        assert_eq!(t.component(BlendSlot::Animated, 1), Some(2.0));
        assert_eq!(t.component(BlendSlot::Animated, 2), Some(1.0));
    }

    #[test]
    fn test_children_are_sampled_at_the_same_time() {
        let mut tree = NodeTree::new();
        let root = tree.add_root(
            Node::new("root").with_transform(TransformSlot::Translate, Transform::translate(Vec3::ZERO)),
        );
        let child = tree
            .add_child(
                root,
                Node::new("child").with_transform(TransformSlot::Translate, Transform::translate(Vec3::ZERO)),
            )
            .unwrap();
        let track = |id| {
            Animation::new("x")
                .with_target(id, TransformSlot::Translate)
                .with_component(0)
                .with_keys(vec![
                    AnimationKey::new(0.0, vec![0.0]),
                    AnimationKey::new(10.0, vec![10.0]),
                ])
        };
        let anim = Animation::new("group").with_child(track(root).with_child(track(child)));

        evaluate_animation(&mut tree, &anim, 5.0, BlendSlot::Animated);

        for id in [root, child] {
            let t = tree.get(id).unwrap().transform(TransformSlot::Translate).unwrap();
            assert_eq!(t.component(BlendSlot::Animated, 0), Some(5.0));
        }
    }

    #[test]
    fn test_set_evaluation_honours_requested_slot() {
        let (mut tree, id) = single_node(TransformSlot::Translate, Transform::translate(Vec3::ZERO));
        let set = AnimationSet::new("idle").with_animation(
            Animation::new("move")
                .with_target(id, TransformSlot::Translate)
                .with_keys(vec![AnimationKey::new(0.0, vec![1.0, 1.0, 1.0])]),
        );

        evaluate_animation_set(&mut tree, &set, 0.0, BlendSlot::Base);

        let t = tree.get(id).unwrap().transform(TransformSlot::Translate).unwrap();
        assert_eq!(t.component(BlendSlot::Base, 0), Some(1.0));
        assert_eq!(t.component(BlendSlot::Animated, 0), Some(0.0));
    }

    #[test]
    fn test_missing_target_is_skipped() {
        let (mut tree, id) = single_node(TransformSlot::Translate, Transform::translate(Vec3::ZERO));
        let anim = Animation::new("spin")
            .with_target(id, TransformSlot::Rotate)
            .with_keys(vec![AnimationKey::new(0.0, vec![1.0, 0.0, 0.0, 0.0])]);
        evaluate_animation(&mut tree, &anim, 0.0, BlendSlot::Animated);
        assert!(tree.get(id).unwrap().transform(TransformSlot::Rotate).is_none());
    }
}
