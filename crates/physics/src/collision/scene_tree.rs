//! # Scene Tree
//!
//! A dynamic bounding volume hierarchy over body AABBs. Leaves wrap exactly
//! one body; internal nodes own two subtrees and a box enclosing both.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node's
//! `parent` is the back-reference; freeing an internal node together with
//! its subtree is the destruction cascade. Boxes are quantized outward so
//! small floating-point jitter does not propagate refits up the tree.
//!
//! Every internal node also has an entry in the fitness list, which
//! [`SceneTree::improve_fitness`] walks to apply local rotations.

use tracing::debug;

use super::scene_node::{NodeId, SceneNode, SceneNodeKind};
use crate::body_list::ListView;
use crate::types::{Aabb, BodyId};

/// What the tree needs from a body: its current box and the
/// body-to-leaf back-reference.
pub trait SceneBody {
    fn scene_aabb(&self) -> Aabb;
    fn scene_node(&self) -> Option<NodeId>;
    fn set_scene_node(&mut self, node: Option<NodeId>);
}

#[derive(Debug, Default)]
pub struct SceneTree {
    nodes: Vec<Option<SceneNode>>,
    free: Vec<u32>,
    root: Option<NodeId>,
    fitness: ListView<NodeId>,
    body_count: usize,
}

impl SceneTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn body_count(&self) -> usize {
        self.body_count
    }

    /// Leaves plus internal nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Wraps `body` in a leaf and links it into the tree. The leaf goes next
    /// to the existing node whose box grows least along the descent; ties
    /// go left.
    pub fn insert<B: SceneBody>(&mut self, body_id: BodyId, body: &mut B) -> NodeId {
        debug_assert!(
            body.scene_node().is_none(),
            "body {body_id:?} is already in the scene tree"
        );

        let aabb = body.scene_aabb().quantized();
        let leaf = self.alloc(SceneNode::body(body_id, aabb));
        body.set_scene_node(Some(leaf));
        self.body_count += 1;

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return leaf;
        };

        let mut sibling = root;
        while let Some((left, right)) = self.at(sibling).children() {
            let left_cost = self.growth(left, &aabb);
            let right_cost = self.growth(right, &aabb);
            sibling = if left_cost <= right_cost { left } else { right };
        }

        let (parent, depth, sibling_aabb) = {
            let node = self.at(sibling);
            (node.parent, node.depth_level, node.aabb)
        };
        let tree = self.alloc(SceneNode {
            aabb: sibling_aabb.union(&aabb),
            parent,
            depth_level: depth,
            kind: SceneNodeKind::Tree {
                left: sibling,
                right: leaf,
                fitness: None,
            },
        });
        let entry = self.fitness.add_item(tree);
        if let SceneNodeKind::Tree { fitness, .. } = &mut self.at_mut(tree).kind {
            *fitness = Some(entry);
        }

        match parent {
            Some(parent) => self.replace_child(parent, sibling, tree),
            None => self.root = Some(tree),
        }
        self.at_mut(sibling).parent = Some(tree);
        self.at_mut(leaf).parent = Some(tree);
        self.at_mut(leaf).depth_level = depth + 1;
        self.at_mut(sibling).depth_level = depth + 1;
        self.refit_from(parent);
        leaf
    }

    /// Unlinks the leaf of `body` and collapses its parent: the sibling
    /// takes the parent's slot. Returns the removed body, or `None` when the
    /// body was not in the tree.
    pub fn remove<B: SceneBody>(&mut self, body: &mut B) -> Option<BodyId> {
        let leaf = body.scene_node()?;
        let (body_id, parent) = {
            let node = self.at(leaf);
            (node.body_id(), node.parent)
        };
        debug_assert!(body_id.is_some(), "scene node {leaf:?} is not a leaf");

        self.release(leaf);
        body.set_scene_node(None);
        self.body_count -= 1;

        let Some(parent) = parent else {
            self.root = None;
            return body_id;
        };

        let Some(SceneNode {
            kind: SceneNodeKind::Tree { left, right, fitness },
            parent: grandparent,
            depth_level: depth,
            ..
        }) = self.release(parent)
        else {
            unreachable!("parent of a scene leaf is always an internal node");
        };
        if let Some(entry) = fitness {
            self.fitness.remove_item(entry);
        }
        let sibling = if left == leaf { right } else { left };

        self.at_mut(sibling).parent = grandparent;
        match grandparent {
            Some(grandparent) => self.replace_child(grandparent, parent, sibling),
            None => self.root = Some(sibling),
        }
        // Levels below the promoted node stay strictly increasing.
        self.at_mut(sibling).depth_level = depth;
        self.refit_from(grandparent);
        body_id
    }

    /// Moves the leaf `node` to the quantized `aabb`. Returns `false` when
    /// quantization maps the new box onto the current one.
    pub fn update_body_aabb(&mut self, node: NodeId, aabb: &Aabb) -> bool {
        let quantized = aabb.quantized();
        let leaf = self.at_mut(node);
        debug_assert!(leaf.is_leaf(), "updating the box of internal node {node:?}");
        if leaf.aabb == quantized {
            return false;
        }
        leaf.aabb = quantized;
        let parent = leaf.parent;
        self.refit_from(parent);
        true
    }

    /// Walks the fitness list and, at each internal node, swaps one child
    /// with a grandchild when that strictly shrinks the summed internal
    /// surface area. Returns the number of rotations applied.
    pub fn improve_fitness(&mut self) -> usize {
        self.fitness.update_view();
        let candidates = self.fitness.view().to_vec();
        let mut rotations = 0;
        for node in candidates {
            if self.rotate(node) {
                rotations += 1;
            }
        }
        if rotations > 0 {
            debug!(rotations, area = self.total_surface_area(), "scene tree rebalanced");
        }
        rotations
    }

    /// Calls `callback` for every body whose box overlaps `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(BodyId)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.at(id);
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                SceneNodeKind::Body(body) => callback(body),
                SceneNodeKind::Tree { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Sum of internal node surface areas. Lower is a tighter tree.
    #[must_use]
    pub fn total_surface_area(&self) -> f32 {
        self.nodes
            .iter()
            .flatten()
            .filter(|node| !node.is_leaf())
            .map(|node| node.aabb.surface_area())
            .sum()
    }

    /// Bodies in depth-first order.
    #[must_use]
    pub fn bodies(&self) -> Vec<BodyId> {
        let mut bodies = Vec::with_capacity(self.body_count);
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            match self.at(id).kind {
                SceneNodeKind::Body(body) => bodies.push(body),
                SceneNodeKind::Tree { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        bodies
    }

    /// Destroys every node. Returns the bodies that were in the tree so the
    /// caller can clear their back-references.
    pub fn clear(&mut self) -> Vec<BodyId> {
        let bodies = self.bodies();
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.fitness.clear();
        self.body_count = 0;
        bodies
    }

    /// Checks the structural invariants: parent/child links agree, parents
    /// contain their children, depth strictly grows away from a root at
    /// level 0, and every leaf and internal node is accounted for.
    ///
    /// # Panics
    ///
    /// Panics on the first violated invariant.
    pub fn sanity_check(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.body_count, 0, "empty tree with live bodies");
            assert_eq!(self.node_count(), 0, "empty tree with live nodes");
            return;
        };
        assert!(self.at(root).parent.is_none(), "root has a parent");
        assert_eq!(self.at(root).depth_level, 0, "root is not at level 0");

        let mut leaves = 0;
        let mut internal = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.at(id);
            if let Some(parent) = node.parent {
                let parent = self.at(parent);
                assert!(
                    parent.depth_level < node.depth_level,
                    "node {id:?} is not deeper than its parent"
                );
                assert!(
                    parent.aabb.contains(&node.aabb),
                    "node {id:?} escapes its parent box"
                );
            }
            match node.kind {
                SceneNodeKind::Body(_) => leaves += 1,
                SceneNodeKind::Tree { left, right, fitness } => {
                    internal += 1;
                    assert_eq!(self.at(left).parent, Some(id), "left child link of {id:?}");
                    assert_eq!(self.at(right).parent, Some(id), "right child link of {id:?}");
                    assert_eq!(
                        node.aabb,
                        self.at(left).aabb.union(&self.at(right).aabb),
                        "node {id:?} is not the union of its children"
                    );
                    let entry = fitness.and_then(|entry| self.fitness.get(entry));
                    assert_eq!(entry, Some(id), "node {id:?} missing from the fitness list");
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        assert_eq!(leaves, self.body_count, "leaf count mismatch");
        assert_eq!(internal + 1, leaves, "a binary tree has one fewer internal node than leaves");
        assert_eq!(self.fitness.len(), internal, "fitness list size mismatch");
        assert_eq!(leaves + internal, self.node_count(), "unreachable nodes in the arena");
    }

    fn alloc(&mut self, node: SceneNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = Some(node);
            NodeId(index)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let index = self.nodes.len() as u32;
            self.nodes.push(Some(node));
            NodeId(index)
        }
    }

    fn release(&mut self, id: NodeId) -> Option<SceneNode> {
        let node = self.nodes.get_mut(id.index())?.take();
        if node.is_some() {
            self.free.push(id.0);
        }
        node
    }

    fn at(&self, id: NodeId) -> &SceneNode {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("dangling scene node {id:?}"),
        }
    }

    fn at_mut(&mut self, id: NodeId) -> &mut SceneNode {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("dangling scene node {id:?}"),
        }
    }

    fn growth(&self, id: NodeId, aabb: &Aabb) -> f32 {
        let current = self.at(id).aabb;
        current.union(aabb).surface_area() - current.surface_area()
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if let SceneNodeKind::Tree { left, right, .. } = &mut self.at_mut(parent).kind {
            if *left == old {
                *left = new;
            } else {
                debug_assert_eq!(*right, old, "{old:?} is not a child of {parent:?}");
                *right = new;
            }
        }
    }

    /// Recomputes boxes from `node` up to the root, stopping at the first
    /// ancestor whose box does not change.
    fn refit_from(&mut self, mut node: Option<NodeId>) {
        while let Some(id) = node {
            let Some((left, right)) = self.at(id).children() else {
                break;
            };
            let aabb = self.at(left).aabb.union(&self.at(right).aabb);
            let current = self.at_mut(id);
            if current.aabb == aabb {
                break;
            }
            current.aabb = aabb;
            node = current.parent;
        }
    }

    /// Assigns `depth` to `node` and consecutive levels below it.
    fn renumber_depth(&mut self, node: NodeId, depth: u32) {
        let mut stack = vec![(node, depth)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.at_mut(id);
            node.depth_level = depth;
            if let Some((left, right)) = node.children() {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
    }

    fn rotate(&mut self, node: NodeId) -> bool {
        let Some((left, right)) = self.node(node).and_then(SceneNode::children) else {
            return false;
        };

        // (gain, child of `node`, its sibling, grandchild to swap with)
        let mut best: Option<(f32, NodeId, NodeId, NodeId)> = None;
        for (outer, inner) in [(left, right), (right, left)] {
            let Some((first, second)) = self.at(inner).children() else {
                continue;
            };
            let before = self.at(inner).aabb.surface_area();
            for (grandchild, kept) in [(first, second), (second, first)] {
                let after = self.at(outer).aabb.union(&self.at(kept).aabb).surface_area();
                let gain = before - after;
                if gain > best.map_or(0.0, |(best_gain, ..)| best_gain) {
                    best = Some((gain, outer, inner, grandchild));
                }
            }
        }
        let Some((_, outer, inner, grandchild)) = best else {
            return false;
        };

        self.replace_child(node, outer, grandchild);
        self.replace_child(inner, grandchild, outer);
        self.at_mut(grandchild).parent = Some(node);
        self.at_mut(outer).parent = Some(inner);

        let depth = self.at(node).depth_level;
        self.renumber_depth(grandchild, depth + 1);
        self.renumber_depth(outer, depth + 2);

        if let Some((a, b)) = self.at(inner).children() {
            let aabb = self.at(a).aabb.union(&self.at(b).aabb);
            self.at_mut(inner).aabb = aabb;
        }
        true
    }
}
