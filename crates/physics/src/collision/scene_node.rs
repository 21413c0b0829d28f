//! Nodes of the broad-phase bounding volume hierarchy.

use crate::body_list::ListNodeId;
use crate::types::{Aabb, BodyId, Vec3};

/// Arena handle of a [`SceneNode`] inside a [`super::SceneTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneNodeKind {
    /// Leaf wrapping exactly one body.
    Body(BodyId),
    /// Internal node owning two subtrees. `fitness` is the node's entry in
    /// the tree's rebalancing list.
    Tree {
        left: NodeId,
        right: NodeId,
        fitness: Option<ListNodeId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNode {
    pub(crate) aabb: Aabb,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth_level: u32,
    pub(crate) kind: SceneNodeKind,
}

impl SceneNode {
    pub(crate) fn body(body: BodyId, aabb: Aabb) -> Self {
        Self {
            aabb,
            parent: None,
            depth_level: 0,
            kind: SceneNodeKind::Body(body),
        }
    }

    #[must_use]
    pub fn min_box(&self) -> Vec3 {
        self.aabb.min
    }

    #[must_use]
    pub fn max_box(&self) -> Vec3 {
        self.aabb.max
    }

    #[must_use]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordering level: 0 at the root and strictly greater than the parent's
    /// level. Equals the distance from the root when a node is inserted;
    /// removals only renumber the promoted node, so deeper levels may then
    /// overstate it.
    #[must_use]
    pub fn depth_level(&self) -> u32 {
        self.depth_level
    }

    #[must_use]
    pub fn kind(&self) -> &SceneNodeKind {
        &self.kind
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Body(_))
    }

    /// The body of a leaf node.
    #[must_use]
    pub fn body_id(&self) -> Option<BodyId> {
        match self.kind {
            SceneNodeKind::Body(body) => Some(body),
            SceneNodeKind::Tree { .. } => None,
        }
    }

    /// `(left, right)` of an internal node.
    #[must_use]
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match self.kind {
            SceneNodeKind::Tree { left, right, .. } => Some((left, right)),
            SceneNodeKind::Body(_) => None,
        }
    }
}
