//! # Collision Detection
//!
//! Broad phase over the [`SceneTree`] followed by a narrow phase that turns
//! candidate pairs into [`Contact`]s.

mod box_box;
mod broad_phase;
mod dispatcher;
mod scene_node;
mod scene_tree;
mod sphere_box;
mod sphere_sphere;

pub use box_box::detect_box_box;
pub use broad_phase::{find_pairs, BodyPair, BroadPhaseProxy};
pub use dispatcher::collide;
pub use scene_node::{NodeId, SceneNode, SceneNodeKind};
pub use scene_tree::{SceneBody, SceneTree};
pub use sphere_box::detect_sphere_box;
pub use sphere_sphere::detect_sphere_sphere;

use crate::types::Vec3;

/// Geometric result of a narrow-phase test, before body ids are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Contact point in world space
    pub point: Vec3,
    /// Unit normal from the first shape towards the second
    pub normal: Vec3,
    /// Overlap along `normal`, always positive
    pub depth: f32,
}

impl Penetration {
    #[must_use]
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}
