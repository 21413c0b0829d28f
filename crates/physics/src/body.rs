//! # Rigid Bodies
//!
//! A [`Body`] is a point mass carrying a collision [`Shape`]. Bodies are
//! described with a [`BodyDesc`] and handed to [`crate::World::add_body`],
//! which assigns the id and links the body into the scene tree and the body
//! list.

use std::fmt;
use std::sync::Arc;

use crate::body_list::ListNodeId;
use crate::collision::{NodeId, SceneBody};
use crate::error::PhysicsError;
use crate::types::{Aabb, BodyId, Shape, Vec3};

/// Per-body callbacks invoked by the world during a step. Both may run on
/// any worker thread; `thread_index` identifies it.
pub trait BodyNotify: Send + Sync {
    /// Extra force applied for this step, on top of gravity.
    fn on_apply_external_force(&self, _thread_index: usize, _timestep: f32) -> Vec3 {
        Vec3::ZERO
    }

    /// Called after the body's position has been integrated.
    fn on_transform(&self, _thread_index: usize, _position: Vec3) {}
}

pub struct Body {
    id: BodyId,
    pub position: Vec3,
    pub velocity: Vec3,
    inv_mass: f32,
    shape: Shape,
    aabb: Aabb,
    scene_node: Option<NodeId>,
    list_node: Option<ListNodeId>,
    notify: Option<Arc<dyn BodyNotify>>,
}

impl Body {
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Zero for static bodies.
    #[must_use]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    #[must_use]
    pub fn mass(&self) -> Option<f32> {
        (self.inv_mass > 0.0).then(|| 1.0 / self.inv_mass)
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass > 0.0
    }

    /// World box as of the last refresh. The scene tree holds a quantized
    /// copy.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    #[must_use]
    pub fn min_aabb(&self) -> Vec3 {
        self.aabb.min
    }

    #[must_use]
    pub fn max_aabb(&self) -> Vec3 {
        self.aabb.max
    }

    #[must_use]
    pub fn scene_node(&self) -> Option<NodeId> {
        self.scene_node
    }

    #[must_use]
    pub fn notify(&self) -> Option<&Arc<dyn BodyNotify>> {
        self.notify.as_ref()
    }

    pub fn set_notify(&mut self, notify: Option<Arc<dyn BodyNotify>>) {
        self.notify = notify;
    }

    pub(crate) fn list_node(&self) -> Option<ListNodeId> {
        self.list_node
    }

    pub(crate) fn set_list_node(&mut self, node: Option<ListNodeId>) {
        self.list_node = node;
    }

    /// Recomputes the world box from the shape and current position.
    pub(crate) fn refresh_aabb(&mut self) -> Aabb {
        self.aabb = self.shape.aabb(self.position);
        self.aabb
    }
}

impl SceneBody for Body {
    fn scene_aabb(&self) -> Aabb {
        self.aabb
    }

    fn scene_node(&self) -> Option<NodeId> {
        self.scene_node
    }

    fn set_scene_node(&mut self, node: Option<NodeId>) {
        self.scene_node = node;
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("inv_mass", &self.inv_mass)
            .field("shape", &self.shape)
            .field("scene_node", &self.scene_node)
            .field("notify", &self.notify.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MassSpec {
    Density(f32),
    Mass(f32),
    Static,
}

/// Builder for a [`Body`]. Mass defaults to unit density times the shape's
/// volume.
#[derive(Clone)]
pub struct BodyDesc {
    shape: Shape,
    position: Vec3,
    velocity: Vec3,
    mass: MassSpec,
    notify: Option<Arc<dyn BodyNotify>>,
}

impl BodyDesc {
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            mass: MassSpec::Density(1.0),
            notify: None,
        }
    }

    #[must_use]
    pub fn sphere(radius: f32) -> Self {
        Self::new(Shape::sphere(radius))
    }

    #[must_use]
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(Shape::cuboid(half_extents))
    }

    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    #[must_use]
    pub fn with_density(mut self, density: f32) -> Self {
        self.mass = MassSpec::Density(density);
        self
    }

    #[must_use]
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = MassSpec::Mass(mass);
        self
    }

    /// Infinite mass: the body never moves and never merges islands.
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.mass = MassSpec::Static;
        self
    }

    #[must_use]
    pub fn with_notify(mut self, notify: Arc<dyn BodyNotify>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidShape`] for bad shape dimensions, a
    /// non-finite position or velocity, or a non-positive mass or density.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        self.shape.validate()?;
        if !(self.position.is_finite() && self.velocity.is_finite()) {
            return Err(PhysicsError::InvalidShape("body state must be finite"));
        }
        match self.mass {
            MassSpec::Density(value) | MassSpec::Mass(value)
                if !(value.is_finite() && value > 0.0) =>
            {
                Err(PhysicsError::InvalidShape("mass and density must be positive and finite"))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn build(self, id: BodyId) -> Body {
        let inv_mass = match self.mass {
            MassSpec::Density(density) => 1.0 / (density * self.shape.volume()),
            MassSpec::Mass(mass) => 1.0 / mass,
            MassSpec::Static => 0.0,
        };
        Body {
            id,
            position: self.position,
            velocity: if inv_mass > 0.0 { self.velocity } else { Vec3::ZERO },
            inv_mass,
            aabb: self.shape.aabb(self.position),
            shape: self.shape,
            scene_node: None,
            list_node: None,
            notify: self.notify,
        }
    }
}

impl fmt::Debug for BodyDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyDesc")
            .field("shape", &self.shape)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("mass", &self.mass)
            .field("notify", &self.notify.is_some())
            .finish()
    }
}
