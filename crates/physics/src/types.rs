//! Core value types shared by the scene tree, the narrow phase and the
//! solver.

pub use glam::Vec3;

use crate::error::PhysicsError;

/// Scene boxes are snapped outward to a grid of `1 / AABB_QUANTIZATION`.
pub const AABB_QUANTIZATION: f32 = 4.0;
const AABB_INV_QUANTIZATION: f32 = 1.0 / AABB_QUANTIZATION;

/// Stable handle of a body inside a [`crate::World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub(crate) u32);

impl BodyId {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub(crate) u32);

impl JointId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// `true` when `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn surface_area(&self) -> f32 {
        let size = self.max - self.min;
        2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
    }

    /// Snaps the box outward to the quantization grid. The result always
    /// contains `self`.
    #[must_use]
    pub fn quantized(&self) -> Self {
        Self {
            min: (self.min * AABB_QUANTIZATION).floor() * AABB_INV_QUANTIZATION,
            max: (self.max * AABB_QUANTIZATION).ceil() * AABB_INV_QUANTIZATION,
        }
    }
}

/// Collision shape of a body. Boxes are axis aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl Shape {
    #[must_use]
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    #[must_use]
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::Box { half_extents }
    }

    /// World-space bounding box of the shape centered at `position`.
    #[must_use]
    pub fn aabb(&self, position: Vec3) -> Aabb {
        match *self {
            Self::Sphere { radius } => Aabb::from_center_half_extents(position, Vec3::splat(radius)),
            Self::Box { half_extents } => Aabb::from_center_half_extents(position, half_extents),
        }
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        match *self {
            Self::Sphere { radius } => 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3),
            Self::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
        }
    }

    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidShape`] for non-positive or non-finite
    /// dimensions.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        match *self {
            Self::Sphere { radius } if !(radius.is_finite() && radius > 0.0) => {
                Err(PhysicsError::InvalidShape("sphere radius must be positive and finite"))
            }
            Self::Box { half_extents }
                if !(half_extents.is_finite() && half_extents.min_element() > 0.0) =>
            {
                Err(PhysicsError::InvalidShape("box half extents must be positive and finite"))
            }
            _ => Ok(()),
        }
    }
}

/// Keeps the centers of two bodies `rest_length` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceJoint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub rest_length: f32,
}

/// A penetrating pair produced by the narrow phase. `normal` points from
/// `body_a` towards `body_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub point: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}
