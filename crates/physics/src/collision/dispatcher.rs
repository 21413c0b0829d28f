//! Routes a body pair to the detector for its shape combination.

use super::{detect_box_box, detect_sphere_box, detect_sphere_sphere, Penetration};
use crate::types::{BodyId, Contact, Shape, Vec3};

/// Narrow-phase test between two placed shapes. The contact normal points
/// from `a` to `b`.
#[must_use]
pub fn collide(
    (body_a, pos_a, shape_a): (BodyId, Vec3, &Shape),
    (body_b, pos_b, shape_b): (BodyId, Vec3, &Shape),
) -> Option<Contact> {
    let penetration = match (*shape_a, *shape_b) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            detect_sphere_sphere(pos_a, ra, pos_b, rb)
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            detect_sphere_box(pos_a, radius, pos_b, half_extents)
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => {
            detect_sphere_box(pos_b, radius, pos_a, half_extents).map(Penetration::flipped)
        }
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            detect_box_box(pos_a, ha, pos_b, hb)
        }
    }?;

    Some(Contact {
        body_a,
        body_b,
        point: penetration.point,
        normal: penetration.normal,
        depth: penetration.depth,
    })
}
