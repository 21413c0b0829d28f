//! Sphere-box collision detection

use super::Penetration;
use crate::types::Vec3;

/// Detect overlap between a sphere and an axis-aligned box. The normal
/// points from the sphere towards the box.
#[must_use]
pub fn detect_sphere_box(
    center: Vec3,
    radius: f32,
    box_center: Vec3,
    half_extents: Vec3,
) -> Option<Penetration> {
    let closest = closest_point_on_box(center, box_center, half_extents);
    let delta = closest - center;
    let distance_squared = delta.dot(delta);

    if distance_squared >= radius * radius {
        return None;
    }

    let distance = distance_squared.sqrt();
    if distance > 0.0001 {
        return Some(Penetration {
            point: closest,
            normal: delta / distance,
            depth: radius - distance,
        });
    }

    // Center inside the box: leave through the nearest face
    let (outward, face_distance) = closest_face(center, box_center, half_extents);
    Some(Penetration {
        point: center,
        normal: -outward,
        depth: radius + face_distance,
    })
}

fn closest_point_on_box(point: Vec3, box_center: Vec3, half_extents: Vec3) -> Vec3 {
    point.clamp(box_center - half_extents, box_center + half_extents)
}

/// Outward normal of the face nearest to an interior point, and the
/// distance to it.
fn closest_face(point: Vec3, box_center: Vec3, half_extents: Vec3) -> (Vec3, f32) {
    let local = point - box_center;
    let distances = half_extents - local.abs();

    if distances.x < distances.y && distances.x < distances.z {
        (Vec3::new(local.x.signum(), 0.0, 0.0), distances.x)
    } else if distances.y < distances.z {
        (Vec3::new(0.0, local.y.signum(), 0.0), distances.y)
    } else {
        (Vec3::new(0.0, 0.0, local.z.signum()), distances.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_resting_on_box_top() {
        let hit = detect_sphere_box(
            Vec3::new(0.0, 1.4, 0.0),
            0.5,
            Vec3::ZERO,
            Vec3::splat(1.0),
        )
        .unwrap();
        assert_eq!(hit.normal, -Vec3::Y);
        assert!((hit.depth - 0.1).abs() < 1e-5);
        assert_eq!(hit.point, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn center_inside_box_uses_nearest_face() {
        let hit = detect_sphere_box(
            Vec3::new(0.0, 0.0, 0.8),
            0.25,
            Vec3::ZERO,
            Vec3::splat(1.0),
        )
        .unwrap();
        assert_eq!(hit.normal, -Vec3::Z);
        assert!((hit.depth - 0.45).abs() < 1e-5);
    }

    #[test]
    fn separated_sphere_and_box() {
        assert!(detect_sphere_box(Vec3::new(3.0, 0.0, 0.0), 0.5, Vec3::ZERO, Vec3::ONE).is_none());
    }
}
