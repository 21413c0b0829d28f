//! Sphere-sphere collision detection

use super::Penetration;
use crate::types::Vec3;

/// Detect overlap between two spheres. The normal points from `a` to `b`.
#[must_use]
pub fn detect_sphere_sphere(
    center_a: Vec3,
    radius_a: f32,
    center_b: Vec3,
    radius_b: f32,
) -> Option<Penetration> {
    let delta = center_b - center_a;
    let distance_squared = delta.dot(delta);
    let min_distance = radius_a + radius_b;

    if distance_squared >= min_distance * min_distance {
        return None;
    }

    let distance = distance_squared.sqrt();
    // Coincident centers: separate along +Y
    let normal = if distance > 0.0001 {
        delta / distance
    } else {
        Vec3::Y
    };

    Some(Penetration {
        point: center_a + normal * (radius_a - 0.5 * (min_distance - distance)),
        normal,
        depth: min_distance - distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_spheres() {
        let hit = detect_sphere_sphere(Vec3::ZERO, 1.0, Vec3::new(1.5, 0.0, 0.0), 1.0).unwrap();
        assert_eq!(hit.normal, Vec3::X);
        assert!((hit.depth - 0.5).abs() < 1e-6);
        assert!((hit.point.x - 0.75).abs() < 1e-6);
    }

    #[test]
    fn touching_spheres_do_not_collide() {
        assert!(detect_sphere_sphere(Vec3::ZERO, 1.0, Vec3::new(2.0, 0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn coincident_centers_push_up() {
        let hit = detect_sphere_sphere(Vec3::ONE, 0.5, Vec3::ONE, 0.5).unwrap();
        assert_eq!(hit.normal, Vec3::Y);
        assert!((hit.depth - 1.0).abs() < 1e-6);
    }
}
