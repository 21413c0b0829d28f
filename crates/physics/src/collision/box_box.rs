//! Box-box collision detection

use super::Penetration;
use crate::types::Vec3;

/// Detect overlap between two axis-aligned boxes. The normal is the axis of
/// least overlap, pointing from `a` to `b`; the point is the center of the
/// overlap region.
#[must_use]
pub fn detect_box_box(
    center_a: Vec3,
    half_a: Vec3,
    center_b: Vec3,
    half_b: Vec3,
) -> Option<Penetration> {
    let center_diff = center_b - center_a;
    let overlap = (half_a + half_b) - center_diff.abs();

    if overlap.min_element() <= 0.0 {
        return None;
    }

    let depth = overlap.min_element();
    let normal = if overlap.x == depth {
        Vec3::new(center_diff.x.signum(), 0.0, 0.0)
    } else if overlap.y == depth {
        Vec3::new(0.0, center_diff.y.signum(), 0.0)
    } else {
        Vec3::new(0.0, 0.0, center_diff.z.signum())
    };

    let low = (center_a - half_a).max(center_b - half_b);
    let high = (center_a + half_a).min(center_b + half_b);

    Some(Penetration {
        point: (low + high) * 0.5,
        normal,
        depth,
    })
}
