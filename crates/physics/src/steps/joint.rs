//! Distance joint rows: keep two body centers `rest_length` apart.

use super::solver::Row;
use crate::config::SolverConfig;
use crate::types::{BodyId, DistanceJoint, Vec3};

pub(crate) fn joint_row(
    joint: &DistanceJoint,
    position_a: Vec3,
    position_b: Vec3,
    local: impl Fn(BodyId) -> Option<usize>,
    config: &SolverConfig,
    dt: f32,
) -> Row {
    let delta = position_b - position_a;
    let length = delta.length();
    // Coincident centers: pull apart along +Y
    let axis = if length > 1.0e-6 { delta / length } else { Vec3::Y };
    let drift = length - joint.rest_length;

    Row {
        a: local(joint.body_a).map(|k| (k, -axis)),
        b: local(joint.body_b).map(|k| (k, axis)),
        target: -config.baumgarte / dt * drift,
        unilateral: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretched_joint_pulls_back() {
        let joint = DistanceJoint {
            body_a: BodyId(0),
            body_b: BodyId(1),
            rest_length: 1.0,
        };
        let config = SolverConfig::default();
        let row = joint_row(
            &joint,
            Vec3::ZERO,
            Vec3::new(1.5, 0.0, 0.0),
            |body| Some(body.index()),
            &config,
            0.1,
        );
        assert_eq!(row.a, Some((0, -Vec3::X)));
        assert_eq!(row.b, Some((1, Vec3::X)));
        assert!((row.target + 1.0).abs() < 1e-5);
        assert!(!row.unilateral);
    }
}
