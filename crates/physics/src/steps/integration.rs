//! Force application and position integration (semi-implicit Euler).

use compute::ThreadPool;

use super::{lookup, parallel_map};
use crate::body::Body;
use crate::types::{BodyId, Vec3};

/// Velocity change from gravity and each body's notify force over `dt`.
/// Static bodies get zero.
pub(crate) fn external_velocity(
    pool: &ThreadPool,
    bodies: &[Option<Body>],
    view: &[BodyId],
    gravity: Vec3,
    dt: f32,
) -> Vec<Vec3> {
    parallel_map(pool, view.len(), |thread_index, i| {
        let Some(body) = lookup(bodies, view[i]).filter(|body| body.is_dynamic()) else {
            return Vec3::ZERO;
        };
        let force = body
            .notify()
            .map_or(Vec3::ZERO, |notify| notify.on_apply_external_force(thread_index, dt));
        (gravity + force * body.inv_mass()) * dt
    })
}

/// Positions after advancing every dynamic body by its velocity. Calls each
/// body's `on_transform` with the new position.
pub(crate) fn integrate_positions(
    pool: &ThreadPool,
    bodies: &[Option<Body>],
    view: &[BodyId],
    dt: f32,
) -> Vec<Vec3> {
    parallel_map(pool, view.len(), |thread_index, i| {
        let Some(body) = lookup(bodies, view[i]) else {
            return Vec3::ZERO;
        };
        if !body.is_dynamic() {
            return body.position;
        }
        let position = body.position + body.velocity * dt;
        if let Some(notify) = body.notify() {
            notify.on_transform(thread_index, position);
        }
        position
    })
}
