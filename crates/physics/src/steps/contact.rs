//! Contact rows: non-penetration along the contact normal.

use super::solver::Row;
use crate::config::SolverConfig;
use crate::types::{BodyId, Contact};

/// Builds the row for `contact`. `local` maps a dynamic body to its island
/// index and returns `None` for static bodies.
pub(crate) fn contact_row(
    contact: &Contact,
    local: impl Fn(BodyId) -> Option<usize>,
    config: &SolverConfig,
    dt: f32,
) -> Row {
    let penetration = (contact.depth - config.penetration_slop).max(0.0);
    Row {
        a: local(contact.body_a).map(|k| (k, -contact.normal)),
        b: local(contact.body_b).map(|k| (k, contact.normal)),
        target: config.baumgarte / dt * penetration,
        unilateral: true,
    }
}
