//! Groups bodies connected by contacts or joints into independent islands.
//!
//! Static bodies take part in constraints but never join two islands: a
//! pile resting on the ground is one island per pile, not one for the whole
//! scene.

use std::collections::HashMap;

use super::contact::contact_row;
use super::joint::joint_row;
use super::lookup;
use super::solver::{IslandBody, Row};
use crate::body::Body;
use crate::config::SolverConfig;
use crate::types::{BodyId, Contact, DistanceJoint, JointId, Vec3};

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Island {
    /// Dynamic bodies, in body list order.
    pub bodies: Vec<BodyId>,
    /// Indices into the step's contact list.
    pub contacts: Vec<usize>,
    /// Indices into the step's joint list.
    pub joints: Vec<usize>,
}

impl Island {
    /// Gathers the island's bodies and builds one row per constraint.
    pub(crate) fn assemble(
        &self,
        bodies: &[Option<Body>],
        contacts: &[Contact],
        joints: &[(JointId, DistanceJoint)],
        config: &SolverConfig,
        dt: f32,
    ) -> (Vec<IslandBody>, Vec<Row>) {
        let members: Vec<IslandBody> = self
            .bodies
            .iter()
            .filter_map(|&id| lookup(bodies, id))
            .map(|body| IslandBody {
                id: body.id(),
                velocity: body.velocity,
                inv_mass: body.inv_mass(),
            })
            .collect();
        let slots: HashMap<BodyId, usize> = members
            .iter()
            .enumerate()
            .map(|(k, member)| (member.id, k))
            .collect();
        let local = |id: BodyId| slots.get(&id).copied();

        let mut rows = Vec::with_capacity(self.contacts.len() + self.joints.len());
        for &i in &self.contacts {
            rows.push(contact_row(&contacts[i], local, config, dt));
        }
        for &i in &self.joints {
            let joint = &joints[i].1;
            let position = |id| lookup(bodies, id).map_or(Vec3::ZERO, |body| body.position);
            rows.push(joint_row(
                joint,
                position(joint.body_a),
                position(joint.body_b),
                local,
                config,
                dt,
            ));
        }
        (members, rows)
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// The smaller root wins so the result does not depend on union order.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

/// Builds the islands that carry at least one constraint. `slot_count`
/// bounds every body index; `is_dynamic` is false for static or missing
/// bodies.
pub(crate) fn build_islands(
    slot_count: usize,
    view: &[BodyId],
    is_dynamic: impl Fn(BodyId) -> bool,
    contacts: &[Contact],
    joints: &[(JointId, DistanceJoint)],
) -> Vec<Island> {
    let mut sets = DisjointSet::new(slot_count);

    // The dynamic end that represents a constraint, after merging both ends.
    let mut link = |a: BodyId, b: BodyId| match (is_dynamic(a), is_dynamic(b)) {
        (true, true) => {
            sets.union(a.index(), b.index());
            Some(a)
        }
        (true, false) => Some(a),
        (false, true) => Some(b),
        (false, false) => None,
    };
    let contact_anchors: Vec<Option<BodyId>> = contacts
        .iter()
        .map(|contact| link(contact.body_a, contact.body_b))
        .collect();
    let joint_anchors: Vec<Option<BodyId>> = joints
        .iter()
        .map(|(_, joint)| link(joint.body_a, joint.body_b))
        .collect();

    let mut island_of: Vec<Option<usize>> = vec![None; slot_count];
    let mut islands: Vec<Island> = Vec::new();
    for &body in view.iter().filter(|&&body| is_dynamic(body)) {
        let root = sets.find(body.index());
        let index = *island_of[root].get_or_insert_with(|| {
            islands.push(Island::default());
            islands.len() - 1
        });
        islands[index].bodies.push(body);
    }

    for (i, anchor) in contact_anchors.into_iter().enumerate() {
        if let Some(index) = anchor.and_then(|body| island_of[sets.find(body.index())]) {
            islands[index].contacts.push(i);
        }
    }
    for (i, anchor) in joint_anchors.into_iter().enumerate() {
        if let Some(index) = anchor.and_then(|body| island_of[sets.find(body.index())]) {
            islands[index].joints.push(i);
        }
    }

    islands.retain(|island| !(island.contacts.is_empty() && island.joints.is_empty()));
    islands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(a: u32, b: u32) -> Contact {
        Contact {
            body_a: BodyId(a),
            body_b: BodyId(b),
            point: Vec3::ZERO,
            normal: Vec3::Y,
            depth: 0.1,
        }
    }

    #[test]
    fn static_ground_does_not_merge_piles() {
        // 0 is the ground; 1-2 and 3-4 are two separate stacks on it
        let view: Vec<BodyId> = (0..6).map(BodyId).collect();
        let contacts = [contact(0, 1), contact(1, 2), contact(0, 3), contact(3, 4)];
        let islands = build_islands(6, &view, |body| body.0 != 0, &contacts, &[]);

        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].bodies, vec![BodyId(1), BodyId(2)]);
        assert_eq!(islands[0].contacts, vec![0, 1]);
        assert_eq!(islands[1].bodies, vec![BodyId(3), BodyId(4)]);
        assert_eq!(islands[1].contacts, vec![2, 3]);
    }

    #[test]
    fn joints_merge_islands() {
        let view: Vec<BodyId> = (0..3).map(BodyId).collect();
        let joints = [
            (
                JointId(0),
                DistanceJoint {
                    body_a: BodyId(0),
                    body_b: BodyId(1),
                    rest_length: 1.0,
                },
            ),
            (
                JointId(1),
                DistanceJoint {
                    body_a: BodyId(1),
                    body_b: BodyId(2),
                    rest_length: 1.0,
                },
            ),
        ];
        let islands = build_islands(3, &view, |_| true, &[], &joints);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].bodies.len(), 3);
        assert_eq!(islands[0].joints, vec![0, 1]);
    }
}
