//! Broad-phase pair generation over the scene tree.
//!
//! Every proxy queries the tree with its own leaf box. Queries run in
//! parallel on the thread pool; each thread buffers its pairs locally and
//! merges them into a shared list under a [`SpinLock`]. The merged list is
//! sorted so the result does not depend on the thread count.

use compute::{SpinLock, ThreadPool};

use super::SceneTree;
use crate::types::{Aabb, BodyId};

/// Candidate pair, lower id first.
pub type BodyPair = (BodyId, BodyId);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadPhaseProxy {
    pub body: BodyId,
    /// The body's quantized leaf box.
    pub aabb: Aabb,
    pub dynamic: bool,
}

/// Collects every pair of overlapping leaves where at least one body is
/// dynamic. `is_dynamic` answers for the bodies found by the queries.
pub fn find_pairs<F>(
    pool: &ThreadPool,
    tree: &SceneTree,
    proxies: &[BroadPhaseProxy],
    is_dynamic: F,
) -> Vec<BodyPair>
where
    F: Fn(BodyId) -> bool + Sync,
{
    let pairs = SpinLock::new(Vec::new());

    pool.parallel_execute(&|thread_index, thread_count| {
        let mut local = Vec::new();
        for proxy in proxies.iter().skip(thread_index).step_by(thread_count) {
            tree.query_aabb(&proxy.aabb, |other| {
                if proxy.body < other && (proxy.dynamic || is_dynamic(other)) {
                    local.push((proxy.body, other));
                }
            });
        }
        if !local.is_empty() {
            pairs.lock().append(&mut local);
        }
    });

    let mut pairs = pairs.into_inner();
    pairs.sort_unstable();
    pairs.dedup();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{NodeId, SceneBody};
    use crate::types::Vec3;

    struct Probe {
        aabb: Aabb,
        node: Option<NodeId>,
    }

    impl SceneBody for Probe {
        fn scene_aabb(&self) -> Aabb {
            self.aabb
        }

        fn scene_node(&self) -> Option<NodeId> {
            self.node
        }

        fn set_scene_node(&mut self, node: Option<NodeId>) {
            self.node = node;
        }
    }

    #[test]
    fn static_pairs_are_skipped() {
        let centers = [0.0, 0.75, 5.0, 5.5];
        let dynamic = [false, true, false, false];
        let mut tree = SceneTree::new();
        let mut proxies = Vec::new();
        for (i, x) in centers.iter().enumerate() {
            let mut probe = Probe {
                aabb: Aabb::from_center_half_extents(Vec3::new(*x, 0.0, 0.0), Vec3::splat(0.5)),
                node: None,
            };
            let node = tree.insert(BodyId(i as u32), &mut probe);
            proxies.push(BroadPhaseProxy {
                body: BodyId(i as u32),
                aabb: tree.node(node).unwrap().aabb(),
                dynamic: dynamic[i],
            });
        }

        let pool = ThreadPool::new("broad");
        let pairs = find_pairs(&pool, &tree, &proxies, |body| dynamic[body.index()]);
        assert_eq!(pairs, vec![(BodyId(0), BodyId(1))]);
    }
}
