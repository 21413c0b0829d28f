use physics::{Aabb, BodyId, NodeId, SceneBody, SceneNodeKind, SceneTree, Vec3};

#[derive(Debug)]
struct Probe {
    id: BodyId,
    aabb: Aabb,
    node: Option<NodeId>,
}

impl Probe {
    fn new(index: u32, center: Vec3, half_extents: Vec3) -> Self {
        Self {
            id: BodyId::new(index),
            aabb: Aabb::from_center_half_extents(center, half_extents),
            node: None,
        }
    }
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

fn random_probe(rng: &mut fastrand::Rng, index: u32) -> Probe {
    let center = Vec3::new(
        rng.f32() * 40.0 - 20.0,
        rng.f32() * 40.0 - 20.0,
        rng.f32() * 40.0 - 20.0,
    );
    let half = Vec3::new(
        0.1 + rng.f32() * 2.0,
        0.1 + rng.f32() * 2.0,
        0.1 + rng.f32() * 2.0,
    );
    Probe::new(index, center, half)
}

fn brute_force(probes: &[Probe], query: &Aabb) -> Vec<BodyId> {
    let mut hits: Vec<BodyId> = probes
        .iter()
        .filter(|probe| probe.node.is_some() && probe.aabb.quantized().overlaps(query))
        .map(|probe| probe.id)
        .collect();
    hits.sort();
    hits
}

fn tree_query(tree: &SceneTree, query: &Aabb) -> Vec<BodyId> {
    let mut hits = Vec::new();
    tree.query_aabb(query, |body| hits.push(body));
    hits.sort();
    hits
}

#[test]
fn three_bodies_build_expected_shape() {
    let mut tree = SceneTree::new();
    let mut a = Probe::new(0, Vec3::ZERO, Vec3::splat(0.5));
    let mut b = Probe::new(1, Vec3::new(10.0, 0.0, 0.0), Vec3::splat(0.5));
    let mut c = Probe::new(2, Vec3::new(11.0, 0.0, 0.0), Vec3::splat(0.5));
    tree.insert(a.id, &mut a);
    tree.insert(b.id, &mut b);
    tree.insert(c.id, &mut c);
    tree.sanity_check();

    // c grows b's side less than a's, so b and c share a parent one level down
    let leaf_c = tree.node(c.node.unwrap()).unwrap();
    let leaf_b = tree.node(b.node.unwrap()).unwrap();
    assert_eq!(leaf_c.parent(), leaf_b.parent());
    assert_eq!(leaf_c.depth_level(), 2);
    assert_eq!(tree.node(a.node.unwrap()).unwrap().depth_level(), 1);

    let root = tree.node(tree.root().unwrap()).unwrap();
    assert_eq!(root.min_box(), Vec3::splat(-0.5));
    assert_eq!(root.max_box(), Vec3::new(11.5, 0.5, 0.5));
}

#[test]
fn removing_every_body_empties_the_tree() {
    let mut tree = SceneTree::new();
    let mut probes: Vec<Probe> = (0..8)
        .map(|i| Probe::new(i, Vec3::new(i as f32 * 3.0, 0.0, 0.0), Vec3::ONE))
        .collect();
    for probe in &mut probes {
        tree.insert(probe.id, probe);
    }
    assert_eq!(tree.body_count(), 8);
    assert_eq!(tree.node_count(), 15);

    for probe in probes.iter_mut().rev() {
        assert_eq!(tree.remove(probe), Some(probe.id));
        tree.sanity_check();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.node_count(), 0);
}

#[test]
fn moved_leaf_refits_ancestors() {
    let mut tree = SceneTree::new();
    let mut probes: Vec<Probe> = (0..4)
        .map(|i| Probe::new(i, Vec3::new(i as f32 * 2.0, 0.0, 0.0), Vec3::splat(0.5)))
        .collect();
    for probe in &mut probes {
        tree.insert(probe.id, probe);
    }

    let moved = Aabb::from_center_half_extents(Vec3::new(0.0, 30.0, 0.0), Vec3::splat(0.5));
    assert!(tree.update_body_aabb(probes[0].node.unwrap(), &moved));
    tree.sanity_check();

    let root = tree.node(tree.root().unwrap()).unwrap();
    assert_eq!(root.max_box().y, 30.5);
    assert_eq!(tree_query(&tree, &moved), vec![probes[0].id]);
}

#[test]
fn clear_reports_every_body() {
    let mut tree = SceneTree::new();
    let mut probes: Vec<Probe> = (0..5)
        .map(|i| Probe::new(i, Vec3::new(0.0, i as f32, 0.0), Vec3::splat(0.4)))
        .collect();
    for probe in &mut probes {
        tree.insert(probe.id, probe);
    }
    let mut cleared = tree.clear();
    cleared.sort();
    assert_eq!(cleared, probes.iter().map(|p| p.id).collect::<Vec<_>>());
    assert!(tree.is_empty());
    tree.sanity_check();
}

#[test]
fn random_insert_remove_keeps_invariants() {
    let mut rng = fastrand::Rng::with_seed(42);
    let mut tree = SceneTree::new();
    let mut probes: Vec<Probe> = (0..200).map(|i| random_probe(&mut rng, i)).collect();

    for round in 0..600 {
        let index = rng.usize(..probes.len());
        let probe = &mut probes[index];
        if probe.node.is_some() {
            tree.remove(probe);
        } else {
            tree.insert(probe.id, probe);
        }
        if round % 50 == 0 {
            tree.sanity_check();
        }
    }
    tree.sanity_check();

    // Body <-> leaf links are a bijection
    let live = probes.iter().filter(|p| p.node.is_some()).count();
    assert_eq!(tree.body_count(), live);
    for probe in probes.iter().filter(|p| p.node.is_some()) {
        let leaf = tree.node(probe.node.unwrap()).unwrap();
        assert_eq!(leaf.kind(), &SceneNodeKind::Body(probe.id));
        assert!(leaf.aabb().contains(&probe.aabb));
    }

    for _ in 0..20 {
        let query = random_probe(&mut rng, 0).aabb;
        assert_eq!(tree_query(&tree, &query), brute_force(&probes, &query));
    }
}

#[test]
fn rotations_never_grow_the_tree() {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut tree = SceneTree::new();
    // Sorted insertion along a line produces a lopsided tree
    let mut probes: Vec<Probe> = (0..64)
        .map(|i| Probe::new(i, Vec3::new(i as f32 * 1.5, 0.0, 0.0), Vec3::splat(0.5)))
        .collect();
    for probe in &mut probes {
        tree.insert(probe.id, probe);
    }

    // Scatter the bodies so the insertion-order pairing is poor
    for probe in &mut probes {
        probe.aabb = random_probe(&mut rng, 0).aabb;
        tree.update_body_aabb(probe.node.unwrap(), &probe.aabb);
    }

    let mut area = tree.total_surface_area();
    for _ in 0..10 {
        let rotations = tree.improve_fitness();
        tree.sanity_check();
        let next = tree.total_surface_area();
        assert!(next <= area, "rotations grew the tree: {area} -> {next}");
        if rotations == 0 {
            break;
        }
        area = next;
    }

    for _ in 0..10 {
        let query = random_probe(&mut rng, 0).aabb;
        assert_eq!(tree_query(&tree, &query), brute_force(&probes, &query));
    }
}
