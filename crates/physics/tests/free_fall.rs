use physics::{BodyDesc, Vec3, World, WorldConfig};

#[test]
fn sphere_free_fall_matches_analytic() {
    // initial height 10 m, no initial velocity
    let config = WorldConfig {
        timestep: 0.01,
        substeps: 1,
        ..WorldConfig::default()
    };
    let mut world = World::new(config).unwrap();
    let ball = world
        .add_body(BodyDesc::sphere(1.0).at(Vec3::new(0.0, 10.0, 0.0)))
        .unwrap();
    let steps = 100_usize; // 1 s, the sphere stays in the air
    world.run(steps).unwrap();

    // semi-implicit Euler lands h0 - ½ g t² - ½ g t dt
    let dt = 0.01_f32;
    let t = dt * steps as f32;
    let expected = 10.0 - 0.5 * 9.81 * t * t - 0.5 * 9.81 * t * dt;
    let diff = (world.body(ball).unwrap().position.y - expected).abs();
    assert!(diff < 1e-3, "diff={diff}");
}

#[test]
fn transform_buffer_tracks_positions() {
    let mut world = World::new(WorldConfig::default()).unwrap();
    let a = world.add_body(BodyDesc::sphere(0.5).at(Vec3::new(-5.0, 4.0, 0.0))).unwrap();
    let b = world.add_body(BodyDesc::sphere(0.5).at(Vec3::new(5.0, 4.0, 0.0))).unwrap();
    world.step().unwrap();

    let transforms = world.transforms();
    assert_eq!(transforms.len(), 2);
    assert_eq!(transforms[0].body as usize, a.index());
    assert_eq!(transforms[1].body as usize, b.index());
    assert_eq!(transforms[1].position, world.body(b).unwrap().position.to_array());
    assert_eq!(world.transform_bytes().len(), 2 * 16);
}
