//! Named scenes the driver can load. The table is built explicitly in
//! [`DemoRegistry::builtin`]; nothing registers itself.

use physics::{BodyDesc, BodyId, DistanceJoint, PhysicsError, Vec3, World};

pub type DemoBuilder = fn(&mut World) -> Result<(), PhysicsError>;

#[derive(Debug, Clone, Copy)]
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    pub build: DemoBuilder,
}

#[derive(Debug, Default)]
pub struct DemoRegistry {
    demos: Vec<Demo>,
}

impl DemoRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register("sphere_stack", "a column of spheres resting on a slab", sphere_stack);
        registry.register("box_pile", "boxes dropped onto a slab in a loose grid", box_pile);
        registry.register(
            "pendulum_chain",
            "a chain of distance joints swinging from a fixed anchor",
            pendulum_chain,
        );
        registry
    }

    /// Adds a demo. A later registration under the same name replaces the
    /// earlier one.
    pub fn register(&mut self, name: &'static str, description: &'static str, build: DemoBuilder) {
        let demo = Demo {
            name,
            description,
            build,
        };
        match self.demos.iter_mut().find(|d| d.name == name) {
            Some(slot) => *slot = demo,
            None => self.demos.push(demo),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Demo> {
        self.demos.iter().find(|d| d.name == name)
    }

    pub fn demos(&self) -> impl Iterator<Item = &Demo> {
        self.demos.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.demos.iter().map(|d| d.name).collect()
    }
}

fn ground(world: &mut World) -> Result<BodyId, PhysicsError> {
    world.add_body(BodyDesc::cuboid(Vec3::new(25.0, 0.5, 25.0)).fixed())
}

fn sphere_stack(world: &mut World) -> Result<(), PhysicsError> {
    ground(world)?;
    for level in 0..8u8 {
        let y = 1.0 + f32::from(level) * 1.02;
        world.add_body(BodyDesc::sphere(0.5).at(Vec3::new(0.0, y, 0.0)))?;
    }
    Ok(())
}

fn box_pile(world: &mut World) -> Result<(), PhysicsError> {
    ground(world)?;
    for layer in 0..4u8 {
        for row in 0..5u8 {
            for column in 0..5u8 {
                let position = Vec3::new(
                    f32::from(column) * 1.2 - 2.4,
                    2.0 + f32::from(layer) * 1.5,
                    f32::from(row) * 1.2 - 2.4,
                );
                world.add_body(BodyDesc::cuboid(Vec3::splat(0.4)).at(position))?;
            }
        }
    }
    Ok(())
}

fn pendulum_chain(world: &mut World) -> Result<(), PhysicsError> {
    let mut previous = world.add_body(BodyDesc::sphere(0.1).at(Vec3::new(0.0, 12.0, 0.0)).fixed())?;
    for link in 1..=10u8 {
        let bob = world.add_body(
            BodyDesc::sphere(0.2)
                .at(Vec3::new(f32::from(link), 12.0, 0.0))
                .with_mass(1.0),
        )?;
        world.add_joint(DistanceJoint {
            body_a: previous,
            body_b: bob,
            rest_length: 1.0,
        })?;
        previous = bob;
    }
    Ok(())
}
