//! # World
//!
//! Owns the bodies, joints, scene tree and worker pool, and advances the
//! simulation. One [`World::step`] runs `substeps` sub-steps inside a single
//! pool bracket. Each sub-step:
//!
//! 1.  applies gravity and notify forces (parallel over the body view),
//! 2.  refreshes dynamic body boxes in the scene tree,
//! 3.  rebalances the tree every `fitness_interval` sub-steps,
//! 4.  collects candidate pairs from the tree (parallel queries),
//! 5.  runs the narrow phase on every pair (parallel),
//! 6.  splits bodies into islands,
//! 7.  solves each island (parallel, one result slot per island),
//! 8.  applies the impulses and integrates positions (parallel).
//!
//! Bodies, joints and the tree are only mutated by the owner between
//! parallel stages, so every stage reads a consistent snapshot and the
//! result does not depend on the thread count.

use std::time::Duration;

use compute::{flush_to_zero, ComputeError, ThreadPool};
use tracing::{debug, trace};

use crate::body::{Body, BodyDesc};
use crate::body_list::BodyList;
use crate::collision::{collide, find_pairs, BroadPhaseProxy, SceneTree};
use crate::config::WorldConfig;
use crate::error::PhysicsError;
use crate::steps::integration::{external_velocity, integrate_positions};
use crate::steps::islands::build_islands;
use crate::steps::solver::{solve_island, IslandSolution};
use crate::steps::{lookup, parallel_map};
use crate::transform::{BodyTransform, TransformBuffer};
use crate::types::{BodyId, Contact, DistanceJoint, JointId, Vec3};

/// Counters from the most recent step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    /// Steps taken since the world was created.
    pub steps: u64,
    pub bodies: usize,
    pub joints: usize,
    pub pairs: usize,
    pub contacts: usize,
    pub islands: usize,
    pub solver_iterations: usize,
    pub rotations: usize,
}

pub struct World {
    pool: ThreadPool,
    state: WorldState,
}

struct WorldState {
    config: WorldConfig,
    bodies: Vec<Option<Body>>,
    body_list: BodyList,
    scene: SceneTree,
    joints: Vec<Option<DistanceJoint>>,
    contacts: Vec<Contact>,
    transforms: TransformBuffer,
    stats: WorldStats,
    substep_index: u64,
}

impl World {
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: WorldConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        let mut world = Self {
            pool: ThreadPool::new("strata"),
            state: WorldState {
                config: WorldConfig::default(),
                bodies: Vec::new(),
                body_list: BodyList::new(),
                scene: SceneTree::new(),
                joints: Vec::new(),
                contacts: Vec::new(),
                transforms: TransformBuffer::default(),
                stats: WorldStats::default(),
                substep_index: 0,
            },
        };
        world.set_config(config)?;
        Ok(world)
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.state.config
    }

    /// Replaces the configuration and resizes the pool to match.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidConfig`] and keeps the current
    /// configuration if `config` does not validate.
    pub fn set_config(&mut self, config: WorldConfig) -> Result<(), PhysicsError> {
        config.validate()?;
        self.pool.set_thread_count(config.thread_count);
        self.pool.set_diagnostic_timeout(
            (config.pool_diagnostic_ms > 0).then_some(Duration::from_millis(config.pool_diagnostic_ms)),
        );
        debug!(
            threads = self.pool.thread_count(),
            substeps = config.substeps,
            timestep = config.timestep,
            "world configured"
        );
        self.state.config = config;
        Ok(())
    }

    /// Creates a body and links it into the scene tree and the body list.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidShape`] if `desc` does not validate.
    pub fn add_body(&mut self, desc: BodyDesc) -> Result<BodyId, PhysicsError> {
        desc.validate()?;
        let state = &mut self.state;
        let id = BodyId(u32::try_from(state.bodies.len()).map_err(|_| {
            PhysicsError::InvalidConfig("body id space exhausted".to_owned())
        })?);

        let mut body = desc.build(id);
        body.refresh_aabb();
        state.scene.insert(id, &mut body);
        body.set_list_node(Some(state.body_list.add_item(id)));
        debug!(?id, shape = ?body.shape(), dynamic = body.is_dynamic(), "body added");
        state.bodies.push(Some(body));
        Ok(id)
    }

    /// Detaches a body, drops every joint attached to it and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::UnknownBody`] if `id` is not live.
    pub fn remove_body(&mut self, id: BodyId) -> Result<Body, PhysicsError> {
        let state = &mut self.state;
        let mut body = state
            .bodies
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(PhysicsError::UnknownBody(id))?;

        state.scene.remove(&mut body);
        if let Some(node) = body.list_node() {
            state.body_list.remove_item(node);
            body.set_list_node(None);
        }

        let mut dropped = 0;
        for slot in &mut state.joints {
            if slot.is_some_and(|joint| joint.body_a == id || joint.body_b == id) {
                *slot = None;
                dropped += 1;
            }
        }
        state
            .contacts
            .retain(|contact| contact.body_a != id && contact.body_b != id);
        debug!(?id, joints = dropped, "body removed");
        Ok(body)
    }

    /// Connects two distinct bodies with a distance joint.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::UnknownBody`] for a missing body and
    /// [`PhysicsError::InvalidJoint`] for a self-joint or a bad rest length.
    pub fn add_joint(&mut self, joint: DistanceJoint) -> Result<JointId, PhysicsError> {
        for id in [joint.body_a, joint.body_b] {
            if self.body(id).is_none() {
                return Err(PhysicsError::UnknownBody(id));
            }
        }
        if joint.body_a == joint.body_b {
            return Err(PhysicsError::InvalidJoint("a joint needs two different bodies"));
        }
        if !(joint.rest_length.is_finite() && joint.rest_length >= 0.0) {
            return Err(PhysicsError::InvalidJoint("rest length must be finite and non-negative"));
        }

        let joints = &mut self.state.joints;
        let id = JointId(u32::try_from(joints.len()).map_err(|_| {
            PhysicsError::InvalidConfig("joint id space exhausted".to_owned())
        })?);
        joints.push(Some(joint));
        debug!(?id, a = ?joint.body_a, b = ?joint.body_b, "joint added");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns [`PhysicsError::UnknownJoint`] if `id` is not live.
    pub fn remove_joint(&mut self, id: JointId) -> Result<DistanceJoint, PhysicsError> {
        self.state
            .joints
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(PhysicsError::UnknownJoint(id))
    }

    #[must_use]
    pub fn joint(&self, id: JointId) -> Option<&DistanceJoint> {
        self.state.joints.get(id.index()).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        lookup(&self.state.bodies, id)
    }

    /// Mutable access to a body's state. Position edits reach the scene
    /// tree at the next step for dynamic bodies; use
    /// [`World::set_position`] to move a static body.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.state.body_mut(id)
    }

    /// Moves a body and updates its scene box immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::UnknownBody`] if `id` is not live.
    pub fn set_position(&mut self, id: BodyId, position: Vec3) -> Result<(), PhysicsError> {
        let state = &mut self.state;
        let body = state
            .bodies
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(PhysicsError::UnknownBody(id))?;
        body.position = position;
        let aabb = body.refresh_aabb();
        if let Some(node) = body.scene_node() {
            state.scene.update_body_aabb(node, &aabb);
        }
        Ok(())
    }

    /// Live bodies in attachment order.
    pub fn bodies(&mut self) -> &[BodyId] {
        self.state.body_list.update_view();
        self.state.body_list.view()
    }

    #[must_use]
    pub fn body_count(&self) -> usize {
        self.state.body_list.len()
    }

    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.state.joints.iter().flatten().count()
    }

    #[must_use]
    pub fn scene(&self) -> &SceneTree {
        &self.state.scene
    }

    pub fn set_thread_count(&mut self, count: usize) {
        self.pool.set_thread_count(count);
        self.state.config.thread_count = self.pool.thread_count();
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.pool.thread_count()
    }

    /// Contacts found during the last sub-step.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.state.contacts
    }

    /// Positions written back by the last step, in body list order.
    #[must_use]
    pub fn transforms(&self) -> &[BodyTransform] {
        self.state.transforms.records()
    }

    #[must_use]
    pub fn transform_bytes(&self) -> &[u8] {
        self.state.transforms.as_bytes()
    }

    #[must_use]
    pub fn stats(&self) -> WorldStats {
        self.state.stats
    }

    /// Advances the simulation by one `timestep`.
    ///
    /// # Errors
    ///
    /// Propagates [`PhysicsError::Compute`] from the island solver.
    pub fn step(&mut self) -> Result<(), PhysicsError> {
        let substeps = self.state.config.substeps;
        let dt = self.state.config.substep_dt();
        let state = &mut self.state;

        self.pool.bracket(|pool| {
            for _ in 0..substeps {
                state.substep(pool, dt)?;
            }
            Ok::<(), PhysicsError>(())
        })?;

        let state = &mut self.state;
        state.body_list.update_view();
        let bodies = &state.bodies;
        state.transforms.fill(
            state
                .body_list
                .view()
                .iter()
                .filter_map(|&id| lookup(bodies, id)),
        );
        state.stats.steps += 1;

        #[cfg(debug_assertions)]
        state.scene.sanity_check();

        trace!(
            step = state.stats.steps,
            pairs = state.stats.pairs,
            contacts = state.stats.contacts,
            islands = state.stats.islands,
            iterations = state.stats.solver_iterations,
            "step complete"
        );
        Ok(())
    }

    /// Takes `steps` steps.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step and returns its error.
    pub fn run(&mut self, steps: usize) -> Result<(), PhysicsError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Destroys every body and joint. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        let state = &mut self.state;
        let removed = state.scene.clear();
        state.bodies.iter_mut().for_each(|slot| *slot = None);
        state.joints.iter_mut().for_each(|slot| *slot = None);
        state.body_list.clear();
        state.contacts.clear();
        state.transforms.fill(std::iter::empty());
        debug!(bodies = removed.len(), "world cleared");
    }
}

impl WorldState {
    fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn substep(&mut self, pool: &ThreadPool, dt: f32) -> Result<(), PhysicsError> {
        self.body_list.update_view();
        let view: Vec<BodyId> = self.body_list.view().to_vec();

        let kicks = external_velocity(pool, &self.bodies, &view, self.config.gravity(), dt);
        for (&id, kick) in view.iter().zip(kicks) {
            if let Some(body) = self.body_mut(id) {
                body.velocity += kick;
            }
        }

        for &id in &view {
            let Some(body) = self.bodies.get_mut(id.index()).and_then(Option::as_mut) else {
                continue;
            };
            if !body.is_dynamic() {
                continue;
            }
            let aabb = body.refresh_aabb();
            if let Some(node) = body.scene_node() {
                self.scene.update_body_aabb(node, &aabb);
            }
        }

        self.substep_index += 1;
        let interval = u64::from(self.config.fitness_interval);
        let rotations = if interval > 0 && self.substep_index % interval == 0 {
            self.scene.improve_fitness()
        } else {
            0
        };

        let bodies = &self.bodies;
        let scene = &self.scene;
        let is_dynamic = |id: BodyId| lookup(bodies, id).is_some_and(Body::is_dynamic);

        let proxies: Vec<BroadPhaseProxy> = view
            .iter()
            .filter_map(|&id| {
                let body = lookup(bodies, id)?;
                let node = scene.node(body.scene_node()?)?;
                Some(BroadPhaseProxy {
                    body: id,
                    aabb: node.aabb(),
                    dynamic: body.is_dynamic(),
                })
            })
            .collect();
        let pairs = find_pairs(pool, scene, &proxies, is_dynamic);

        let found = parallel_map(pool, pairs.len(), |_, i| {
            let (a, b) = pairs[i];
            let (body_a, body_b) = (lookup(bodies, a)?, lookup(bodies, b)?);
            collide(
                (a, body_a.position, body_a.shape()),
                (b, body_b.position, body_b.shape()),
            )
        });
        self.contacts = found.into_iter().flatten().collect();

        let joints: Vec<(JointId, DistanceJoint)> = self
            .joints
            .iter()
            .enumerate()
            .filter_map(|(i, joint)| {
                let id = JointId(u32::try_from(i).ok()?);
                joint.map(|joint| (id, joint))
            })
            .collect();
        let islands = build_islands(bodies.len(), &view, is_dynamic, &self.contacts, &joints);

        let contacts = &self.contacts;
        let solver = &self.config.solver;
        let solutions: Vec<Option<Result<IslandSolution, ComputeError>>> =
            parallel_map(pool, islands.len(), |_, i| {
                let (members, rows) = islands[i].assemble(bodies, contacts, &joints, solver, dt);
                Some(solve_island(&members, &rows, solver))
            });

        let mut iterations = 0;
        for solution in solutions.into_iter().flatten() {
            let solution = solution?;
            iterations += solution.iterations;
            for (id, delta) in solution.velocity_deltas {
                if let Some(body) = self.body_mut(id) {
                    let velocity = body.velocity + delta;
                    body.velocity = Vec3::new(
                        flush_to_zero(velocity.x),
                        flush_to_zero(velocity.y),
                        flush_to_zero(velocity.z),
                    );
                }
            }
        }

        let positions = integrate_positions(pool, &self.bodies, &view, dt);
        for (&id, position) in view.iter().zip(positions) {
            if let Some(body) = self.body_mut(id) {
                body.position = position;
            }
        }

        self.stats = WorldStats {
            steps: self.stats.steps,
            bodies: view.len(),
            joints: joints.len(),
            pairs: pairs.len(),
            contacts: self.contacts.len(),
            islands: islands.len(),
            solver_iterations: iterations,
            rotations,
        };
        trace!(substep = self.substep_index, rotations, "sub-step solved");
        Ok(())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("threads", &self.pool.thread_count())
            .field("bodies", &self.state.body_list.len())
            .field("joints", &self.joint_count())
            .field("stats", &self.state.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_fall_matches_semi_implicit_euler() {
        let config = WorldConfig {
            substeps: 1,
            timestep: 0.1,
            ..WorldConfig::default()
        };
        let mut world = World::new(config).unwrap();
        let id = world.add_body(BodyDesc::sphere(0.5).at(Vec3::new(0.0, 10.0, 0.0))).unwrap();
        world.run(2).unwrap();

        let body = world.body(id).unwrap();
        // v1 = -0.981, y1 = 9.9019; v2 = -1.962, y2 = 9.7057
        assert!((body.velocity.y + 1.962).abs() < 1e-4);
        assert!((body.position.y - 9.7057).abs() < 1e-4);
    }

    #[test]
    fn static_bodies_do_not_move() {
        let mut world = World::new(WorldConfig::default()).unwrap();
        let id = world
            .add_body(BodyDesc::cuboid(Vec3::new(5.0, 0.5, 5.0)).fixed())
            .unwrap();
        world.run(10).unwrap();
        assert_eq!(world.body(id).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn self_joint_is_rejected() {
        let mut world = World::new(WorldConfig::default()).unwrap();
        let id = world.add_body(BodyDesc::sphere(1.0)).unwrap();
        let err = world
            .add_joint(DistanceJoint {
                body_a: id,
                body_b: id,
                rest_length: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidJoint(_)));
    }
}
