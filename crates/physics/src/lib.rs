#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Strata Physics
//!
//! A rigid-body core built around a dynamic bounding volume hierarchy and a
//! dense constraint solver, with every heavy stage spread over a spin-wait
//! worker pool.
//!
//! ## Key Components
//!
//! -   **Scene tree:** [`SceneTree`] keeps a quantized AABB hierarchy over
//!     the bodies, with surface-area guided insertion and local rotations
//!     that keep it tight as bodies move.
//! -   **Body list:** [`ListView`] gives O(1) attach and detach plus a
//!     lazily rebuilt flat view that parallel stages index into.
//! -   **Solver:** contacts and distance joints are grouped into islands and
//!     each island is solved as `J M⁻¹ Jᵀ λ = b`, by Gaussian elimination
//!     for small systems and conjugate gradient otherwise.
//! -   **World:** [`World`] owns all of the above plus the
//!     [`compute::ThreadPool`] and runs the update loop.
//!
//! ## Usage
//!
//! ```rust
//! use physics::{BodyDesc, Vec3, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default())?;
//! world.add_body(BodyDesc::cuboid(Vec3::new(10.0, 0.5, 10.0)).fixed())?;
//! let ball = world.add_body(BodyDesc::sphere(0.5).at(Vec3::new(0.0, 3.0, 0.0)))?;
//!
//! world.run(120)?;
//! assert!(world.body(ball).unwrap().position.y > 0.5);
//! # Ok::<(), physics::PhysicsError>(())
//! ```

pub mod body;
pub mod body_list;
pub mod collision;
pub mod config;
pub mod error;
mod steps;
pub mod transform;
pub mod types;
pub mod world;

pub use body::{Body, BodyDesc, BodyNotify};
pub use body_list::{BodyList, ListNodeId, ListView};
pub use collision::{NodeId, SceneBody, SceneNode, SceneNodeKind, SceneTree};
pub use config::{SolverConfig, WorldConfig};
pub use error::PhysicsError;
pub use transform::{BodyTransform, TransformBuffer};
pub use types::{Aabb, BodyId, Contact, DistanceJoint, JointId, Shape, Vec3, AABB_QUANTIZATION};
pub use world::{World, WorldStats};
