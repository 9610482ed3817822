//! # Rust Physics
//!
//! Rigid body physics and collision core for real-time games.
//!
//! ## Features
//!
//! - **GJK + EPA**: exact convex overlap tests with penetration depth and normal
//! - **Cell Octree Broad Phase**: bounded grid with range and ray queries
//! - **Collision Events**: Enter / Continue / Exit per pair, with layer masks
//! - **Speculative Contacts**: fast movers are caught before they tunnel
//! - **Impulse Solver**: restitution impulses with a stacking penalty
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_physics::prelude::*;
//!
//! fn main() -> Result<(), PhysicsError> {
//!     let mut world = PhysicsWorld::new(PhysicsConfig::default())?;
//!
//!     world.create_body(
//!         BodyDesc::new(Transform::identity())
//!             .with_collider(ColliderDesc::cuboid())
//!             .with_rigidbody(RigidBodyDesc::fixed()),
//!     )?;
//!     let crate_box = world.create_body(
//!         BodyDesc::new(Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
//!             .with_collider(ColliderDesc::cuboid())
//!             .with_rigidbody(RigidBodyDesc::dynamic(1.0)),
//!     )?;
//!
//!     for _ in 0..200 {
//!         for event in world.step().events {
//!             println!("{:?}", event);
//!         }
//!     }
//!     println!("resting at {:?}", world.transform(crate_box)?.position);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod foundation;
pub mod physics;
pub mod spatial;

pub use error::{PhysicsError, PhysicsResult};

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PhysicsConfig},
        error::{PhysicsError, PhysicsResult},
        foundation::{
            collections::BodyHandle,
            math::{Quat, Transform, Vec3},
            time::FixedTimestep,
        },
        physics::{
            BodyDesc, ColliderDesc, CollisionEvent, CollisionListener, CollisionPhase, Layer, LayerMaskChange,
            PhysicsWorld, RayHit, RigidBodyDesc, StepReport,
        },
        spatial::{Octree, SpatialQuery},
    };
}
