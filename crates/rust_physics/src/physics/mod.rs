//! Physics module for collision detection and response
//!
//! Collision detection uses the spatial index for the broad phase and GJK/EPA
//! for the narrow phase; response is a single-impulse contact solver on top of
//! a semi-implicit Euler integrator. [`PhysicsWorld`] runs the whole pipeline.

pub mod body;
pub mod collision;
pub mod collision_layers;
pub mod collision_system;
pub mod events;
pub mod integrator;
pub mod rigidbody;
pub mod solver;
pub mod world;

#[cfg(test)]
mod tests;

pub use body::{Body, BodyDesc, Collider, ColliderDesc, ColliderShape};
pub use collision::{BoundingKind, BoundingVolume, ConvexShape, NarrowPhase, Penetration, Ray, RayHit, StockShapes};
pub use collision_layers::{CollisionLayers, Layer, LAYER_MAX};
pub use collision_system::{CollisionDetector, CollisionPair, PairState};
pub use events::{CollisionEvent, CollisionListener, CollisionPhase, LayerMaskChange};
pub use integrator::Integrator;
pub use rigidbody::{RigidBody, RigidBodyDesc, RigidBodyFlags};
pub use solver::{ConstraintSolver, SolveReport};
pub use world::{PhysicsWorld, StepReport};
