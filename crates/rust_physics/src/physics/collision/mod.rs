//! Collision geometry and exact overlap tests
//!
//! Follows Game Engine Architecture 3rd Edition (GEA 13.3.4):
//! - **Model Space Storage**: hulls are stored in local coordinates
//! - **On-Demand Transformation**: vertices are moved to world space only inside support queries
//! - **Two Phases**: bounding volumes reject cheaply, GJK + EPA decide exactly
//!
//! # Module Organization
//!
//! - [`primitives`] - Rays and ray hits
//! - [`bounding`] - Box and sphere bounding volumes
//! - [`shape`] - Convex hulls and the stock box/sphere geometry
//! - [`support`] - Support-function adapters (world hulls, balls, sweeps)
//! - [`simplex`], [`gjk`], [`epa`] - The Minkowski-difference algorithms
//! - [`narrow_phase`] - Configured entry point for GJK + EPA

pub mod bounding;
pub mod epa;
pub mod gjk;
pub mod narrow_phase;
pub mod primitives;
pub mod shape;
pub mod simplex;
pub mod support;

pub use bounding::{BoundingKind, BoundingSphere, BoundingVolume, OrientedBox};
pub use epa::Penetration;
pub use narrow_phase::NarrowPhase;
pub use primitives::{Ray, RayHit};
pub use shape::{ConvexShape, StockShapes};
pub use simplex::Simplex;
pub use support::{minkowski_support, Ball, SupportMap, Swept, Translated, WorldHull};
