//! Spatial partitioning data structures
//!
//! Provides the broad-phase index used for candidate pairs, ray casting and
//! proximity queries in 3D space.

mod octree;
pub mod spatial_query;

pub use octree::{CellCoord, Octree, OctreeConfig};
pub use spatial_query::SpatialQuery;
