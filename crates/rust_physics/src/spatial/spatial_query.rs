//! Abstract spatial query interface for broad-phase collision detection
//!
//! Based on Game Engine Architecture 3rd Edition, Section 13.3.2:
//! "Spatial partitioning schemes... allow us to quickly cull out pairs of
//! objects that cannot possibly be colliding."
//!
//! The world talks to the index only through this trait, so the cell grid can
//! be swapped for another partitioning scheme without touching the detector.

use std::collections::BTreeSet;

use crate::foundation::collections::BodyHandle;
use crate::foundation::math::Vec3;
use crate::spatial::Octree;

/// Abstract interface for spatial partitioning used in broad-phase collision detection
///
/// GEA 13.3.2: "The broad phase quickly identifies pairs of objects that might
/// be colliding using some kind of spatial partitioning scheme."
pub trait SpatialQuery: Send + Sync {
    /// Insert (or move) a body; `false` when the position was rejected
    fn insert(&mut self, handle: BodyHandle, position: Vec3) -> bool;

    /// Move a body already in the structure
    fn update(&mut self, handle: BodyHandle, position: Vec3) -> bool;

    /// Remove a body from the structure
    fn remove(&mut self, handle: BodyHandle) -> bool;

    /// Bodies sharing the cell of `position`
    fn query_cell(&self, position: Vec3) -> BTreeSet<BodyHandle>;

    /// Bodies whose cells overlap the cube around `position`
    fn query_range(&self, position: Vec3, radius: f32) -> BTreeSet<BodyHandle>;

    /// Bodies along a ray, nearest cells first
    fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<BodyHandle>;

    /// Position a body was last indexed at
    fn position_of(&self, handle: BodyHandle) -> Option<Vec3>;

    /// Clear all bodies from the spatial structure
    fn clear(&mut self);

    /// Number of bodies in the structure
    fn len(&self) -> usize;

    /// True when the structure is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpatialQuery for Octree {
    fn insert(&mut self, handle: BodyHandle, position: Vec3) -> bool {
        Self::insert(self, handle, position)
    }

    fn update(&mut self, handle: BodyHandle, position: Vec3) -> bool {
        Self::update(self, handle, position)
    }

    fn remove(&mut self, handle: BodyHandle) -> bool {
        Self::remove(self, handle)
    }

    fn query_cell(&self, position: Vec3) -> BTreeSet<BodyHandle> {
        Self::query_cell(self, position)
    }

    fn query_range(&self, position: Vec3, radius: f32) -> BTreeSet<BodyHandle> {
        Self::query_range(self, position, radius)
    }

    fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<BodyHandle> {
        Self::query_ray(self, origin, direction, max_distance)
    }

    fn position_of(&self, handle: BodyHandle) -> Option<Vec3> {
        Self::position_of(self, handle)
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn len(&self) -> usize {
        Self::len(self)
    }
}
