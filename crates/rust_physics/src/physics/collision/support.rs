//! Support functions for the Minkowski-difference algorithms
//!
//! GJK and EPA only ever ask one question of a shape: which of its points is
//! furthest along a direction. Anything answering that can be tested.

use super::shape::ConvexShape;
use crate::foundation::math::{Transform, Vec3};

/// A convex set queried through its support function
pub trait SupportMap {
    /// Point of the set with the largest projection onto `direction`
    fn support(&self, direction: &Vec3) -> Vec3;

    /// A point inside the set, used to seed the search direction
    fn center(&self) -> Vec3;
}

impl<T: SupportMap + ?Sized> SupportMap for &T {
    fn support(&self, direction: &Vec3) -> Vec3 {
        (**self).support(direction)
    }

    fn center(&self) -> Vec3 {
        (**self).center()
    }
}

/// A model-space hull placed in the world
#[derive(Debug, Clone, Copy)]
pub struct WorldHull<'a> {
    /// Model-space geometry
    pub shape: &'a ConvexShape,
    /// Placement in the world
    pub transform: Transform,
}

impl<'a> WorldHull<'a> {
    /// Pair a shape with its world transform
    pub fn new(shape: &'a ConvexShape, transform: Transform) -> Self {
        Self { shape, transform }
    }
}

impl SupportMap for WorldHull<'_> {
    fn support(&self, direction: &Vec3) -> Vec3 {
        self.shape.furthest_point(&self.transform, direction)
    }

    fn center(&self) -> Vec3 {
        self.transform.position
    }
}

/// An exact sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl SupportMap for Ball {
    fn support(&self, direction: &Vec3) -> Vec3 {
        direction
            .try_normalize(f32::EPSILON)
            .map_or(self.center, |dir| self.center + dir * self.radius)
    }

    fn center(&self) -> Vec3 {
        self.center
    }
}

/// A shape together with every translation of it along `sweep`
///
/// The support of the swept hull is the shape's support, pushed to the far
/// end of the sweep when the sweep points along the query direction.
#[derive(Debug, Clone, Copy)]
pub struct Swept<S> {
    /// The moving shape at its current position
    pub inner: S,
    /// Translation covered during the sweep
    pub sweep: Vec3,
}

impl<S: SupportMap> SupportMap for Swept<S> {
    fn support(&self, direction: &Vec3) -> Vec3 {
        let base = self.inner.support(direction);
        if self.sweep.dot(direction) > 0.0 {
            base + self.sweep
        } else {
            base
        }
    }

    fn center(&self) -> Vec3 {
        self.inner.center() + self.sweep * 0.5
    }
}

/// A shape shifted by a fixed offset
#[derive(Debug, Clone, Copy)]
pub struct Translated<S> {
    /// The original shape
    pub inner: S,
    /// Offset applied to every point
    pub offset: Vec3,
}

impl<S: SupportMap> SupportMap for Translated<S> {
    fn support(&self, direction: &Vec3) -> Vec3 {
        self.inner.support(direction) + self.offset
    }

    fn center(&self) -> Vec3 {
        self.inner.center() + self.offset
    }
}

/// Support point of the Minkowski difference `A - B`
pub fn minkowski_support<A: SupportMap, B: SupportMap>(a: &A, b: &B, direction: &Vec3) -> Vec3 {
    a.support(direction) - b.support(&-direction)
}
