//! Convex collision hulls
//!
//! Shapes are stored in model space (GEA 13.3.4) and only transformed while a
//! support query runs. Vertex buffers are reference counted so every box or
//! sphere collider in a world shares the same stock geometry.

use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use super::bounding::{BoundingKind, BoundingVolume};
use crate::error::{PhysicsError, PhysicsResult};
use crate::foundation::math::{Transform, Vec3};

/// Model-space convex hull given by its vertices
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexShape {
    points: Arc<[Vec3]>,
}

impl ConvexShape {
    /// Wrap a vertex list; the hull is implied by the points
    pub fn from_points(points: Vec<Vec3>) -> PhysicsResult<Self> {
        if points.is_empty() {
            return Err(PhysicsError::EmptyShape);
        }
        if !points.iter().all(|p| p.iter().all(|c| c.is_finite())) {
            return Err(PhysicsError::InvalidBoundingVolume("non-finite vertex".to_string()));
        }
        Ok(Self { points: points.into() })
    }

    /// Model-space vertices
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// True when both shapes share one vertex buffer
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.points, &other.points)
    }

    /// World-space vertex with the largest projection onto `direction`
    ///
    /// Linear scan; ties keep the earliest vertex.
    pub fn furthest_point(&self, transform: &Transform, direction: &Vec3) -> Vec3 {
        let mut best = transform.transform_point(&self.points[0]);
        let mut best_dot = best.dot(direction);
        for point in self.points.iter().skip(1) {
            let world = transform.transform_point(point);
            let d = world.dot(direction);
            if d > best_dot {
                best = world;
                best_dot = d;
            }
        }
        best
    }

    /// Centroid of the world-space vertices within `tolerance` of the support plane
    ///
    /// For a face this is the face center, for an edge its midpoint.
    pub fn support_feature_center(&self, transform: &Transform, direction: &Vec3, tolerance: f32) -> Vec3 {
        let world: Vec<Vec3> = self.points.iter().map(|p| transform.transform_point(p)).collect();
        let max_dot = world.iter().map(|p| p.dot(direction)).fold(f32::NEG_INFINITY, f32::max);

        let (sum, count) = world
            .iter()
            .filter(|p| p.dot(direction) >= max_dot - tolerance)
            .fold((Vec3::zeros(), 0_u32), |(sum, count), p| (sum + p, count + 1));

        if count == 0 {
            self.furthest_point(transform, direction)
        } else {
            sum / count as f32
        }
    }

    /// Bounding volume of the requested kind around the local vertices
    pub fn local_bounds(&self, kind: BoundingKind) -> PhysicsResult<BoundingVolume> {
        BoundingVolume::from_points(kind, &self.points)
    }

    /// Model-space box half extents around the vertices
    pub fn local_half_extents(&self) -> Vec3 {
        let first = self.points[0];
        let (min, max) = self
            .points
            .iter()
            .fold((first, first), |(min, max), p| (min.inf(p), max.sup(p)));
        (max - min) * 0.5
    }
}

/// Shared procedural hulls for box and sphere colliders
///
/// Built once per world and handed to every collider that asks for a stock
/// primitive.
#[derive(Debug, Clone)]
pub struct StockShapes {
    unit_box: ConvexShape,
    unit_sphere: ConvexShape,
}

impl StockShapes {
    /// Build the unit cube and a unit-diameter UV sphere
    pub fn new(sphere_tessellation: u32) -> Self {
        let mut cube = Vec::with_capacity(8);
        for i in 0..8 {
            cube.push(Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            ));
        }

        Self {
            unit_box: ConvexShape { points: cube.into() },
            unit_sphere: ConvexShape { points: uv_sphere(0.5, sphere_tessellation.max(3)).into() },
        }
    }

    /// Cube with half extent 0.5
    pub fn unit_box(&self) -> ConvexShape {
        self.unit_box.clone()
    }

    /// Sphere with radius 0.5
    pub fn unit_sphere(&self) -> ConvexShape {
        self.unit_sphere.clone()
    }
}

/// Latitude/longitude vertex set; poles appear once
fn uv_sphere(radius: f32, tessellation: u32) -> Vec<Vec3> {
    let vertical = (tessellation / 2).max(2);
    let horizontal = tessellation;
    let mut points = Vec::with_capacity((vertical as usize - 1) * horizontal as usize + 2);

    points.push(Vec3::new(0.0, -radius, 0.0));
    for i in 1..vertical {
        let latitude = (i as f32 * PI / vertical as f32) - PI * 0.5;
        let (dy, dxz) = latitude.sin_cos();
        for j in 0..horizontal {
            let longitude = j as f32 * TAU / horizontal as f32;
            let (dx, dz) = longitude.sin_cos();
            points.push(Vec3::new(dx * dxz, dy, dz * dxz) * radius);
        }
    }
    points.push(Vec3::new(0.0, radius, 0.0));
    points
}
