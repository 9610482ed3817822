//! Bounding volumes used by the broad phase, speculation and ray queries
//!
//! A collider keeps its bounding volume in model space and transforms it to
//! world space per query. Every operation matches on [`BoundingVolume`]
//! exhaustively, so a new volume kind has to be handled everywhere.

use serde::{Deserialize, Serialize};

use super::primitives::Ray;
use crate::error::{PhysicsError, PhysicsResult};
use crate::foundation::math::{Quat, Transform, Vec3};

/// Which bounding volume a collider derives from its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundingKind {
    /// Oriented box around the local extremes
    Box,
    /// Sphere around the local extremes
    Sphere,
}

/// A bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// The center position of the sphere
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere, rejecting negative or non-finite radii
    pub fn new(center: Vec3, radius: f32) -> PhysicsResult<Self> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(PhysicsError::InvalidBoundingVolume(format!("sphere radius {radius}")));
        }
        Ok(Self { center, radius })
    }

    /// Check if this sphere intersects with another
    pub fn intersects(&self, other: &Self) -> bool {
        let distance_squared = (self.center - other.center).magnitude_squared();
        let radius_sum = self.radius + other.radius;
        distance_squared <= radius_sum * radius_sum
    }

    /// Check whether a point lies inside or on the sphere
    pub fn contains_point(&self, point: &Vec3) -> bool {
        (point - self.center).magnitude_squared() <= self.radius * self.radius
    }

    /// Distance along the ray to the first surface hit, 0 when starting inside
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        // Solve |origin + t*direction - center|^2 = radius^2 with a unit direction
        let oc = ray.origin - self.center;
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;

        if c <= 0.0 {
            return Some(0.0);
        }

        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let t = -b - discriminant.sqrt();
        (t >= 0.0).then_some(t)
    }

    /// Smallest sphere enclosing both
    pub fn merged(&self, other: &Self) -> Self {
        let offset = other.center - self.center;
        let distance = offset.magnitude();

        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return *other;
        }

        let radius = (distance + self.radius + other.radius) * 0.5;
        let center = self.center + offset * ((radius - self.radius) / distance);
        Self { center, radius }
    }
}

/// A box with its own orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    /// Box center
    pub center: Vec3,
    /// Half size along each local axis
    pub half_extents: Vec3,
    /// Rotation of the local axes
    pub orientation: Quat,
}

impl OrientedBox {
    /// Creates a box, rejecting negative or non-finite extents
    pub fn new(center: Vec3, half_extents: Vec3, orientation: Quat) -> PhysicsResult<Self> {
        if !half_extents.iter().all(|e| e.is_finite() && *e >= 0.0) {
            return Err(PhysicsError::InvalidBoundingVolume(format!(
                "box half extents {half_extents:?}"
            )));
        }
        Ok(Self { center, half_extents, orientation })
    }

    /// World-space unit axes of the box
    pub fn axes(&self) -> [Vec3; 3] {
        [
            self.orientation * Vec3::x(),
            self.orientation * Vec3::y(),
            self.orientation * Vec3::z(),
        ]
    }

    fn to_local(&self, point: &Vec3) -> Vec3 {
        self.orientation.inverse_transform_vector(&(point - self.center))
    }

    /// Check whether a point lies inside or on the box
    pub fn contains_point(&self, point: &Vec3) -> bool {
        let local = self.to_local(point);
        (0..3).all(|i| local[i].abs() <= self.half_extents[i])
    }

    /// Closest point on or in the box
    pub fn closest_point(&self, point: &Vec3) -> Vec3 {
        let local = self.to_local(point);
        let clamped = Vec3::new(
            local.x.clamp(-self.half_extents.x, self.half_extents.x),
            local.y.clamp(-self.half_extents.y, self.half_extents.y),
            local.z.clamp(-self.half_extents.z, self.half_extents.z),
        );
        self.center + self.orientation * clamped
    }

    /// Slab test in box space; 0 when starting inside
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let origin = self.to_local(&ray.origin);
        let direction = self.orientation.inverse_transform_vector(&ray.direction);

        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for i in 0..3 {
            let (min, max) = (-self.half_extents[i], self.half_extents[i]);
            if direction[i].abs() < f32::EPSILON {
                // Parallel to this slab: miss unless the origin is between its planes
                if origin[i] < min || origin[i] > max {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction[i];
            let t1 = (min - origin[i]) * inv;
            let t2 = (max - origin[i]) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        (t_max >= t_min && t_max >= 0.0).then(|| t_min.max(0.0))
    }

    /// The eight world-space corners
    pub fn corners(&self) -> [Vec3; 8] {
        let [ax, ay, az] = self.axes();
        let e = self.half_extents;
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
            let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
            *corner = self.center + ax * (e.x * sx) + ay * (e.y * sy) + az * (e.z * sz);
        }
        corners
    }

    /// Separating axis test between two oriented boxes (15 axes)
    pub fn intersects(&self, other: &Self) -> bool {
        const PARALLEL_EPSILON: f32 = 1e-6;

        let a = self.axes();
        let b = other.axes();
        let ea = self.half_extents;
        let eb = other.half_extents;

        let mut r = [[0.0_f32; 3]; 3];
        let mut abs_r = [[0.0_f32; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                r[i][j] = a[i].dot(&b[j]);
                abs_r[i][j] = r[i][j].abs() + PARALLEL_EPSILON;
            }
        }

        let offset = other.center - self.center;
        let t = [offset.dot(&a[0]), offset.dot(&a[1]), offset.dot(&a[2])];

        for i in 0..3 {
            let ra = ea[i];
            let rb = eb[0] * abs_r[i][0] + eb[1] * abs_r[i][1] + eb[2] * abs_r[i][2];
            if t[i].abs() > ra + rb {
                return false;
            }
        }

        for j in 0..3 {
            let ra = ea[0] * abs_r[0][j] + ea[1] * abs_r[1][j] + ea[2] * abs_r[2][j];
            let rb = eb[j];
            let projected = t[0] * r[0][j] + t[1] * r[1][j] + t[2] * r[2][j];
            if projected.abs() > ra + rb {
                return false;
            }
        }

        // Cross products a[i] x b[j]
        for i in 0..3 {
            let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
            for j in 0..3 {
                let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
                let ra = ea[i1] * abs_r[i2][j] + ea[i2] * abs_r[i1][j];
                let rb = eb[j1] * abs_r[i][j2] + eb[j2] * abs_r[i][j1];
                let projected = t[i2] * r[i1][j] - t[i1] * r[i2][j];
                if projected.abs() > ra + rb {
                    return false;
                }
            }
        }

        true
    }

    /// Half length of the box projected onto `direction` (unit)
    pub fn extent_along(&self, direction: &Vec3) -> f32 {
        self.axes()
            .iter()
            .zip(self.half_extents.iter())
            .map(|(axis, e)| e * axis.dot(direction).abs())
            .sum()
    }

    /// Box in this box's frame covering both sets of points
    fn enclosing(&self, points: impl IntoIterator<Item = Vec3>) -> Self {
        let axes = self.axes();
        let mut min = -self.half_extents;
        let mut max = self.half_extents;
        for point in points {
            let local = point - self.center;
            for i in 0..3 {
                let d = local.dot(&axes[i]);
                min[i] = min[i].min(d);
                max[i] = max[i].max(d);
            }
        }
        let mid = (min + max) * 0.5;
        Self {
            center: self.center + axes[0] * mid.x + axes[1] * mid.y + axes[2] * mid.z,
            half_extents: (max - min) * 0.5,
            orientation: self.orientation,
        }
    }
}

/// Box or sphere bounding volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingVolume {
    /// Oriented box
    OrientedBox(OrientedBox),
    /// Sphere
    Sphere(BoundingSphere),
}

impl BoundingVolume {
    /// Fit a volume of the given kind around model-space points
    pub fn from_points(kind: BoundingKind, points: &[Vec3]) -> PhysicsResult<Self> {
        let first = points.first().ok_or(PhysicsError::EmptyShape)?;
        let (min, max) = points.iter().fold((*first, *first), |(min, max), p| (min.inf(p), max.sup(p)));
        let center = (min + max) * 0.5;

        match kind {
            BoundingKind::Box => {
                OrientedBox::new(center, (max - min) * 0.5, Quat::identity()).map(Self::OrientedBox)
            }
            BoundingKind::Sphere => {
                let radius = points
                    .iter()
                    .map(|p| (p - center).magnitude())
                    .fold(0.0_f32, f32::max);
                BoundingSphere::new(center, radius).map(Self::Sphere)
            }
        }
    }

    /// Volume in the space described by `transform`
    pub fn transformed(&self, transform: &Transform) -> Self {
        match self {
            Self::OrientedBox(b) => Self::OrientedBox(OrientedBox {
                center: transform.transform_point(&b.center),
                half_extents: b.half_extents.component_mul(&transform.scale.abs()),
                orientation: transform.rotation * b.orientation,
            }),
            Self::Sphere(s) => Self::Sphere(BoundingSphere {
                center: transform.transform_point(&s.center),
                radius: s.radius * transform.max_scale(),
            }),
        }
    }

    /// Same volume moved by `offset`
    #[must_use]
    pub fn translated(&self, offset: Vec3) -> Self {
        match *self {
            Self::OrientedBox(b) => Self::OrientedBox(OrientedBox { center: b.center + offset, ..b }),
            Self::Sphere(s) => Self::Sphere(BoundingSphere { center: s.center + offset, ..s }),
        }
    }

    /// Volume grown by `amount` in every direction
    #[must_use]
    pub fn inflated(&self, amount: f32) -> Self {
        let amount = amount.max(0.0);
        match *self {
            Self::OrientedBox(b) => Self::OrientedBox(OrientedBox {
                half_extents: b.half_extents.add_scalar(amount),
                ..b
            }),
            Self::Sphere(s) => Self::Sphere(BoundingSphere { radius: s.radius + amount, ..s }),
        }
    }

    /// Volume covering this one and the same volume moved by `sweep`
    #[must_use]
    pub fn swept(&self, sweep: Vec3) -> Self {
        self.merged(&self.translated(sweep))
    }

    /// Volume of this kind enclosing both volumes
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Sphere(a), Self::Sphere(b)) => Self::Sphere(a.merged(b)),
            (Self::Sphere(a), Self::OrientedBox(b)) => Self::Sphere(a.merged(&BoundingSphere {
                center: b.center,
                radius: b.half_extents.magnitude(),
            })),
            (Self::OrientedBox(a), Self::OrientedBox(b)) => Self::OrientedBox(a.enclosing(b.corners())),
            (Self::OrientedBox(a), Self::Sphere(b)) => {
                let axes = a.axes();
                let extremes = axes
                    .iter()
                    .flat_map(|axis| [b.center + axis * b.radius, b.center - axis * b.radius]);
                Self::OrientedBox(a.enclosing(extremes))
            }
        }
    }

    /// Center of the volume
    pub fn center(&self) -> Vec3 {
        match self {
            Self::OrientedBox(b) => b.center,
            Self::Sphere(s) => s.center,
        }
    }

    /// Radius of a sphere around the center containing the whole volume
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::OrientedBox(b) => b.half_extents.magnitude(),
            Self::Sphere(s) => s.radius,
        }
    }

    /// Half length of the volume projected onto a unit direction
    pub fn extent_along(&self, direction: &Vec3) -> f32 {
        match self {
            Self::OrientedBox(b) => b.extent_along(direction),
            Self::Sphere(s) => s.radius,
        }
    }

    /// Check whether a point lies inside or on the volume
    pub fn contains_point(&self, point: &Vec3) -> bool {
        match self {
            Self::OrientedBox(b) => b.contains_point(point),
            Self::Sphere(s) => s.contains_point(point),
        }
    }

    /// Distance along the ray to the volume, ignoring hits beyond `max_distance`
    pub fn intersect_ray(&self, ray: &Ray, max_distance: f32) -> Option<f32> {
        let distance = match self {
            Self::OrientedBox(b) => b.intersect_ray(ray),
            Self::Sphere(s) => s.intersect_ray(ray),
        }?;
        (distance <= max_distance).then_some(distance)
    }

    /// Overlap test between two volumes; touching counts as overlapping
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sphere(a), Self::Sphere(b)) => a.intersects(b),
            (Self::OrientedBox(a), Self::OrientedBox(b)) => a.intersects(b),
            (Self::OrientedBox(b), Self::Sphere(s)) | (Self::Sphere(s), Self::OrientedBox(b)) => {
                s.contains_point(&b.closest_point(&s.center))
            }
        }
    }
}
