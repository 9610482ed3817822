//! Rays and ray hits

use crate::foundation::collections::BodyHandle;
use crate::foundation::math::Vec3;

/// A ray for ray casting and hitscan queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray, always unit length
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray, normalizing `direction`
    ///
    /// Returns `None` for a zero or non-finite direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize(f32::EPSILON)?;
        direction.iter().all(|c| c.is_finite()).then_some(Self { origin, direction })
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Result of a ray intersection test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// The body that was hit
    pub body: BodyHandle,
    /// The distance from the ray origin to the hit point
    pub distance: f32,
    /// The point of intersection in world space
    pub point: Vec3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 4.0)).unwrap();
        assert_eq!(ray.direction, Vec3::z());
        assert_eq!(ray.point_at(2.5), Vec3::new(0.0, 0.0, 2.5));
    }

    #[test]
    fn test_zero_direction_is_rejected() {
        assert!(Ray::new(Vec3::zeros(), Vec3::zeros()).is_none());
    }
}
