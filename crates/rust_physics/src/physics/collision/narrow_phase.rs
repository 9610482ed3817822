//! Iteration limits and tolerances for GJK + EPA, bundled for callers

use super::epa::{self, Penetration};
use super::gjk;
use super::support::SupportMap;
use crate::config::PhysicsConfig;

/// Exact overlap test settings shared by the detector, solver and ground probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrowPhase {
    /// GJK iteration cap
    pub gjk_max_iterations: u32,
    /// EPA iteration cap
    pub epa_max_iterations: u32,
    /// EPA convergence tolerance
    pub epa_tolerance: f32,
}

impl Default for NarrowPhase {
    fn default() -> Self {
        Self::from_config(&PhysicsConfig::default())
    }
}

impl NarrowPhase {
    /// Read the limits from a physics configuration
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            gjk_max_iterations: config.gjk_max_iterations,
            epa_max_iterations: config.epa_max_iterations,
            epa_tolerance: config.epa_tolerance,
        }
    }

    /// GJK overlap test, seeded with the offset between the shape centers
    pub fn intersects<A: SupportMap, B: SupportMap>(&self, a: &A, b: &B) -> bool {
        gjk::intersects(a, b, a.center() - b.center(), self.gjk_max_iterations)
    }

    /// GJK followed by EPA; `None` when the shapes do not overlap
    pub fn penetration<A: SupportMap, B: SupportMap>(&self, a: &A, b: &B) -> Option<Penetration> {
        let simplex = gjk::intersection(a, b, a.center() - b.center(), self.gjk_max_iterations)?;
        epa::penetration(a, b, &simplex, self.epa_max_iterations, self.epa_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::physics::collision::Ball;

    #[test]
    fn test_penetration_none_when_apart() {
        let narrow = NarrowPhase::default();
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        let b = Ball { center: Vec3::new(0.0, 3.0, 0.0), radius: 1.0 };
        assert!(!narrow.intersects(&a, &b));
        assert!(narrow.penetration(&a, &b).is_none());
    }

    #[test]
    fn test_penetration_normal_points_from_first_to_second() {
        let narrow = NarrowPhase::default();
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        let b = Ball { center: Vec3::new(1.5, 0.0, 0.0), radius: 1.0 };
        let hit = narrow.penetration(&a, &b).unwrap();
        assert!(hit.normal.x > 0.99);
        assert!(hit.is_finite());
    }
}
