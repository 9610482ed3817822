//! Impulse-based contact resolution
//!
//! Based on Game Engine Architecture 3rd Edition, 13.4.7 "Collision Response".
//! Each colliding pair is pushed apart along the EPA normal and receives a
//! single restitution impulse at the contact point. Speculative pairs only get
//! a one-sided position snap so the mover lands on, not through, its target.

use std::collections::HashSet;

use crate::config::PhysicsConfig;
use crate::foundation::collections::{BodyArena, BodyHandle};
use crate::foundation::math::{is_finite, Mat3, Vec3};
use crate::physics::body::Body;
use crate::physics::collision::{NarrowPhase, Penetration, Ray};
use crate::physics::collision_system::{CollisionDetector, CollisionPair};

/// Vertices this close to the support plane count as one contact feature
const FEATURE_TOLERANCE: f32 = 1e-3;

/// What one solver pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveReport {
    /// Colliding pairs pushed apart
    pub resolved: usize,
    /// Speculative pairs whose mover was snapped back
    pub snapped: usize,
}

/// Velocity-level state of one side of a contact
#[derive(Debug, Clone, Copy)]
struct ContactBody {
    inverse_mass: f32,
    inverse_inertia: Mat3,
    velocity: Vec3,
    angular_velocity: Vec3,
    /// Contact point relative to the body position
    arm: Vec3,
}

impl ContactBody {
    fn of(body: &Body, contact: Vec3) -> Self {
        body.rigidbody().map_or_else(
            || Self {
                inverse_mass: 0.0,
                inverse_inertia: Mat3::zeros(),
                velocity: Vec3::zeros(),
                angular_velocity: Vec3::zeros(),
                arm: contact - body.transform.position,
            },
            |rb| Self {
                inverse_mass: rb.inverse_mass(),
                inverse_inertia: rb.world_inverse_inertia(&body.transform.rotation),
                velocity: rb.velocity,
                angular_velocity: rb.angular_velocity,
                arm: contact - body.transform.position,
            },
        )
    }

    fn point_velocity(&self) -> Vec3 {
        self.velocity + self.angular_velocity.cross(&self.arm)
    }

    /// `n · ((I⁻¹ (r × n)) × r)`
    fn angular_term(&self, normal: &Vec3) -> f32 {
        (self.inverse_inertia * self.arm.cross(normal)).cross(&self.arm).dot(normal)
    }
}

/// Resolves the pairs found by the [`CollisionDetector`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintSolver {
    narrow: NarrowPhase,
    /// Coefficient of restitution
    pub restitution: f32,
    /// Approach speed below which contacts do not bounce; zero bounces always
    pub resting_velocity: f32,
    /// Penetration left in place
    pub penetration_slop: f32,
    /// Seconds per step
    pub timestep: f32,
}

impl ConstraintSolver {
    /// Read the settings from a physics configuration
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            narrow: NarrowPhase::from_config(config),
            restitution: config.restitution,
            resting_velocity: config.resting_velocity,
            penetration_slop: config.penetration_slop,
            timestep: config.fixed_timestep,
        }
    }

    /// Resolve this step's colliding pairs, then its speculative pairs
    ///
    /// Each pair is handled at most once.
    pub fn solve(&self, bodies: &mut BodyArena<Body>, detector: &CollisionDetector) -> SolveReport {
        let mut report = SolveReport::default();
        let mut done: HashSet<CollisionPair> = HashSet::new();

        for pair in detector.frame_pairs() {
            if done.insert(*pair) && self.resolve_contact(bodies, *pair, detector.stacking_factor(pair)) {
                report.resolved += 1;
            }
        }

        for pair in detector.speculative_pairs() {
            if done.insert(*pair) && self.resolve_speculative(bodies, *pair) {
                report.snapped += 1;
            }
        }

        report
    }

    /// Positional correction plus restitution impulse; false when skipped
    ///
    /// `stacking` scales the whole impulse, see
    /// [`CollisionDetector::stacking_factor`].
    pub fn resolve_contact(&self, bodies: &mut BodyArena<Body>, pair: CollisionPair, stacking: f32) -> bool {
        let Some((penetration, contact)) = self.contact(bodies, pair) else {
            return false;
        };
        let Some([a, b]) = bodies.get_disjoint_mut([pair.a, pair.b]) else {
            return false;
        };

        let Penetration { normal, depth } = penetration;
        let (inv_a, inv_b) = (inverse_mass(a), inverse_mass(b));
        let total = inv_a + inv_b;
        if total <= 0.0 {
            return false;
        }

        // Position: split by inverse mass, normal points from A to B
        let correction = (depth - self.penetration_slop).max(0.0);
        if correction > 0.0 {
            a.transform.position -= normal * correction * (inv_a / total);
            b.transform.position += normal * correction * (inv_b / total);
        }

        // Velocity
        let side_a = ContactBody::of(a, contact);
        let side_b = ContactBody::of(b, contact);
        let relative = side_b.point_velocity() - side_a.point_velocity();
        let approach = relative.dot(&normal);
        if approach >= 0.0 {
            return true;
        }

        let restitution = if -approach < self.resting_velocity {
            0.0
        } else {
            self.restitution
        };
        let denominator = total + side_a.angular_term(&normal) + side_b.angular_term(&normal);
        if denominator <= f32::EPSILON {
            return true;
        }

        // Pairs that have been touching for most of the last second respond less
        let magnitude = -(1.0 + restitution) * approach / denominator * stacking.clamp(0.0, 1.0);
        let impulse = normal * magnitude;
        if !is_finite(&impulse) {
            log::warn!("Discarding non-finite impulse for {:?}/{:?}", pair.a, pair.b);
            return true;
        }

        if let Some(rb) = a.rigidbody_mut() {
            rb.apply_linear_impulse(-impulse);
            rb.apply_angular_impulse(&side_a.inverse_inertia, side_a.arm.cross(&-impulse));
        }
        if let Some(rb) = b.rigidbody_mut() {
            rb.apply_linear_impulse(impulse);
            rb.apply_angular_impulse(&side_b.inverse_inertia, side_b.arm.cross(&impulse));
        }

        log::trace!(
            "Resolved {:?}/{:?}: depth {depth:.4}, impulse {:.4}, restitution {restitution:.3}",
            pair.a,
            pair.b,
            impulse.magnitude()
        );
        true
    }

    /// Pull a speculative mover back so next step ends `penetration_slop` deep
    pub fn resolve_speculative(&self, bodies: &mut BodyArena<Body>, pair: CollisionPair) -> bool {
        let Some((mover, target)) = speculative_mover(bodies, pair) else {
            return false;
        };
        let (Some(moving), Some(other)) = (bodies.get(mover), bodies.get(target)) else {
            return false;
        };
        let (Some(own_bounds), Some(other_bounds)) = (moving.world_bounds(), other.world_bounds()) else {
            return false;
        };

        let velocity = moving.velocity();
        let travel = velocity.magnitude() * self.timestep;
        let Some(ray) = Ray::new(own_bounds.center(), velocity) else {
            return false;
        };

        let lead = own_bounds.extent_along(&ray.direction);
        let Some(hit) = other_bounds.intersect_ray(&ray, travel + lead) else {
            return false;
        };
        let gap = (hit - lead).max(0.0);
        let overshoot = travel - gap - self.penetration_slop;
        if overshoot <= 0.0 {
            return false;
        }

        let Some(body) = bodies.get_mut(mover) else {
            return false;
        };
        body.transform.position -= ray.direction * overshoot;
        log::debug!("Speculative snap of {mover:?} by {overshoot:.4} toward {target:?}");
        true
    }

    /// EPA result and contact point for a pair that can respond
    fn contact(&self, bodies: &BodyArena<Body>, pair: CollisionPair) -> Option<(Penetration, Vec3)> {
        let (a, b) = (bodies.get(pair.a)?, bodies.get(pair.b)?);
        if a.is_fixed() && b.is_fixed() {
            return None;
        }
        let (collider_a, collider_b) = (a.collider()?, b.collider()?);

        let penetration = self
            .narrow
            .penetration(&collider_a.hull(&a.transform), &collider_b.hull(&b.transform))?;
        if !penetration.is_finite() {
            log::warn!("Skipping non-finite penetration for {:?}/{:?}", pair.a, pair.b);
            return None;
        }

        let normal = penetration.normal;
        let on_a = collider_a
            .shape()
            .support_feature_center(&collider_a.placement(&a.transform), &normal, FEATURE_TOLERANCE);
        let on_b = collider_b
            .shape()
            .support_feature_center(&collider_b.placement(&b.transform), &-normal, FEATURE_TOLERANCE);
        Some((penetration, (on_a + on_b) * 0.5))
    }
}

fn inverse_mass(body: &Body) -> f32 {
    body.rigidbody().map_or(0.0, |rb| rb.inverse_mass())
}

/// The faster non-fixed side of a speculative pair, and its target
fn speculative_mover(bodies: &BodyArena<Body>, pair: CollisionPair) -> Option<(BodyHandle, BodyHandle)> {
    let speed = |handle: BodyHandle| {
        bodies
            .get(handle)
            .filter(|body| !body.is_fixed())
            .map_or(0.0, |body| body.velocity().magnitude_squared())
    };
    let (speed_a, speed_b) = (speed(pair.a), speed(pair.b));
    if speed_a <= 0.0 && speed_b <= 0.0 {
        None
    } else if speed_a >= speed_b {
        Some((pair.a, pair.b))
    } else {
        Some((pair.b, pair.a))
    }
}
