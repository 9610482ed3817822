//! Rigid body state: velocities, force buffers and mass properties
//!
//! Forces are double buffered. `add_force` writes the T1 buffer; at the start
//! of a step T1 is promoted into T0, the integrator consumes T0 and then
//! clears it, so anything added between steps acts on exactly one step.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::foundation::math::{is_finite, Mat3, Quat, Vec3};
use crate::physics::collision::BoundingKind;

bitflags! {
    /// Behaviour switches of a rigid body
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RigidBodyFlags: u8 {
        /// Infinite mass; never moved by forces, impulses or the solver
        const FIXED = 1 << 0;
        /// Gravity applies while airborne
        const GRAVITY = 1 << 1;
        /// Rotation is frozen; torque and angular impulses are ignored
        const ANGULAR_LOCKED = 1 << 2;
        /// Standing on something this step (set by the ground probe)
        const GROUNDED = 1 << 3;
    }
}

/// Construction parameters for a [`RigidBody`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyDesc {
    /// Mass in kilograms; ignored for fixed bodies
    pub mass: f32,
    /// Infinite-mass body
    pub fixed: bool,
    /// Whether gravity acts on the body
    pub gravity: bool,
    /// Freeze rotation
    pub angular_locked: bool,
    /// Friction deceleration applied against the direction of travel
    pub friction: f32,
    /// Initial linear velocity
    pub velocity: Vec3,
    /// Initial angular velocity
    pub angular_velocity: Vec3,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            mass: 1.0,
            fixed: false,
            gravity: true,
            angular_locked: false,
            friction: 0.0,
            velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
        }
    }
}

impl RigidBodyDesc {
    /// Movable body of the given mass
    pub fn dynamic(mass: f32) -> Self {
        Self { mass, ..Default::default() }
    }

    /// Immovable body
    pub fn fixed() -> Self {
        Self { fixed: true, gravity: false, ..Default::default() }
    }

    /// Builder-style initial velocity
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Builder-style friction coefficient
    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Builder-style gravity toggle
    #[must_use]
    pub fn with_gravity(mut self, gravity: bool) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder-style rotation lock
    #[must_use]
    pub fn with_angular_lock(mut self, locked: bool) -> Self {
        self.angular_locked = locked;
        self
    }
}

/// Simulated body state
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    /// Linear velocity
    pub velocity: Vec3,
    /// Angular velocity (radians per second, world space)
    pub angular_velocity: Vec3,
    /// Friction deceleration
    pub friction: f32,

    flags: RigidBodyFlags,
    inverse_mass: f32,
    inverse_inertia: Vec3,

    /// Forces consumed by the step in progress
    force_t0: Vec3,
    torque_t0: Vec3,
    /// Forces queued for the next step
    force_t1: Vec3,
    torque_t1: Vec3,
}

impl RigidBody {
    /// Build a body from its description and the collider's world size
    ///
    /// `half_extents` are the scaled half extents of the collider's bounding
    /// volume and drive the inertia tensor.
    pub fn new(desc: &RigidBodyDesc, kind: BoundingKind, half_extents: Vec3) -> PhysicsResult<Self> {
        let inverse_mass = if desc.fixed {
            0.0
        } else {
            if !(desc.mass.is_finite() && desc.mass > 0.0) {
                return Err(PhysicsError::InvalidMass(desc.mass));
            }
            1.0 / desc.mass
        };
        if !is_finite(&desc.velocity) || !is_finite(&desc.angular_velocity) || !desc.friction.is_finite() {
            return Err(PhysicsError::InvalidImpulse);
        }

        let mut flags = RigidBodyFlags::empty();
        flags.set(RigidBodyFlags::FIXED, desc.fixed);
        flags.set(RigidBodyFlags::GRAVITY, desc.gravity && !desc.fixed);
        flags.set(RigidBodyFlags::ANGULAR_LOCKED, desc.angular_locked);

        let (velocity, angular_velocity) = if desc.fixed {
            (Vec3::zeros(), Vec3::zeros())
        } else {
            (desc.velocity, desc.angular_velocity)
        };

        Ok(Self {
            velocity,
            angular_velocity,
            friction: desc.friction.max(0.0),
            flags,
            inverse_mass,
            inverse_inertia: inverse_inertia_diagonal(kind, half_extents, inverse_mass),
            force_t0: Vec3::zeros(),
            torque_t0: Vec3::zeros(),
            force_t1: Vec3::zeros(),
            torque_t1: Vec3::zeros(),
        })
    }

    /// Current flags
    pub fn flags(&self) -> RigidBodyFlags {
        self.flags
    }

    /// Infinite-mass body
    pub fn is_fixed(&self) -> bool {
        self.flags.contains(RigidBodyFlags::FIXED)
    }

    /// Standing on something this step
    pub fn is_grounded(&self) -> bool {
        self.flags.contains(RigidBodyFlags::GROUNDED)
    }

    /// Gravity applies to this body
    pub fn uses_gravity(&self) -> bool {
        self.flags.contains(RigidBodyFlags::GRAVITY)
    }

    /// Rotation is frozen
    pub fn is_angular_locked(&self) -> bool {
        self.flags.contains(RigidBodyFlags::ANGULAR_LOCKED)
    }

    /// Toggle gravity; ignored for fixed bodies
    pub fn set_gravity(&mut self, enabled: bool) {
        if !self.is_fixed() {
            self.flags.set(RigidBodyFlags::GRAVITY, enabled);
        }
    }

    /// Toggle the rotation lock
    pub fn set_angular_locked(&mut self, locked: bool) {
        self.flags.set(RigidBodyFlags::ANGULAR_LOCKED, locked);
    }

    pub(crate) fn set_grounded(&mut self, grounded: bool) {
        self.flags.set(RigidBodyFlags::GROUNDED, grounded);
    }

    /// `1 / mass`, zero for fixed bodies
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Mass, infinite for fixed bodies
    pub fn mass(&self) -> f32 {
        if self.inverse_mass > 0.0 {
            1.0 / self.inverse_mass
        } else {
            f32::INFINITY
        }
    }

    /// Body-space inverse inertia (diagonal)
    pub fn local_inverse_inertia(&self) -> Vec3 {
        self.inverse_inertia
    }

    /// World-space inverse inertia `R * diag * R^T`; zero when rotation is frozen
    pub fn world_inverse_inertia(&self, rotation: &Quat) -> Mat3 {
        if self.is_fixed() || self.is_angular_locked() {
            return Mat3::zeros();
        }
        let r = rotation.to_rotation_matrix();
        r.matrix() * Mat3::from_diagonal(&self.inverse_inertia) * r.matrix().transpose()
    }

    /// Queue a force for the next step
    pub fn add_force(&mut self, force: Vec3) -> PhysicsResult<()> {
        if !is_finite(&force) {
            return Err(PhysicsError::InvalidImpulse);
        }
        if !self.is_fixed() {
            self.force_t1 += force;
        }
        Ok(())
    }

    /// Queue a torque for the next step
    pub fn add_torque(&mut self, torque: Vec3) -> PhysicsResult<()> {
        if !is_finite(&torque) {
            return Err(PhysicsError::InvalidImpulse);
        }
        if !self.is_fixed() && !self.is_angular_locked() {
            self.torque_t1 += torque;
        }
        Ok(())
    }

    /// Change velocity immediately by `impulse / mass`
    pub fn add_impulse(&mut self, impulse: Vec3) -> PhysicsResult<()> {
        if !is_finite(&impulse) {
            return Err(PhysicsError::InvalidImpulse);
        }
        self.apply_linear_impulse(impulse);
        Ok(())
    }

    /// Force queued for the next step
    pub fn pending_force(&self) -> Vec3 {
        self.force_t1
    }

    /// Torque queued for the next step
    pub fn pending_torque(&self) -> Vec3 {
        self.torque_t1
    }

    pub(crate) fn apply_linear_impulse(&mut self, impulse: Vec3) {
        self.velocity += impulse * self.inverse_mass;
    }

    pub(crate) fn apply_angular_impulse(&mut self, world_inverse_inertia: &Mat3, angular_impulse: Vec3) {
        if !self.is_fixed() && !self.is_angular_locked() {
            self.angular_velocity += world_inverse_inertia * angular_impulse;
        }
    }

    /// Move the T1 buffers into T0 for the step about to run
    pub(crate) fn promote_forces(&mut self) {
        self.force_t0 = self.force_t1;
        self.torque_t0 = self.torque_t1;
        self.force_t1 = Vec3::zeros();
        self.torque_t1 = Vec3::zeros();
    }

    /// Force acting during the step in progress
    pub(crate) fn step_force(&self) -> Vec3 {
        self.force_t0
    }

    /// Torque acting during the step in progress
    pub(crate) fn step_torque(&self) -> Vec3 {
        self.torque_t0
    }

    pub(crate) fn clear_step_forces(&mut self) {
        self.force_t0 = Vec3::zeros();
        self.torque_t0 = Vec3::zeros();
    }
}

/// Diagonal body-space inverse inertia for a solid box or sphere
///
/// Degenerate (zero-size) axes get zero inverse inertia.
pub fn inverse_inertia_diagonal(kind: BoundingKind, half_extents: Vec3, inverse_mass: f32) -> Vec3 {
    let safe = |numerator: f32, denominator: f32| {
        if denominator > f32::EPSILON {
            numerator / denominator
        } else {
            0.0
        }
    };

    match kind {
        BoundingKind::Box => {
            let size = half_extents * 2.0;
            let (w, h, d) = (size.x, size.y, size.z);
            Vec3::new(
                safe(12.0 * inverse_mass, h * h + d * d),
                safe(12.0 * inverse_mass, w * w + d * d),
                safe(12.0 * inverse_mass, w * w + h * h),
            )
        }
        BoundingKind::Sphere => {
            let radius = half_extents.max();
            let value = safe(2.5 * inverse_mass, radius * radius);
            Vec3::new(value, value, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(desc: &RigidBodyDesc) -> PhysicsResult<RigidBody> {
        RigidBody::new(desc, BoundingKind::Box, Vec3::new(0.5, 0.5, 0.5))
    }

    #[test]
    fn test_invalid_mass_rejected() {
        for mass in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(unit_box(&RigidBodyDesc::dynamic(mass)), Err(PhysicsError::InvalidMass(_))));
        }
    }

    #[test]
    fn test_fixed_body_has_zero_inverse_mass_and_ignores_forces() {
        let mut body = unit_box(&RigidBodyDesc::fixed()).unwrap();
        assert_eq!(body.inverse_mass(), 0.0);
        assert!(body.mass().is_infinite());

        body.add_force(Vec3::new(100.0, 0.0, 0.0)).unwrap();
        body.add_impulse(Vec3::new(100.0, 0.0, 0.0)).unwrap();
        assert_eq!(body.pending_force(), Vec3::zeros());
        assert_eq!(body.velocity, Vec3::zeros());
        assert!(!body.uses_gravity());
    }

    #[test]
    fn test_nan_impulse_rejected() {
        let mut body = unit_box(&RigidBodyDesc::dynamic(1.0)).unwrap();
        assert!(matches!(
            body.add_impulse(Vec3::new(f32::NAN, 0.0, 0.0)),
            Err(PhysicsError::InvalidImpulse)
        ));
        assert!(body.add_force(Vec3::new(0.0, f32::INFINITY, 0.0)).is_err());
    }

    #[test]
    fn test_force_buffers_promote_once() {
        let mut body = unit_box(&RigidBodyDesc::dynamic(2.0)).unwrap();
        body.add_force(Vec3::new(4.0, 0.0, 0.0)).unwrap();

        body.promote_forces();
        assert_eq!(body.step_force(), Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(body.pending_force(), Vec3::zeros());

        body.clear_step_forces();
        body.promote_forces();
        assert_eq!(body.step_force(), Vec3::zeros());
    }

    #[test]
    fn test_box_and_sphere_inertia() {
        let cube = inverse_inertia_diagonal(BoundingKind::Box, Vec3::new(0.5, 0.5, 0.5), 1.0);
        assert_relative_eq!(cube, Vec3::new(6.0, 6.0, 6.0));

        let ball = inverse_inertia_diagonal(BoundingKind::Sphere, Vec3::new(1.0, 1.0, 1.0), 0.5);
        assert_relative_eq!(ball, Vec3::new(1.25, 1.25, 1.25));
    }

    #[test]
    fn test_world_inertia_is_zero_when_locked() {
        let body = unit_box(&RigidBodyDesc::dynamic(1.0).with_angular_lock(true)).unwrap();
        assert_eq!(body.world_inverse_inertia(&Quat::identity()), Mat3::zeros());
    }
}
