//! Semi-implicit Euler integration of rigid bodies
//!
//! Velocity picks up this step's gravity, forces, friction and drag before
//! the position moves, so a body released from rest already falls on its
//! first step.

use crate::config::PhysicsConfig;
use crate::foundation::math::{Quat, Transform, Vec3};
use crate::physics::rigidbody::RigidBody;

/// Per-step integration settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    /// Gravitational acceleration
    pub gravity: Vec3,
    /// Seconds per step
    pub timestep: f32,
    /// Velocity components below this snap to zero
    pub epsilon: f32,
    /// Airborne drag coefficient
    pub drag_coefficient: f32,
}

impl Integrator {
    /// Read the settings from a physics configuration
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            gravity: config.gravity,
            timestep: config.fixed_timestep,
            epsilon: config.epsilon,
            drag_coefficient: config.drag_coefficient,
        }
    }

    /// Advance one body by one step
    ///
    /// Fixed bodies only have their force buffers cycled.
    pub fn integrate(&self, body: &mut RigidBody, transform: &mut Transform) {
        body.promote_forces();
        if body.is_fixed() {
            body.clear_step_forces();
            return;
        }

        let dt = self.timestep;
        let grounded = body.is_grounded();
        let mut velocity = body.velocity;

        if body.uses_gravity() && !grounded {
            velocity += self.gravity * dt;
        }
        velocity += body.step_force() * body.inverse_mass() * dt;

        if body.friction > 0.0 {
            if let Some(direction) = velocity.try_normalize(f32::EPSILON) {
                let before = velocity;
                velocity -= direction * body.friction * dt;
                velocity = sign_guard(&before, &velocity);
            }
        }

        if !grounded && self.drag_coefficient > 0.0 {
            let before = velocity;
            velocity -= velocity * self.drag_coefficient * dt;
            velocity = sign_guard(&before, &velocity);
        }

        body.velocity = epsilon_guard(&velocity, self.epsilon);
        transform.position += body.velocity * dt;

        if !body.is_angular_locked() {
            let inverse_inertia = body.world_inverse_inertia(&transform.rotation);
            let angular = body.angular_velocity + inverse_inertia * body.step_torque() * dt;
            body.angular_velocity = epsilon_guard(&angular, self.epsilon);

            let spin = Quat::from_scaled_axis(body.angular_velocity * dt);
            transform.rotation = spin * transform.rotation;
            transform.rotation.renormalize();
        }

        body.clear_step_forces();
    }
}

/// Zero every axis whose sign flipped between `before` and `after`
///
/// Friction and drag may slow an axis down to rest but never reverse it.
pub fn sign_guard(before: &Vec3, after: &Vec3) -> Vec3 {
    before.zip_map(after, |b, a| if b * a < 0.0 { 0.0 } else { a })
}

/// Snap components with magnitude below `epsilon` to exactly zero
pub fn epsilon_guard(velocity: &Vec3, epsilon: f32) -> Vec3 {
    velocity.map(|c| if c.abs() < epsilon { 0.0 } else { c })
}
