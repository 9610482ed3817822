//! Error types for body construction and configuration
//!
//! Only setup-time mistakes are errors. Numerical trouble inside a step
//! (iteration caps, degenerate geometry, out-of-bounds positions) is logged
//! and degraded instead.

use crate::config::ConfigError;
use crate::foundation::collections::BodyHandle;

/// Errors raised while configuring the physics world or its bodies
#[derive(thiserror::Error, Debug)]
pub enum PhysicsError {
    /// Mass was zero, negative or not finite
    #[error("invalid mass {0}: mass must be finite and greater than zero")]
    InvalidMass(f32),

    /// Bounding volume extents or radius were negative or not finite
    #[error("invalid bounding volume: {0}")]
    InvalidBoundingVolume(String),

    /// A convex shape needs at least one vertex
    #[error("convex shape has no vertices")]
    EmptyShape,

    /// A component depends on another that the body does not have
    #[error("body {handle:?} is missing required component: {component}")]
    MissingComponent {
        /// The offending body
        handle: BodyHandle,
        /// Name of the component that is absent
        component: &'static str,
    },

    /// The handle refers to a body that has been destroyed
    #[error("stale body handle {0:?}")]
    StaleHandle(BodyHandle),

    /// A force, torque or impulse contained NaN or infinity
    #[error("force or impulse must be finite")]
    InvalidImpulse,

    /// Configuration failed to load or validate
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the crate
pub type PhysicsResult<T> = Result<T, PhysicsError>;
