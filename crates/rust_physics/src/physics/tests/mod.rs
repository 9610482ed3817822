//! End-to-end tests that drive a whole [`PhysicsWorld`](crate::physics::PhysicsWorld)


use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{Transform, Vec3};
use crate::physics::{BodyDesc, ColliderDesc, CollisionEvent, CollisionPhase, RigidBodyDesc};

/// Unit box with the given dynamics at `position`
fn cube(position: Vec3, rigidbody: RigidBodyDesc) -> BodyDesc {
    BodyDesc::new(Transform::from_position(position))
        .with_collider(ColliderDesc::cuboid())
        .with_rigidbody(rigidbody)
}

/// Phases of the events naming both bodies, in order
fn phases_between(events: &[CollisionEvent], a: BodyHandle, b: BodyHandle) -> Vec<CollisionPhase> {
    events
        .iter()
        .filter(|e| e.involves(a) && e.involves(b))
        .map(|e| e.phase)
        .collect()
}

/// Enter opens, Continue only while open, Exit closes
fn is_well_formed(phases: &[CollisionPhase]) -> bool {
    let mut open = false;
    phases.iter().all(|phase| match phase {
        CollisionPhase::Enter => !std::mem::replace(&mut open, true),
        CollisionPhase::Continue => open,
        CollisionPhase::Exit => std::mem::replace(&mut open, false),
    })
}
