//! Collision notifications
//!
//! The detector produces one event per pair transition (or per step for
//! `Continue`). Events are handed to a [`CollisionListener`] synchronously
//! during the detection phase and also returned in the step report.

use crate::foundation::collections::BodyHandle;
use crate::physics::collision_layers::Layer;

/// Stage of a contact between two bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollisionPhase {
    /// First step the pair overlaps
    Enter,
    /// Every later step it keeps overlapping
    Continue,
    /// First step it no longer overlaps
    Exit,
}

/// A pair transition reported by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionEvent {
    /// What happened
    pub phase: CollisionPhase,
    /// Lower handle of the pair
    pub a: BodyHandle,
    /// Higher handle of the pair
    pub b: BodyHandle,
}

impl CollisionEvent {
    /// True when the event names `handle`
    pub fn involves(&self, handle: BodyHandle) -> bool {
        self.a == handle || self.b == handle
    }
}

/// A change to the layer collision matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMaskChange {
    /// First layer
    pub a: Layer,
    /// Second layer
    pub b: Layer,
    /// Whether the two layers now collide
    pub enabled: bool,
}

/// Receives collision callbacks; every method defaults to doing nothing
pub trait CollisionListener {
    /// Pair started touching
    fn on_collision_enter(&mut self, _a: BodyHandle, _b: BodyHandle) {}

    /// Pair is still touching
    fn on_collision_continue(&mut self, _a: BodyHandle, _b: BodyHandle) {}

    /// Pair stopped touching (or one side was destroyed)
    fn on_collision_exit(&mut self, _a: BodyHandle, _b: BodyHandle) {}

    /// The layer matrix changed since the previous step
    fn on_layer_mask_change(&mut self, _change: &LayerMaskChange) {}

    /// Route an event to the matching callback
    fn dispatch(&mut self, event: &CollisionEvent) {
        match event.phase {
            CollisionPhase::Enter => self.on_collision_enter(event.a, event.b),
            CollisionPhase::Continue => self.on_collision_continue(event.a, event.b),
            CollisionPhase::Exit => self.on_collision_exit(event.a, event.b),
        }
    }
}

/// Listener that ignores everything
impl CollisionListener for () {}

/// Listener that records every event in order
impl CollisionListener for Vec<CollisionEvent> {
    fn dispatch(&mut self, event: &CollisionEvent) {
        self.push(*event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::BodyArena;

    #[derive(Default)]
    struct Counter {
        enters: u32,
        exits: u32,
        masks: Vec<LayerMaskChange>,
    }

    impl CollisionListener for Counter {
        fn on_collision_enter(&mut self, _a: BodyHandle, _b: BodyHandle) {
            self.enters += 1;
        }

        fn on_collision_exit(&mut self, _a: BodyHandle, _b: BodyHandle) {
            self.exits += 1;
        }

        fn on_layer_mask_change(&mut self, change: &LayerMaskChange) {
            self.masks.push(*change);
        }
    }

    #[test]
    fn test_dispatch_routes_by_phase() {
        let mut arena: BodyArena<()> = BodyArena::with_key();
        let (a, b) = (arena.insert(()), arena.insert(()));
        let mut counter = Counter::default();

        for phase in [CollisionPhase::Enter, CollisionPhase::Continue, CollisionPhase::Exit] {
            counter.dispatch(&CollisionEvent { phase, a, b });
        }

        assert_eq!(counter.enters, 1);
        assert_eq!(counter.exits, 1);
        assert!(counter.masks.is_empty());
    }

    #[test]
    fn test_layer_mask_change_defaults_to_noop() {
        let change = LayerMaskChange { a: Layer::PLAYER, b: Layer::ENEMY, enabled: true };
        let mut log: Vec<CollisionEvent> = Vec::new();
        log.on_layer_mask_change(&change);
        assert!(log.is_empty());

        let mut counter = Counter::default();
        counter.on_layer_mask_change(&change);
        assert_eq!(counter.masks, vec![change]);
    }

    #[test]
    fn test_vec_listener_records() {
        let mut arena: BodyArena<()> = BodyArena::with_key();
        let (a, b) = (arena.insert(()), arena.insert(()));
        let mut log: Vec<CollisionEvent> = Vec::new();

        log.dispatch(&CollisionEvent { phase: CollisionPhase::Enter, a, b });
        assert_eq!(log.len(), 1);
        assert!(log[0].involves(b));
    }
}
