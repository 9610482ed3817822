//! Core collision detection system
//!
//! Based on Game Engine Architecture 3rd Edition, Chapter 13:
//! "The collision detection system is typically split into two phases:
//! broad-phase and narrow-phase."
//!
//! Every candidate pair is in one of three states each step:
//! - **Separated**: nothing to do (an `Exit` fires if it was colliding)
//! - **Speculative**: not touching, but the faster body's sweep over the next
//!   step reaches the other one
//! - **Colliding**: the hulls overlap now (`Enter` once, then `Continue`)
//!
//! The persistent set carries colliding pairs across steps so transitions can
//! be reported. Speculative status never survives the step that produced it.
//! Narrow-phase classification runs in parallel over an immutable snapshot;
//! the state tables are only touched afterwards, on the calling thread.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;

use crate::config::PhysicsConfig;
use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{Transform, Vec3};
use crate::physics::collision::{BoundingVolume, ConvexShape, NarrowPhase, Swept, Translated, WorldHull};
use crate::physics::collision_layers::{CollisionLayers, Layer};
use crate::physics::events::{CollisionEvent, CollisionListener, CollisionPhase};
use crate::spatial::SpatialQuery;

/// Unordered pair of bodies, stored with the lower handle first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollisionPair {
    /// Lower handle
    pub a: BodyHandle,
    /// Higher handle
    pub b: BodyHandle,
}

impl CollisionPair {
    /// Create a new collision pair (always stores the smaller handle first for consistency)
    pub fn new(a: BodyHandle, b: BodyHandle) -> Self {
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }

    /// True when the pair names `handle`
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.a == handle || self.b == handle
    }

    fn event(self, phase: CollisionPhase) -> CollisionEvent {
        CollisionEvent { phase, a: self.a, b: self.b }
    }
}

/// Result of classifying one candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairState {
    /// Not touching and not about to
    Separated,
    /// Swept path reaches the other body within one step
    Speculative,
    /// Hulls overlap
    Colliding,
}

/// Per-pair record of which recent steps had contact (bit 0 = latest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactHistory {
    bits: u64,
    last_step: u64,
}

impl ContactHistory {
    /// Longest window the history can answer for
    pub const CAPACITY: u32 = u64::BITS;

    fn shifted(&self, step: u64) -> u64 {
        let gap = step.saturating_sub(self.last_step);
        if gap >= u64::from(Self::CAPACITY) {
            0
        } else {
            self.bits << gap
        }
    }

    /// Mark `step` as a contact step
    pub fn record(&mut self, step: u64) {
        self.bits = self.shifted(step) | 1;
        self.last_step = step;
    }

    /// Contact steps among the `window` steps ending at `step`
    pub fn count(&self, step: u64, window: u32) -> u32 {
        let window = window.min(Self::CAPACITY);
        let mask = if window == Self::CAPACITY { u64::MAX } else { (1_u64 << window) - 1 };
        (self.shifted(step) & mask).count_ones()
    }
}

/// Read-only view of one collider for a detection pass
#[derive(Debug, Clone)]
pub struct ColliderProxy<'a> {
    /// Owning body
    pub handle: BodyHandle,
    /// Model-space hull
    pub shape: &'a ConvexShape,
    /// Body position the spatial index files this collider under
    pub anchor: Vec3,
    /// Collider placement, offset included
    pub transform: Transform,
    /// World bounding volume
    pub bounds: BoundingVolume,
    /// Collision layer
    pub layer: Layer,
    /// Linear velocity (zero for bodies without dynamics)
    pub velocity: Vec3,
    /// Fixed or without dynamics
    pub fixed: bool,
}

impl ColliderProxy<'_> {
    /// Support-mapped hull at the current placement
    pub fn hull(&self) -> WorldHull<'_> {
        WorldHull::new(self.shape, self.transform)
    }

    /// Distance from the indexed anchor to the far side of the bounding volume
    pub fn reach(&self) -> f32 {
        (self.bounds.center() - self.anchor).magnitude() + self.bounds.bounding_radius()
    }
}

/// The faster-moving non-fixed side of a pair, followed by the other side
pub fn mover_of<'p, 'a>(
    a: &'p ColliderProxy<'a>,
    b: &'p ColliderProxy<'a>,
) -> Option<(&'p ColliderProxy<'a>, &'p ColliderProxy<'a>)> {
    let speed = |p: &ColliderProxy<'_>| if p.fixed { 0.0 } else { p.velocity.magnitude_squared() };
    let (speed_a, speed_b) = (speed(a), speed(b));
    if speed_a <= 0.0 && speed_b <= 0.0 {
        None
    } else if speed_a >= speed_b {
        Some((a, b))
    } else {
        Some((b, a))
    }
}

/// Pair state machine, layer matrix and contact history
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    layers: CollisionLayers,
    narrow: NarrowPhase,
    timestep: f32,
    speculation_enabled: bool,
    speculative_margin: f32,
    window: u32,

    /// Colliding pairs carried across steps
    persistent: BTreeSet<CollisionPair>,
    /// Pairs found colliding this step
    frame: BTreeSet<CollisionPair>,
    /// Pairs found speculative this step
    speculative: BTreeSet<CollisionPair>,
    history: HashMap<CollisionPair, ContactHistory>,
    step: u64,
}

impl CollisionDetector {
    /// Detector with the default layer matrix
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            layers: CollisionLayers::default(),
            narrow: NarrowPhase::from_config(config),
            timestep: config.fixed_timestep,
            speculation_enabled: config.speculation_enabled,
            speculative_margin: config.speculative_margin,
            window: config.steps_per_second().min(ContactHistory::CAPACITY),
            persistent: BTreeSet::new(),
            frame: BTreeSet::new(),
            speculative: BTreeSet::new(),
            history: HashMap::new(),
            step: 0,
        }
    }

    /// Layer matrix
    pub fn layers(&self) -> &CollisionLayers {
        &self.layers
    }

    /// Enable or disable testing between two layers
    ///
    /// Returns true when the matrix changed. Pairs on a disabled combination
    /// get their `Exit` on the next detection pass.
    pub fn set_layer_collision_mask(&mut self, a: Layer, b: Layer, enabled: bool) -> bool {
        let changed = self.layers.set(a, b, enabled);
        if changed {
            log::debug!("Layer mask {a:?}/{b:?} set to {enabled}");
        }
        changed
    }

    /// Narrow-phase settings in use
    pub fn narrow_phase(&self) -> &NarrowPhase {
        &self.narrow
    }

    /// Pairs colliding as of the last detection pass
    pub fn persistent_pairs(&self) -> &BTreeSet<CollisionPair> {
        &self.persistent
    }

    /// Pairs found colliding during the last detection pass
    pub fn frame_pairs(&self) -> &BTreeSet<CollisionPair> {
        &self.frame
    }

    /// Pairs found speculative during the current step
    pub fn speculative_pairs(&self) -> &BTreeSet<CollisionPair> {
        &self.speculative
    }

    /// True when the pair is in the persistent colliding set
    pub fn is_colliding(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.persistent.contains(&CollisionPair::new(a, b))
    }

    /// True when `handle` is in any colliding pair
    pub fn is_collided(&self, handle: BodyHandle) -> bool {
        self.persistent.iter().any(|pair| pair.contains(handle))
    }

    /// True when the pair was classified speculative this step
    pub fn is_speculative(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.speculative.contains(&CollisionPair::new(a, b))
    }

    /// Number of detection passes run so far
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Steps with contact among the last `fps` steps
    pub fn recent_contacts(&self, pair: &CollisionPair) -> u32 {
        self.history
            .get(pair)
            .map_or(0, |history| history.count(self.step, self.window))
    }

    /// Response damping for resting contact: `1 - N / fps`, clamped to `[0, 1]`
    pub fn stacking_factor(&self, pair: &CollisionPair) -> f32 {
        if self.window == 0 {
            return 1.0;
        }
        (1.0 - self.recent_contacts(pair) as f32 / self.window as f32).clamp(0.0, 1.0)
    }

    /// Distance a body may cover during one step, scaled by the margin
    pub fn sweep_of(&self, proxy: &ColliderProxy<'_>) -> Vec3 {
        if proxy.fixed {
            Vec3::zeros()
        } else {
            proxy.velocity * self.timestep * self.speculative_margin
        }
    }

    /// Bodies resting on something: the shape nudged along `down` still
    /// overlaps a persistent partner, and the contact normal points down
    pub fn grounded_bodies(&self, proxies: &[ColliderProxy<'_>], down: Vec3, probe_distance: f32) -> BTreeSet<BodyHandle> {
        let lookup = index_by_handle(proxies);
        let mut grounded = BTreeSet::new();

        for pair in &self.persistent {
            let (Some(&ia), Some(&ib)) = (lookup.get(&pair.a), lookup.get(&pair.b)) else {
                continue;
            };
            for (me, other) in [(ia, ib), (ib, ia)] {
                let body = &proxies[me];
                if body.fixed || grounded.contains(&body.handle) {
                    continue;
                }
                let probe = Translated { inner: body.hull(), offset: down * probe_distance };
                let supported = self
                    .narrow
                    .penetration(&probe, &proxies[other].hull())
                    .is_some_and(|hit| hit.normal.dot(&down) > 0.5);
                if supported {
                    grounded.insert(body.handle);
                }
            }
        }

        grounded
    }

    /// Broad phase: pairs on enabled layer combinations whose cells are close
    /// enough for their volumes (and sweeps) to meet
    pub fn candidate_pairs(&self, proxies: &[ColliderProxy<'_>], index: &dyn SpatialQuery) -> Vec<CollisionPair> {
        let lookup = index_by_handle(proxies);
        let mut by_layer: BTreeMap<Layer, Vec<usize>> = BTreeMap::new();
        for (i, proxy) in proxies.iter().enumerate() {
            by_layer.entry(proxy.layer).or_default().push(i);
        }

        let reach = |p: &ColliderProxy<'_>| p.reach() + self.sweep_of(p).magnitude();
        let max_reach = proxies.iter().map(reach).fold(0.0_f32, f32::max);

        let mut pairs = BTreeSet::new();
        for (layer_a, layer_b) in self.layers.enabled_pairs() {
            let (Some(members), true) = (by_layer.get(&layer_a), by_layer.contains_key(&layer_b)) else {
                continue;
            };
            for &i in members {
                let proxy = &proxies[i];
                let radius = reach(proxy) + max_reach;
                for other in index.query_range(proxy.anchor, radius) {
                    if other == proxy.handle {
                        continue;
                    }
                    let Some(&j) = lookup.get(&other) else {
                        continue;
                    };
                    if proxies[j].layer == layer_b {
                        pairs.insert(CollisionPair::new(proxy.handle, other));
                    }
                }
            }
        }

        pairs.into_iter().collect()
    }

    /// Narrow phase for a single pair
    pub fn classify(&self, a: &ColliderProxy<'_>, b: &ColliderProxy<'_>) -> PairState {
        if a.bounds.intersects(&b.bounds) && self.narrow.intersects(&a.hull(), &b.hull()) {
            return PairState::Colliding;
        }
        if !self.speculation_enabled {
            return PairState::Separated;
        }

        let Some((mover, other)) = mover_of(a, b) else {
            return PairState::Separated;
        };
        let sweep = self.sweep_of(mover);
        if !mover.bounds.swept(sweep).intersects(&other.bounds) {
            return PairState::Separated;
        }

        let swept = Swept { inner: mover.hull(), sweep };
        if self.narrow.intersects(&swept, &other.hull()) {
            PairState::Speculative
        } else {
            PairState::Separated
        }
    }

    /// Run one detection pass and update the pair tables
    ///
    /// Events are dispatched to `listener` in canonical pair order and also
    /// returned.
    pub fn detect(
        &mut self,
        proxies: &[ColliderProxy<'_>],
        index: &dyn SpatialQuery,
        listener: &mut dyn CollisionListener,
    ) -> Vec<CollisionEvent> {
        self.step += 1;
        self.frame.clear();
        self.speculative.clear();

        let lookup = index_by_handle(proxies);
        let candidates = self.candidate_pairs(proxies, index);

        let detector = &*self;
        let states: Vec<(CollisionPair, PairState)> = candidates
            .par_iter()
            .filter_map(|pair| {
                let a = &proxies[*lookup.get(&pair.a)?];
                let b = &proxies[*lookup.get(&pair.b)?];
                Some((*pair, detector.classify(a, b)))
            })
            .collect();

        let mut events = Vec::new();
        let mut examined = BTreeSet::new();

        for (pair, state) in states {
            examined.insert(pair);
            log::trace!("Pair {:?}/{:?} classified {state:?}", pair.a, pair.b);

            match state {
                PairState::Colliding => {
                    let phase = if self.persistent.insert(pair) {
                        log::debug!("Collision enter {:?}/{:?}", pair.a, pair.b);
                        CollisionPhase::Enter
                    } else {
                        CollisionPhase::Continue
                    };
                    events.push(pair.event(phase));
                    self.frame.insert(pair);
                    self.history.entry(pair).or_default().record(self.step);
                }
                PairState::Speculative => {
                    self.speculative.insert(pair);
                    if self.persistent.remove(&pair) {
                        events.push(pair.event(CollisionPhase::Exit));
                    }
                }
                PairState::Separated => {
                    if self.persistent.remove(&pair) {
                        events.push(pair.event(CollisionPhase::Exit));
                    }
                }
            }
        }

        // Colliding pairs that drifted out of the broad phase (or off an enabled layer)
        let dropped: Vec<CollisionPair> = self.persistent.difference(&examined).copied().collect();
        for pair in dropped {
            self.persistent.remove(&pair);
            events.push(pair.event(CollisionPhase::Exit));
        }

        let step = self.step;
        self.history
            .retain(|_, history| step.saturating_sub(history.last_step) < u64::from(ContactHistory::CAPACITY));

        for event in &events {
            if event.phase == CollisionPhase::Exit {
                log::debug!("Collision exit {:?}/{:?}", event.a, event.b);
            }
            listener.dispatch(event);
        }

        events
    }

    /// Drop speculative status at the end of a step
    pub fn clear_speculative(&mut self) {
        self.speculative.clear();
    }

    /// Remove every record naming `handle`; colliding pairs produce `Exit`
    pub fn forget(&mut self, handle: BodyHandle) -> Vec<CollisionEvent> {
        let exits: Vec<CollisionEvent> = self
            .persistent
            .iter()
            .filter(|pair| pair.contains(handle))
            .map(|pair| pair.event(CollisionPhase::Exit))
            .collect();

        self.persistent.retain(|pair| !pair.contains(handle));
        self.frame.retain(|pair| !pair.contains(handle));
        self.speculative.retain(|pair| !pair.contains(handle));
        self.history.retain(|pair, _| !pair.contains(handle));
        exits
    }

    /// Clear all collision data
    pub fn clear(&mut self) {
        self.persistent.clear();
        self.frame.clear();
        self.speculative.clear();
        self.history.clear();
    }
}

fn index_by_handle(proxies: &[ColliderProxy<'_>]) -> HashMap<BodyHandle, usize> {
    proxies.iter().enumerate().map(|(i, p)| (p.handle, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::BodyArena;
    use crate::physics::collision::{BoundingKind, StockShapes};
    use crate::spatial::{Octree, OctreeConfig};

    struct Fixture {
        shape: ConvexShape,
        handles: Vec<BodyHandle>,
    }

    impl Fixture {
        fn new(count: usize) -> Self {
            let mut arena: BodyArena<()> = BodyArena::with_key();
            Self {
                shape: StockShapes::new(16).unit_box(),
                handles: (0..count).map(|_| arena.insert(())).collect(),
            }
        }

        fn proxy(&self, i: usize, position: Vec3, velocity: Vec3, fixed: bool) -> ColliderProxy<'_> {
            let transform = Transform::from_position(position);
            ColliderProxy {
                handle: self.handles[i],
                shape: &self.shape,
                anchor: position,
                transform,
                bounds: self.shape.local_bounds(BoundingKind::Box).unwrap().transformed(&transform),
                layer: Layer::DEFAULT,
                velocity,
                fixed,
            }
        }
    }

    fn index_of(proxies: &[ColliderProxy<'_>]) -> Octree {
        let mut octree = Octree::new(OctreeConfig::default());
        for p in proxies {
            octree.insert(p.handle, p.anchor);
        }
        octree
    }

    #[test]
    fn test_pair_is_canonical() {
        let fixture = Fixture::new(2);
        let (a, b) = (fixture.handles[0], fixture.handles[1]);
        assert_eq!(CollisionPair::new(a, b), CollisionPair::new(b, a));
    }

    #[test]
    fn test_static_overlap_enters_once_then_continues() {
        let fixture = Fixture::new(2);
        let proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.0, 0.9, 0.0), Vec3::zeros(), true),
        ];
        let index = index_of(&proxies);
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());

        let mut all = Vec::new();
        for _ in 0..10 {
            all.extend(detector.detect(&proxies, &index, &mut ()));
        }

        assert_eq!(all.len(), 10);
        assert_eq!(all[0].phase, CollisionPhase::Enter);
        assert!(all[1..].iter().all(|e| e.phase == CollisionPhase::Continue));
    }

    #[test]
    fn test_exit_fires_once_when_pair_separates() {
        let fixture = Fixture::new(2);
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());

        let touching = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.9, 0.0, 0.0), Vec3::zeros(), true),
        ];
        detector.detect(&touching, &index_of(&touching), &mut ());

        let apart = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(3.0, 0.0, 0.0), Vec3::zeros(), true),
        ];
        let first = detector.detect(&apart, &index_of(&apart), &mut ());
        let second = detector.detect(&apart, &index_of(&apart), &mut ());

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].phase, CollisionPhase::Exit);
        assert!(second.is_empty());
    }

    #[test]
    fn test_fast_body_is_speculative_before_contact() {
        let fixture = Fixture::new(2);
        let proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(1.5, 0.0, 0.0), Vec3::new(-40.0, 0.0, 0.0), false),
        ];
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());
        let events = detector.detect(&proxies, &index_of(&proxies), &mut ());

        assert!(events.is_empty());
        assert!(detector.is_speculative(fixture.handles[0], fixture.handles[1]));
        assert!(!detector.is_colliding(fixture.handles[0], fixture.handles[1]));
    }

    #[test]
    fn test_layer_filtering() {
        let fixture = Fixture::new(2);
        let mut proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.5, 0.0, 0.0), Vec3::zeros(), true),
        ];
        proxies[0].layer = Layer::PLAYER;
        proxies[1].layer = Layer::ENVIRONMENT;
        let index = index_of(&proxies);
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());

        assert!(detector.detect(&proxies, &index, &mut ()).is_empty());

        assert!(detector.set_layer_collision_mask(Layer::ENVIRONMENT, Layer::PLAYER, true));
        assert!(!detector.set_layer_collision_mask(Layer::PLAYER, Layer::ENVIRONMENT, true));
        assert_eq!(detector.detect(&proxies, &index, &mut ()).len(), 1);

        assert!(detector.set_layer_collision_mask(Layer::PLAYER, Layer::ENVIRONMENT, false));
        let events = detector.detect(&proxies, &index, &mut ());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, CollisionPhase::Exit);
    }

    #[test]
    fn test_is_collided_tracks_any_partner() {
        let fixture = Fixture::new(3);
        let proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.9, 0.0, 0.0), Vec3::zeros(), true),
            fixture.proxy(2, Vec3::new(5.0, 0.0, 0.0), Vec3::zeros(), true),
        ];
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());
        assert!(!detector.is_collided(fixture.handles[0]));

        detector.detect(&proxies, &index_of(&proxies), &mut ());

        assert!(detector.is_collided(fixture.handles[0]));
        assert!(detector.is_collided(fixture.handles[1]));
        assert!(!detector.is_collided(fixture.handles[2]));

        detector.forget(fixture.handles[1]);
        assert!(!detector.is_collided(fixture.handles[0]));
    }

    #[test]
    fn test_contact_history_window() {
        let mut history = ContactHistory::default();
        for step in 1..=10 {
            history.record(step);
        }
        assert_eq!(history.count(10, 50), 10);
        assert_eq!(history.count(10, 4), 4);
        assert_eq!(history.count(15, 8), 3);
        assert_eq!(history.count(200, 50), 0);
    }

    #[test]
    fn test_stacking_factor_is_clamped() {
        let fixture = Fixture::new(2);
        let proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.0, 0.9, 0.0), Vec3::zeros(), true),
        ];
        let index = index_of(&proxies);
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());
        let pair = CollisionPair::new(fixture.handles[0], fixture.handles[1]);

        for _ in 0..80 {
            detector.detect(&proxies, &index, &mut ());
        }

        assert_eq!(detector.recent_contacts(&pair), 50);
        assert_eq!(detector.stacking_factor(&pair), 0.0);
    }

    #[test]
    fn test_forget_reports_exit() {
        let fixture = Fixture::new(2);
        let proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.0, 0.9, 0.0), Vec3::zeros(), true),
        ];
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());
        detector.detect(&proxies, &index_of(&proxies), &mut ());

        let exits = detector.forget(fixture.handles[1]);
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].phase, CollisionPhase::Exit);
        assert!(detector.persistent_pairs().is_empty());
    }

    #[test]
    fn test_grounded_probe_detects_support_below() {
        let fixture = Fixture::new(2);
        let proxies = vec![
            fixture.proxy(0, Vec3::zeros(), Vec3::zeros(), true),
            fixture.proxy(1, Vec3::new(0.0, 0.997, 0.0), Vec3::zeros(), false),
        ];
        let mut detector = CollisionDetector::new(&PhysicsConfig::default());
        detector.detect(&proxies, &index_of(&proxies), &mut ());

        let grounded = detector.grounded_bodies(&proxies, Vec3::new(0.0, -1.0, 0.0), 0.01);
        assert!(grounded.contains(&fixture.handles[1]));
        assert!(!grounded.contains(&fixture.handles[0]));
    }
}
