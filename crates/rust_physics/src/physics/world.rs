//! The physics world: body arena plus the fixed-step pipeline
//!
//! One [`PhysicsWorld`] owns every piece of simulation state (bodies, spatial
//! index, pair tables, stock geometry). Nothing is global; several worlds can
//! run side by side.
//!
//! A step runs strictly in this order:
//! 1. grounded probe over colliding pairs
//! 2. integration
//! 3. spatial index resync
//! 4. collision detection (events dispatched here)
//! 5. constraint solving
//! 6. index resync, speculative status dropped

use std::collections::HashSet;

use rayon::prelude::*;

use crate::config::PhysicsConfig;
use crate::error::{PhysicsError, PhysicsResult};
use crate::foundation::collections::{BodyArena, BodyHandle};
use crate::foundation::math::{Transform, Vec3, DOWN};
use crate::foundation::time::FixedTimestep;
use crate::physics::body::{validate_transform, Body, BodyDesc};
use crate::physics::collision::{Ray, RayHit, StockShapes};
use crate::physics::collision_layers::{CollisionLayers, Layer};
use crate::physics::collision_system::{ColliderProxy, CollisionDetector};
use crate::physics::events::{CollisionEvent, CollisionListener, LayerMaskChange};
use crate::physics::integrator::Integrator;
use crate::physics::rigidbody::{RigidBody, RigidBodyDesc};
use crate::physics::solver::ConstraintSolver;
use crate::spatial::{Octree, OctreeConfig, SpatialQuery};

/// Outcome of one fixed step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Every event dispatched during the step, in order
    pub events: Vec<CollisionEvent>,
    /// Layer matrix changes made since the previous step
    pub layer_mask_changes: Vec<LayerMaskChange>,
    /// Colliding pairs the solver pushed apart
    pub resolved_pairs: usize,
    /// Pairs classified speculative this step
    pub speculative_pairs: usize,
    /// Speculative movers snapped back
    pub snapped: usize,
}

/// Owns all bodies and runs the simulation
pub struct PhysicsWorld {
    config: PhysicsConfig,
    stock: StockShapes,
    bodies: BodyArena<Body>,
    index: Box<dyn SpatialQuery>,
    detector: CollisionDetector,
    integrator: Integrator,
    solver: ConstraintSolver,
    clock: FixedTimestep,
    /// Exit events from destroyed bodies, delivered with the next step
    pending: Vec<CollisionEvent>,
    /// Layer matrix changes, delivered with the next step
    mask_changes: Vec<LayerMaskChange>,
    steps: u64,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.bodies.len())
            .field("indexed", &self.index.len())
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Build a world after validating `config`
    pub fn new(config: PhysicsConfig) -> PhysicsResult<Self> {
        config.validate()?;

        let index = Octree::new(OctreeConfig {
            extent: config.world_extent,
            cell_size: config.cell_size,
        });

        log::info!(
            "Physics world: dt {}s, gravity {:?}, extent {} (cell {})",
            config.fixed_timestep,
            config.gravity,
            config.world_extent,
            config.cell_size
        );

        Ok(Self {
            stock: StockShapes::new(config.sphere_tessellation),
            bodies: BodyArena::with_key(),
            index: Box::new(index),
            detector: CollisionDetector::new(&config),
            integrator: Integrator::from_config(&config),
            solver: ConstraintSolver::from_config(&config),
            clock: FixedTimestep::new(config.fixed_timestep),
            pending: Vec::new(),
            mask_changes: Vec::new(),
            steps: 0,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Shared box and sphere geometry
    pub fn stock_shapes(&self) -> &StockShapes {
        &self.stock
    }

    /// Add a body; validates mass, transform and components
    pub fn create_body(&mut self, desc: BodyDesc) -> PhysicsResult<BodyHandle> {
        let stock = &self.stock;
        let handle = self
            .bodies
            .try_insert_with_key(|handle| Body::from_desc(handle, desc, stock))?;

        let position = self.bodies[handle].transform.position;
        self.index.insert(handle, position);
        log::debug!("Created body {handle:?} at {position:?}");
        Ok(handle)
    }

    /// Give an existing body dynamics; it must already have a collider
    pub fn attach_rigidbody(&mut self, handle: BodyHandle, desc: RigidBodyDesc) -> PhysicsResult<()> {
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::StaleHandle(handle))?;
        let rigidbody = body.build_rigidbody(handle, &desc)?;
        body.rigidbody = Some(rigidbody);
        Ok(())
    }

    /// Remove a body; colliding partners get an `Exit` with the next step
    pub fn destroy_body(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        self.bodies.remove(handle).ok_or(PhysicsError::StaleHandle(handle))?;
        self.index.remove(handle);
        self.pending.extend(self.detector.forget(handle));
        log::debug!("Destroyed body {handle:?}");
        Ok(())
    }

    /// Body by handle
    pub fn body(&self, handle: BodyHandle) -> PhysicsResult<&Body> {
        self.bodies.get(handle).ok_or(PhysicsError::StaleHandle(handle))
    }

    /// Mutable body by handle
    ///
    /// Moving the transform through this reference is picked up by the index
    /// on the next step; use [`set_transform`](Self::set_transform) to have it
    /// validated and reindexed immediately.
    pub fn body_mut(&mut self, handle: BodyHandle) -> PhysicsResult<&mut Body> {
        self.bodies.get_mut(handle).ok_or(PhysicsError::StaleHandle(handle))
    }

    /// World placement of a body
    pub fn transform(&self, handle: BodyHandle) -> PhysicsResult<Transform> {
        self.body(handle).map(|body| body.transform)
    }

    /// Teleport a body
    pub fn set_transform(&mut self, handle: BodyHandle, transform: Transform) -> PhysicsResult<()> {
        validate_transform(&transform)?;
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::StaleHandle(handle))?;
        body.transform = transform;
        body.previous_position = transform.position;
        self.index.update(handle, transform.position);
        Ok(())
    }

    /// Dynamics of a body
    pub fn rigidbody(&self, handle: BodyHandle) -> PhysicsResult<&RigidBody> {
        self.body(handle)?
            .rigidbody()
            .ok_or(PhysicsError::MissingComponent { handle, component: "rigidbody" })
    }

    /// Mutable dynamics of a body
    pub fn rigidbody_mut(&mut self, handle: BodyHandle) -> PhysicsResult<&mut RigidBody> {
        self.body_mut(handle)?
            .rigidbody_mut()
            .ok_or(PhysicsError::MissingComponent { handle, component: "rigidbody" })
    }

    /// Queue a force for the next step
    pub fn add_force(&mut self, handle: BodyHandle, force: Vec3) -> PhysicsResult<()> {
        self.rigidbody_mut(handle)?.add_force(force)
    }

    /// Queue a torque for the next step
    pub fn add_torque(&mut self, handle: BodyHandle, torque: Vec3) -> PhysicsResult<()> {
        self.rigidbody_mut(handle)?.add_torque(torque)
    }

    /// Change a body's velocity immediately
    pub fn add_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> PhysicsResult<()> {
        self.rigidbody_mut(handle)?.add_impulse(impulse)
    }

    /// Move a body's collider to another layer
    pub fn set_layer(&mut self, handle: BodyHandle, layer: Layer) -> PhysicsResult<()> {
        self.body_mut(handle)?
            .collider_mut()
            .ok_or(PhysicsError::MissingComponent { handle, component: "collider" })?
            .set_layer(layer);
        Ok(())
    }

    /// Enable or disable collisions between two layers (symmetric)
    ///
    /// Returns true when the matrix changed; listeners hear about it through
    /// [`CollisionListener::on_layer_mask_change`] at the start of the next step.
    pub fn set_layer_collision_mask(&mut self, a: Layer, b: Layer, enabled: bool) -> bool {
        let changed = self.detector.set_layer_collision_mask(a, b, enabled);
        if changed {
            self.mask_changes.push(LayerMaskChange { a, b, enabled });
        }
        changed
    }

    /// Layer matrix
    pub fn layers(&self) -> &CollisionLayers {
        self.detector.layers()
    }

    /// Pair state tables
    pub fn detector(&self) -> &CollisionDetector {
        &self.detector
    }

    /// True when the two bodies are in contact as of the last step
    pub fn is_colliding(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.detector.is_colliding(a, b)
    }

    /// True when the body touches anything as of the last step
    pub fn is_collided(&self, handle: BodyHandle) -> bool {
        self.detector.is_collided(handle)
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Handles of all live bodies
    pub fn handles(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.bodies.keys()
    }

    /// Steps run so far
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Run one fixed step without a listener
    pub fn step(&mut self) -> StepReport {
        self.step_with(&mut ())
    }

    /// Run as many fixed steps as `frame_time` seconds cover
    pub fn advance(&mut self, frame_time: f32, listener: &mut dyn CollisionListener) -> Vec<StepReport> {
        let steps = self.clock.advance(frame_time);
        let mut reports = Vec::with_capacity(steps as usize);
        for _ in 0..steps {
            reports.push(self.step_with(listener));
        }
        reports
    }

    /// Fraction of a fixed step left over after [`advance`](Self::advance)
    pub fn interpolation_alpha(&self) -> f32 {
        self.clock.alpha()
    }

    /// Run one fixed step, dispatching collision events to `listener`
    pub fn step_with(&mut self, listener: &mut dyn CollisionListener) -> StepReport {
        self.steps += 1;
        let mut report = StepReport::default();

        for change in self.mask_changes.drain(..) {
            listener.on_layer_mask_change(&change);
            report.layer_mask_changes.push(change);
        }
        for event in self.pending.drain(..) {
            listener.dispatch(&event);
            report.events.push(event);
        }

        self.update_grounded();
        self.integrate();
        self.resync_index();

        {
            let proxies: Vec<ColliderProxy<'_>> =
                self.bodies.iter().filter_map(|(handle, body)| body.proxy(handle)).collect();
            let events = self.detector.detect(&proxies, &*self.index, listener);
            report.events.extend(events);
        }
        report.speculative_pairs = self.detector.speculative_pairs().len();

        let solved = self.solver.solve(&mut self.bodies, &self.detector);
        report.resolved_pairs = solved.resolved;
        report.snapped = solved.snapped;

        self.resync_index();
        self.detector.clear_speculative();
        report
    }

    fn update_grounded(&mut self) {
        let down = self.config.gravity.try_normalize(f32::EPSILON).unwrap_or(DOWN);
        let grounded = {
            let proxies: Vec<ColliderProxy<'_>> =
                self.bodies.iter().filter_map(|(handle, body)| body.proxy(handle)).collect();
            self.detector
                .grounded_bodies(&proxies, down, self.config.ground_probe_distance)
        };

        for (handle, body) in &mut self.bodies {
            if let Some(rigidbody) = body.rigidbody.as_mut() {
                rigidbody.set_grounded(grounded.contains(&handle));
            }
        }
    }

    fn integrate(&mut self) {
        for body in self.bodies.values_mut() {
            body.previous_position = body.transform.position;
            if let Some(rigidbody) = body.rigidbody.as_mut() {
                self.integrator.integrate(rigidbody, &mut body.transform);
            }
        }
    }

    fn resync_index(&mut self) {
        for (handle, body) in &self.bodies {
            if self.index.position_of(handle) != Some(body.transform.position) {
                self.index.update(handle, body.transform.position);
            }
        }
    }

    /// Bodies whose bounding volume the ray crosses within `max_distance`,
    /// nearest first
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<RayHit> {
        let Some(ray) = Ray::new(origin, direction) else {
            log::debug!("Raycast with degenerate direction {direction:?}");
            return Vec::new();
        };

        let mut candidates = self.index.query_ray(origin, ray.direction, max_distance);
        // Bodies reaching past their anchor cell can cross the ray anywhere
        let walked: HashSet<BodyHandle> = candidates.iter().copied().collect();
        candidates.extend(self.oversized_bodies().filter(|handle| !walked.contains(handle)));

        let mut hits = self.hits_among(&ray, max_distance, &candidates);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Bodies whose bounding volume extends more than one cell from their anchor
    fn oversized_bodies(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        let cell_size = self.config.cell_size;
        self.bodies.iter().filter_map(move |(handle, body)| {
            let bounds = body.world_bounds()?;
            let reach = (bounds.center() - body.transform.position).magnitude() + bounds.bounding_radius();
            (reach > cell_size).then_some(handle)
        })
    }

    fn hits_among(&self, ray: &Ray, max_distance: f32, candidates: &[BodyHandle]) -> Vec<RayHit> {
        candidates
            .par_iter()
            .filter_map(|&handle| {
                let bounds = self.bodies.get(handle)?.world_bounds()?;
                let distance = bounds.intersect_ray(ray, max_distance)?;
                Some(RayHit {
                    body: handle,
                    distance,
                    point: ray.point_at(distance),
                })
            })
            .collect()
    }

    /// Bodies anchored within `radius` of `position`
    pub fn query_nearby(&self, position: Vec3, radius: f32) -> Vec<BodyHandle> {
        self.index
            .query_range(position, radius)
            .into_iter()
            .filter(|handle| {
                self.bodies
                    .get(*handle)
                    .is_some_and(|body| (body.transform.position - position).magnitude() <= radius)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::ColliderDesc;
    use crate::physics::events::CollisionPhase;
    use approx::assert_relative_eq;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default()).unwrap()
    }

    fn cube_at(position: Vec3) -> BodyDesc {
        BodyDesc::new(Transform::from_position(position)).with_collider(ColliderDesc::cuboid())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PhysicsConfig { fixed_timestep: 0.0, ..PhysicsConfig::default() };
        assert!(matches!(PhysicsWorld::new(config), Err(PhysicsError::Config(_))));
    }

    #[test]
    fn test_stale_handle_after_destroy() {
        let mut world = world();
        let handle = world.create_body(cube_at(Vec3::zeros())).unwrap();
        world.destroy_body(handle).unwrap();

        assert!(matches!(world.body(handle), Err(PhysicsError::StaleHandle(_))));
        assert!(matches!(world.destroy_body(handle), Err(PhysicsError::StaleHandle(_))));
        assert!(world.query_nearby(Vec3::zeros(), 2.0).is_empty());
    }

    #[test]
    fn test_attach_rigidbody_needs_collider() {
        let mut world = world();
        let bare = world.create_body(BodyDesc::new(Transform::identity())).unwrap();
        let result = world.attach_rigidbody(bare, RigidBodyDesc::dynamic(1.0));
        assert!(matches!(
            result,
            Err(PhysicsError::MissingComponent { component: "collider", .. })
        ));
    }

    #[test]
    fn test_invalid_mass_is_rejected() {
        let mut world = world();
        let result = world.create_body(cube_at(Vec3::zeros()).with_rigidbody(RigidBodyDesc::dynamic(0.0)));
        assert!(matches!(result, Err(PhysicsError::InvalidMass(_))));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_destroy_reports_exit_next_step() {
        let mut world = world();
        let a = world.create_body(cube_at(Vec3::zeros())).unwrap();
        let b = world.create_body(cube_at(Vec3::new(0.5, 0.0, 0.0))).unwrap();
        assert_eq!(world.step().events[0].phase, CollisionPhase::Enter);

        world.destroy_body(b).unwrap();
        let report = world.step();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].phase, CollisionPhase::Exit);
        assert!(report.events[0].involves(a));
    }

    #[test]
    fn test_query_nearby_filters_by_distance() {
        let mut world = world();
        let near = world.create_body(cube_at(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        world.create_body(cube_at(Vec3::new(1.5, 1.5, 0.0))).unwrap();

        assert_eq!(world.query_nearby(Vec3::zeros(), 1.2), vec![near]);
    }

    #[test]
    fn test_raycast_sorted_by_distance() {
        let mut world = world();
        let far = world.create_body(cube_at(Vec3::new(0.0, 0.0, 6.0))).unwrap();
        let near = world.create_body(cube_at(Vec3::new(0.0, 0.0, 3.0))).unwrap();

        let hits = world.raycast(Vec3::zeros(), Vec3::z(), 20.0);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].body, near);
        assert_eq!(hits[1].body, far);
        assert_relative_eq!(hits[0].distance, 2.5, epsilon = 1e-5);
        assert!(world.raycast(Vec3::zeros(), Vec3::z(), 2.0).is_empty());
    }

    #[test]
    fn test_raycast_reports_large_body_before_farther_small_one() {
        let mut world = world();
        let floor = world
            .create_body(
                BodyDesc::new(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)).with_scale(Vec3::new(20.0, 1.0, 20.0)))
                    .with_collider(ColliderDesc::cuboid())
                    .with_rigidbody(RigidBodyDesc::fixed()),
            )
            .unwrap();
        let crate_box = world.create_body(cube_at(Vec3::new(8.0, -3.0, 0.0))).unwrap();

        let hits = world.raycast(Vec3::new(8.0, 5.0, 0.0), -Vec3::y(), 20.0);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].body, floor);
        assert_relative_eq!(hits[0].distance, 5.0, epsilon = 1e-4);
        assert_eq!(hits[1].body, crate_box);
        assert_relative_eq!(hits[1].distance, 7.5, epsilon = 1e-4);
    }

    #[test]
    fn test_is_collided_follows_contact() {
        let mut world = world();
        let a = world.create_body(cube_at(Vec3::zeros())).unwrap();
        let b = world.create_body(cube_at(Vec3::new(0.5, 0.0, 0.0))).unwrap();
        let loner = world.create_body(cube_at(Vec3::new(10.0, 0.0, 0.0))).unwrap();
        assert!(!world.is_collided(a));

        world.step();
        assert!(world.is_collided(a));
        assert!(world.is_collided(b));
        assert!(!world.is_collided(loner));

        world.set_transform(b, Transform::from_position(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        world.step();
        assert!(!world.is_collided(a));
    }

    #[test]
    fn test_offset_collider_collides_away_from_body() {
        let mut world = world();
        let floor = world.create_body(cube_at(Vec3::zeros())).unwrap();
        let shifted = world
            .create_body(
                BodyDesc::new(Transform::from_position(Vec3::new(0.0, 3.0, 0.0)))
                    .with_collider(ColliderDesc::cuboid().with_offset(Vec3::new(0.0, -2.1, 0.0))),
            )
            .unwrap();

        let report = world.step();

        assert_eq!(report.events.len(), 1);
        assert!(world.is_colliding(floor, shifted));
        let hits = world.raycast(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), 10.0);
        assert_eq!(hits[0].body, shifted);
        assert_relative_eq!(hits[0].distance, 5.0 - 1.4, epsilon = 1e-4);
    }

    #[derive(Default)]
    struct MaskLog(Vec<LayerMaskChange>);

    impl CollisionListener for MaskLog {
        fn on_layer_mask_change(&mut self, change: &LayerMaskChange) {
            self.0.push(*change);
        }
    }

    #[test]
    fn test_layer_mask_change_reaches_listener_next_step() {
        let mut world = world();
        let mut log = MaskLog::default();

        assert!(world.set_layer_collision_mask(Layer::PLAYER, Layer::PICKUP, true));
        assert!(!world.set_layer_collision_mask(Layer::PICKUP, Layer::PLAYER, true));
        assert!(log.0.is_empty());

        let report = world.step_with(&mut log);
        let expected = LayerMaskChange { a: Layer::PLAYER, b: Layer::PICKUP, enabled: true };
        assert_eq!(log.0, vec![expected]);
        assert_eq!(report.layer_mask_changes, vec![expected]);

        assert!(world.step_with(&mut log).layer_mask_changes.is_empty());
        assert_eq!(log.0.len(), 1);
    }

    #[test]
    fn test_forces_reject_nan_and_need_rigidbody() {
        let mut world = world();
        let cube = world.create_body(cube_at(Vec3::zeros())).unwrap();
        assert!(matches!(
            world.add_force(cube, Vec3::x()),
            Err(PhysicsError::MissingComponent { component: "rigidbody", .. })
        ));

        world.attach_rigidbody(cube, RigidBodyDesc::dynamic(2.0)).unwrap();
        assert!(matches!(
            world.add_impulse(cube, Vec3::new(f32::NAN, 0.0, 0.0)),
            Err(PhysicsError::InvalidImpulse)
        ));
        world.add_impulse(cube, Vec3::new(4.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(world.rigidbody(cube).unwrap().velocity.x, 2.0);
    }

    #[test]
    fn test_advance_runs_whole_steps() {
        let mut world = world();
        let reports = world.advance(0.05, &mut ());
        assert_eq!(reports.len(), 2);
        assert_eq!(world.step_count(), 2);
        assert!(world.interpolation_alpha() > 0.0);
    }
}
