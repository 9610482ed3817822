//! Drop demo
//!
//! Drops a handful of boxes and spheres onto a fixed floor, runs the world at
//! a simulated 60 Hz frame rate and logs collision events and where every
//! body came to rest.
//!
//! Usage: `drop_demo [config.toml|config.ron]`

use rand::Rng;
use rust_physics::foundation::logging;
use rust_physics::prelude::*;

const BODY_COUNT: usize = 8;
const FRAME_TIME: f32 = 1.0 / 60.0;
const FRAMES: u32 = 600;

/// Counts events and logs the interesting ones
#[derive(Default)]
struct EventLog {
    enters: u32,
    exits: u32,
    continues: u64,
}

impl CollisionListener for EventLog {
    fn on_collision_enter(&mut self, a: BodyHandle, b: BodyHandle) {
        self.enters += 1;
        log::info!("Enter {:?} <-> {:?}", a, b);
    }

    fn on_collision_continue(&mut self, _a: BodyHandle, _b: BodyHandle) {
        self.continues += 1;
    }

    fn on_collision_exit(&mut self, a: BodyHandle, b: BodyHandle) {
        self.exits += 1;
        log::debug!("Exit {:?} <-> {:?}", a, b);
    }

    fn on_layer_mask_change(&mut self, change: &LayerMaskChange) {
        log::info!("Layers {:?} and {:?} collide: {}", change.a, change.b, change.enabled);
    }
}

fn load_config() -> Result<PhysicsConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading physics config from {}", path);
            PhysicsConfig::load_from_file(path)
        }
        None => Ok(PhysicsConfig::default()),
    }
}

fn build_scene(world: &mut PhysicsWorld) -> Result<Vec<BodyHandle>, PhysicsError> {
    // Floor: top face at y = 0
    world.create_body(
        BodyDesc::new(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)).with_scale(Vec3::new(20.0, 1.0, 20.0)))
            .with_collider(ColliderDesc::cuboid().with_layer(Layer::ENVIRONMENT))
            .with_rigidbody(RigidBodyDesc::fixed()),
    )?;
    world.set_layer_collision_mask(Layer::ENVIRONMENT, Layer::DEBRIS, true);

    let mut rng = rand::thread_rng();
    let mut dropped = Vec::with_capacity(BODY_COUNT);
    for i in 0..BODY_COUNT {
        let position = Vec3::new(
            rng.gen_range(-6.0..6.0),
            rng.gen_range(2.0..8.0),
            rng.gen_range(-6.0..6.0),
        );
        let collider = if i % 2 == 0 {
            ColliderDesc::cuboid()
        } else {
            ColliderDesc::sphere()
        };

        let handle = world.create_body(
            BodyDesc::new(Transform::from_position(position))
                .with_collider(collider.with_layer(Layer::DEBRIS))
                .with_rigidbody(RigidBodyDesc::dynamic(rng.gen_range(0.5..5.0)).with_angular_lock(true)),
        )?;
        log::info!("Dropping {:?} from {:?}", handle, position);
        dropped.push(handle);
    }

    Ok(dropped)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = load_config()?;
    let mut world = PhysicsWorld::new(config)?;
    let dropped = build_scene(&mut world)?;

    let mut events = EventLog::default();
    let mut steps = 0;
    for _ in 0..FRAMES {
        steps += world.advance(FRAME_TIME, &mut events).len();
    }

    log::info!(
        "{} steps: {} enters, {} exits, {} continues",
        steps,
        events.enters,
        events.exits,
        events.continues
    );

    for handle in dropped {
        let position = world.transform(handle)?.position;
        let body = world.rigidbody(handle)?;
        log::info!(
            "{:?} rests at ({:.3}, {:.3}, {:.3}), speed {:.4}, grounded {}",
            handle,
            position.x,
            position.y,
            position.z,
            body.velocity.magnitude(),
            body.is_grounded()
        );
    }

    Ok(())
}
