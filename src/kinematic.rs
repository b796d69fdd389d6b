//! Headless physics backend.
//!
//! Integrates [`KinematicBody`] components against an optional [`FlatGround`]
//! resource. No solver, no colliders: enough for servers, replays and tests.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::body::{FlatGround, GroundLayers, GroundProbe, KinematicBody, RigidBody as _};
use crate::BlastControllerSet;

/// Backend over [`KinematicBody`].
pub struct KinematicBackend;

impl CharacterPhysicsBackend for KinematicBackend {
    fn plugin() -> impl Plugin {
        KinematicBackendPlugin
    }

    fn has_body(world: &World, entity: Entity) -> bool {
        world.get::<KinematicBody>(entity).is_some()
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<KinematicBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.add_impulse(impulse);
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.accumulated_force += force;
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<KinematicBody>(entity)
            .map(|b| b.position)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.position = position;
        }
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<KinematicBody>(entity)
            .map(|b| b.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut body) = world.get_mut::<KinematicBody>(entity) {
            body.rotation = rotation;
        }
    }

    fn probe_ground(
        world: &World,
        _entity: Entity,
        origin: Vec3,
        max_distance: f32,
        layers: GroundLayers,
    ) -> bool {
        world
            .get_resource::<FlatGround>()
            .is_some_and(|ground| ground.is_grounded(origin, max_distance, layers))
    }
}

/// Plugin that steps kinematic bodies after the controller has run.
pub struct KinematicBackendPlugin;

impl Plugin for KinematicBackendPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<KinematicBody>();
        app.register_type::<FlatGround>();

        app.add_systems(
            FixedUpdate,
            step_kinematic_bodies.in_set(BlastControllerSet::FinalApplication),
        );
    }
}

/// Integrate every [`KinematicBody`] and mirror it onto its `Transform`.
pub fn step_kinematic_bodies(
    time: Res<Time>,
    ground: Option<Res<FlatGround>>,
    mut bodies: Query<(&mut KinematicBody, Option<&mut Transform>)>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    for (mut body, transform) in &mut bodies {
        body.step(dt, ground.as_deref());
        if let Some(mut transform) = transform {
            transform.translation = body.position;
            transform.rotation = body.rotation;
        }
    }
}
