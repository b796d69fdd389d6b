//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! drive a [`BlastController`](crate::controller::BlastController) inside a
//! bevy `World`. Swapping physics engines means swapping the backend type
//! parameter of [`BlastControllerPlugin`](crate::BlastControllerPlugin).
//!
//! The controller core works on [`RigidBody`] and [`GroundProbe`] values, not
//! on the world. [`BufferedBody`] bridges the two: it snapshots an entity's
//! body through the backend, records every write the controller makes, and
//! flushes them back afterwards. This keeps the world borrowable by the
//! ground probe while a tick runs.

use std::marker::PhantomData;

use bevy::prelude::*;

use crate::body::{GroundLayers, GroundProbe, RigidBody};

/// Trait for physics backend implementations.
///
/// All accessors are static and work on the world directly, so controller
/// systems stay generic over the engine.
///
/// # Example
///
/// For an example implementation, see [`KinematicBackend`](crate::kinematic::KinematicBackend),
/// or `Rapier3dBackend` behind the `rapier3d` feature.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Whether `entity` carries a body this backend can drive.
    fn has_body(world: &World, entity: Entity) -> bool;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Apply an impulse to an entity.
    ///
    /// Impulse is an instantaneous change in momentum.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Apply a force to an entity.
    ///
    /// Force is applied over the next physics step.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3);

    /// Get the world-space position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Teleport an entity.
    fn set_position(world: &mut World, entity: Entity, position: Vec3);

    /// Get the rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Set the rotation of an entity.
    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat);

    /// Downward ground query for `entity`.
    ///
    /// # Arguments
    /// * `world` - The ECS world for queries
    /// * `entity` - The querying body, excluded from hits
    /// * `origin` - Ray origin in world space
    /// * `max_distance` - Maximum ray length
    /// * `layers` - Layers that count as ground
    fn probe_ground(
        world: &World,
        entity: Entity,
        origin: Vec3,
        max_distance: f32,
        layers: GroundLayers,
    ) -> bool;

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }
}

/// [`GroundProbe`] over a world, answered by backend `B`.
pub struct WorldProbe<'w, B: CharacterPhysicsBackend> {
    world: &'w World,
    entity: Entity,
    _marker: PhantomData<B>,
}

impl<'w, B: CharacterPhysicsBackend> WorldProbe<'w, B> {
    pub fn new(world: &'w World, entity: Entity) -> Self {
        Self {
            world,
            entity,
            _marker: PhantomData,
        }
    }
}

impl<B: CharacterPhysicsBackend> GroundProbe for WorldProbe<'_, B> {
    fn is_grounded(&self, origin: Vec3, max_distance: f32, layers: GroundLayers) -> bool {
        B::probe_ground(self.world, self.entity, origin, max_distance, layers)
    }
}

/// Snapshot of an entity's body with recorded writes.
///
/// Reads see the controller's own writes immediately, like a real body
/// would. [`flush`](Self::flush) replays the writes through the backend in a
/// fixed order: velocity, impulse, force, position, rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedBody {
    entity: Entity,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    velocity_written: bool,
    impulse: Vec3,
    force: Vec3,
    position_written: bool,
    rotation_written: bool,
}

impl BufferedBody {
    /// Read `entity`'s body through `B`.
    pub fn capture<B: CharacterPhysicsBackend>(world: &World, entity: Entity) -> Self {
        Self {
            entity,
            position: B::get_position(world, entity),
            rotation: B::get_rotation(world, entity),
            velocity: B::get_velocity(world, entity),
            velocity_written: false,
            impulse: Vec3::ZERO,
            force: Vec3::ZERO,
            position_written: false,
            rotation_written: false,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Write the recorded changes back through `B`.
    pub fn flush<B: CharacterPhysicsBackend>(self, world: &mut World) {
        if self.velocity_written {
            B::set_velocity(world, self.entity, self.velocity);
        }
        if self.impulse != Vec3::ZERO {
            B::apply_impulse(world, self.entity, self.impulse);
        }
        if self.force != Vec3::ZERO {
            B::apply_force(world, self.entity, self.force);
        }
        if self.position_written {
            B::set_position(world, self.entity, self.position);
        }
        if self.rotation_written {
            B::set_rotation(world, self.entity, self.rotation);
        }
    }
}

impl RigidBody for BufferedBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Mass is unknown here, so a pending impulse is not reflected in the
    /// velocity until the backend applies it.
    fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.velocity_written = true;
    }

    fn add_impulse(&mut self, impulse: Vec3) {
        self.impulse += impulse;
    }

    fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    fn move_position(&mut self, position: Vec3) {
        self.position = position;
        self.position_written = true;
    }

    fn move_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.rotation_written = true;
    }
}
