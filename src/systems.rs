//! Core controller systems.
//!
//! These systems bridge the bevy world and [`BlastController`]. They are
//! generic over the physics backend so different physics engines can be used.
//!
//! Like the rest of the crate they are exclusive systems: each controller is
//! cloned out of the world, ticked against a [`BufferedBody`] and a
//! [`WorldProbe`], then written back along with the buffered body writes.

use bevy::prelude::*;

use crate::backend::{BufferedBody, CharacterPhysicsBackend, WorldProbe};
use crate::body::{CameraBasis, CameraView, RigidBody as _};
use crate::config::ControllerConfig;
use crate::controller::{
    BlastController, ControllerError, ControllerEvent, ControllerStatus, MotionSink, Wiring,
};
use crate::intent::MovementIntent;
use crate::momentum::speed_boost_impulse;
use crate::state::{Airborne, Diving, Grounded, MotionSignals, Rolling};

/// Camera entity a controller steers by.
///
/// The camera entity needs a `GlobalTransform` (or at least a `Transform`).
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct FollowCamera(pub Entity);

/// A [`ControllerEvent`] raised by a controller entity.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ControllerNotification {
    pub entity: Entity,
    pub event: ControllerEvent,
}

/// Teleport a controller entity and clear its transient state.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct RespawnRequest {
    pub entity: Entity,
    pub position: Vec3,
}

/// Push a controller entity along its current velocity (speed rings).
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct SpeedBoost {
    pub entity: Entity,
    pub strength: f32,
}

/// Sink that collects what a controller reports during one tick.
#[derive(Default)]
struct TickReport {
    signals: Option<MotionSignals>,
    events: Vec<ControllerEvent>,
}

impl MotionSink for TickReport {
    fn signals(&mut self, signals: &MotionSignals) {
        self.signals = Some(*signals);
    }

    fn event(&mut self, event: ControllerEvent) {
        self.events.push(event);
    }
}

impl TickReport {
    fn publish(self, world: &mut World, entity: Entity) {
        if let Some(signals) = self.signals {
            if let Some(mut stored) = world.get_mut::<MotionSignals>(entity) {
                *stored = signals;
            }
        }
        for event in self.events {
            world.send_event(ControllerNotification { entity, event });
        }
    }
}

/// View basis of the camera followed by `entity`.
fn camera_basis(world: &World, entity: Entity) -> Option<CameraBasis> {
    let camera = world.get::<FollowCamera>(entity)?.0;
    if let Some(transform) = world.get::<GlobalTransform>(camera) {
        return Some(CameraBasis::new(
            CameraView::forward(transform),
            CameraView::right(transform),
        ));
    }
    world
        .get::<Transform>(camera)
        .map(|t| CameraBasis::new(CameraView::forward(t), CameraView::right(t)))
}

/// Seconds on the clock of the schedule currently running.
fn clock(world: &World) -> f32 {
    world
        .get_resource::<Time>()
        .map(|t| t.elapsed_secs())
        .unwrap_or(0.0)
}

fn controllers(world: &mut World, active: bool) -> Vec<(Entity, BlastController, ControllerConfig)> {
    world
        .query::<(Entity, &BlastController, &ControllerConfig)>()
        .iter(world)
        .filter(|(_, controller, _)| controller.is_active() == active)
        .map(|(e, controller, config)| (e, controller.clone(), *config))
        .collect()
}

/// Body and camera of a running controller, or the error that stops it.
fn collaborators<B: CharacterPhysicsBackend>(
    world: &World,
    entity: Entity,
) -> Result<CameraBasis, ControllerError> {
    if !B::has_body(world, entity) {
        return Err(ControllerError::MissingRigidBody);
    }
    camera_basis(world, entity).ok_or(ControllerError::MissingCamera)
}

fn disable(world: &mut World, entity: Entity, reason: &ControllerError) {
    if let Some(mut controller) = world.get_mut::<BlastController>(entity) {
        controller.disable(reason);
    }
}

/// Start controllers that have not been started yet.
///
/// Controllers without a body or camera disable themselves here.
pub fn start_controllers<B: CharacterPhysicsBackend>(world: &mut World) {
    let pending: Vec<(Entity, ControllerConfig)> = controllers(world, false)
        .into_iter()
        .filter(|(_, controller, _)| controller.status() == ControllerStatus::Pending)
        .map(|(e, _, config)| (e, config))
        .collect();

    for (entity, config) in pending {
        let wiring = Wiring {
            has_rigid_body: B::has_body(world, entity),
            has_camera: camera_basis(world, entity).is_some(),
        };
        if let Some(mut controller) = world.get_mut::<BlastController>(entity) {
            if controller.start(&config, wiring).is_ok() {
                info!("blast controller started on {entity}");
            }
        }
    }
}

/// Handle [`RespawnRequest`] events.
pub fn apply_respawns<B: CharacterPhysicsBackend>(world: &mut World) {
    let requests: Vec<RespawnRequest> = match world.get_resource_mut::<Events<RespawnRequest>>() {
        Some(mut events) => events.drain().collect(),
        None => return,
    };

    for request in requests {
        let Some(mut controller) = world.get::<BlastController>(request.entity).cloned() else {
            warn!("respawn requested for {} which has no controller", request.entity);
            continue;
        };
        let mut body = BufferedBody::capture::<B>(world, request.entity);
        let mut report = TickReport::default();
        controller.respawn(request.position, &mut body, &mut report);

        body.flush::<B>(world);
        if let Some(mut stored) = world.get_mut::<BlastController>(request.entity) {
            *stored = controller;
        }
        if let Some(mut intent) = world.get_mut::<MovementIntent>(request.entity) {
            intent.clear();
        }
        report.publish(world, request.entity);
    }
}

/// Handle [`SpeedBoost`] events.
///
/// The boost is a plain impulse; the next physics tick reads the new speed
/// back and clamps it to the ceiling.
pub fn apply_speed_boosts<B: CharacterPhysicsBackend>(world: &mut World) {
    let boosts: Vec<SpeedBoost> = match world.get_resource_mut::<Events<SpeedBoost>>() {
        Some(mut events) => events.drain().collect(),
        None => return,
    };

    for boost in boosts {
        if !B::has_body(world, boost.entity) {
            continue;
        }
        let mut body = BufferedBody::capture::<B>(world, boost.entity);
        let impulse = speed_boost_impulse(body.linear_velocity(), boost.strength);
        if impulse == Vec3::ZERO {
            debug!("speed boost on {} ignored, not moving", boost.entity);
            continue;
        }
        body.add_impulse(impulse);
        body.flush::<B>(world);
    }
}

/// Per-frame input tick: sample [`MovementIntent`] and run the charge jump.
pub fn run_input_tick<B: CharacterPhysicsBackend>(world: &mut World) {
    let now = clock(world);

    for (entity, mut controller, config) in controllers(world, true) {
        let frame = world
            .get_mut::<MovementIntent>(entity)
            .map(|mut intent| intent.sample())
            .unwrap_or_default();
        let camera = match collaborators::<B>(world, entity) {
            Ok(camera) => camera,
            Err(err) => {
                disable(world, entity, &err);
                continue;
            }
        };

        let mut body = BufferedBody::capture::<B>(world, entity);
        let mut report = TickReport::default();
        controller.on_input_tick(now, frame, &config, &mut body, &camera, &mut report);

        body.flush::<B>(world);
        if let Some(mut stored) = world.get_mut::<BlastController>(entity) {
            *stored = controller;
        }
        report.publish(world, entity);
    }
}

/// Fixed-step physics tick.
pub fn run_physics_tick<B: CharacterPhysicsBackend>(world: &mut World) {
    let now = clock(world);
    let dt = B::get_fixed_timestep(world);

    for (entity, mut controller, config) in controllers(world, true) {
        let camera = match collaborators::<B>(world, entity) {
            Ok(camera) => camera,
            Err(err) => {
                disable(world, entity, &err);
                continue;
            }
        };

        let mut body = BufferedBody::capture::<B>(world, entity);
        let mut report = TickReport::default();
        {
            let probe = WorldProbe::<B>::new(world, entity);
            controller.on_physics_tick(now, dt, &config, &mut body, &probe, &camera, &mut report);
        }

        body.flush::<B>(world);
        if let Some(mut stored) = world.get_mut::<BlastController>(entity) {
            *stored = controller;
        }
        report.publish(world, entity);
    }
}

/// Mirror controller state onto marker components.
pub fn sync_state_markers(
    mut commands: Commands,
    q_controllers: Query<(
        Entity,
        &BlastController,
        Has<Grounded>,
        Has<Airborne>,
        Has<Diving>,
        Has<Rolling>,
    )>,
) {
    for (entity, controller, has_grounded, has_airborne, has_diving, has_rolling) in &q_controllers {
        if !controller.is_active() {
            continue;
        }
        let state = controller.state();

        // Sync Grounded/Airborne
        if state.is_grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !state.is_grounded && (has_grounded || !has_airborne) {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }

        if state.is_diving && !has_diving {
            commands.entity(entity).insert(Diving);
        } else if !state.is_diving && has_diving {
            commands.entity(entity).remove::<Diving>();
        }

        if state.is_rolling && !has_rolling {
            commands.entity(entity).insert(Rolling);
        } else if !state.is_rolling && has_rolling {
            commands.entity(entity).remove::<Rolling>();
        }
    }
}
