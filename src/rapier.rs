//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::body::GroundLayers;
use crate::config::ControllerConfig;
use crate::BlastControllerSet;

/// Rapier3D physics backend for the blast controller.
///
/// Velocity, impulses and forces go through bevy_rapier3d components.
/// Ground detection is handled by a dedicated system that receives the
/// `RapierContext` as a system parameter and stores its result in
/// [`GroundContact`].
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn has_body(world: &World, entity: Entity) -> bool {
        world.get::<RigidBody>(entity).is_some()
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            // Fallback: apply as velocity change if no ExternalImpulse component
            vel.linvel += impulse;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        // Accumulate into ControllerForces; moved into ExternalForce in FinalApplication.
        if let Some(mut forces) = world.get_mut::<ControllerForces>(entity) {
            forces.pending += force;
        } else if let Some(mut ext_force) = world.get_mut::<ExternalForce>(entity) {
            ext_force.force += force;
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    fn probe_ground(
        world: &World,
        entity: Entity,
        _origin: Vec3,
        max_distance: f32,
        _layers: GroundLayers,
    ) -> bool {
        // Origin and layers were applied by rapier_ground_detection.
        world
            .get::<GroundContact>(entity)
            .and_then(|contact| contact.distance)
            .is_some_and(|distance| distance <= max_distance)
    }
}

/// Plugin that sets up Rapier3D-specific systems for the blast controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<GroundContact>();
        app.register_type::<ControllerForces>();

        // Phase 1: Preparation - Clear forces from previous step
        app.add_systems(
            FixedUpdate,
            clear_controller_forces.in_set(BlastControllerSet::Preparation),
        );

        // Phase 2: Sensors - ground ray
        app.add_systems(
            FixedUpdate,
            rapier_ground_detection.in_set(BlastControllerSet::Sensors),
        );

        // Phase 4: Final Application - Apply accumulated forces to physics
        app.add_systems(
            FixedUpdate,
            apply_controller_forces.in_set(BlastControllerSet::FinalApplication),
        );
    }
}

/// Result of the latest ground ray.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct GroundContact {
    /// Distance to the hit, `None` when nothing was hit.
    pub distance: Option<f32>,
    /// Entity that was hit.
    pub entity: Option<Entity>,
}

/// Forces the controller applied through `ExternalForce`.
///
/// Tracked separately so forces from other sources are preserved.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct ControllerForces {
    /// Accumulated during the current step.
    pub pending: Vec3,
    /// Added to `ExternalForce` at the end of the previous step.
    pub applied: Vec3,
}

fn ground_filter(entity: Entity, layers: GroundLayers) -> QueryFilter<'static> {
    QueryFilter::default()
        .exclude_rigid_body(entity)
        .exclude_sensors()
        .groups(CollisionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(layers.bits()),
        ))
}

/// Rapier-specific ground detection system.
///
/// Casts a ray straight down from the body origin over
/// `ground_check_distance`, hitting only colliders on `ground_layers`.
fn rapier_ground_detection(
    rapier_context: ReadRapierContext,
    mut commands: Commands,
    q_controllers: Query<(Entity, &GlobalTransform, &ControllerConfig, Option<&GroundContact>)>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, config, previous) in &q_controllers {
        let hit = context.cast_ray(
            transform.translation(),
            Vec3::NEG_Y,
            config.ground_check_distance,
            true,
            ground_filter(entity, config.ground_layers),
        );

        let contact = GroundContact {
            distance: hit.map(|(_, toi)| toi),
            entity: hit.map(|(hit_entity, _)| hit_entity),
        };
        if previous != Some(&contact) {
            commands.entity(entity).insert(contact);
        }
    }
}

/// Clear controller forces at the start of each step.
///
/// Subtracts the forces we applied last step from `ExternalForce`, restoring
/// it to the "external-only" state.
pub fn clear_controller_forces(mut q: Query<(&mut ExternalForce, &mut ControllerForces)>) {
    for (mut ext_force, mut forces) in &mut q {
        ext_force.force -= forces.applied;
        forces.applied = Vec3::ZERO;
        forces.pending = Vec3::ZERO;
    }
}

/// Apply controller forces at the end of each step.
pub fn apply_controller_forces(mut q: Query<(&mut ExternalForce, &mut ControllerForces)>) {
    for (mut ext_force, mut forces) in &mut q {
        let force = std::mem::take(&mut forces.pending);
        ext_force.force += force;
        forces.applied = force;
    }
}

/// Bundle for creating a blast-pack character with Rapier3D physics.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use blast_pack_controller::prelude::*;
/// use blast_pack_controller::rapier::Rapier3dCharacterBundle;
///
/// fn spawn_player(mut commands: Commands, camera: Single<Entity, With<Camera3d>>) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         BlastController::new(),
///         ControllerConfig::default(),
///         FollowCamera(*camera),
///         Rapier3dCharacterBundle::new(),
///         Collider::capsule_y(0.5, 0.5),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: rotation locked; the controller sets facing directly
/// - `damping`: none, the controller applies its own decay
#[derive(Bundle, Default)]
pub struct Rapier3dCharacterBundle {
    pub rigid_body: RigidBody,
    pub velocity: Velocity,
    /// Controller dive forces end up here.
    pub external_force: ExternalForce,
    /// Launches and speed boosts end up here.
    pub external_impulse: ExternalImpulse,
    pub locked_axes: LockedAxes,
    pub damping: Damping,
    pub mass_properties: ReadMassProperties,
    pub controller_forces: ControllerForces,
    pub ground_contact: GroundContact,
}

impl Rapier3dCharacterBundle {
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
            ..default()
        }
    }

    /// Set the rigid body type for the character.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients. Linear damping stacks on top of the
    /// controller's own decay.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;

    use super::*;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.insert_resource(Time::<Fixed>::from_hz(60.0));
        app
    }

    #[test]
    fn rapier_backend_get_position() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::from_xyz(1.0, 2.0, 3.0), RigidBody::Dynamic))
            .id();

        app.update();

        let pos = Rapier3dBackend::get_position(app.world(), entity);
        assert!((pos - Vec3::new(1.0, 2.0, 3.0)).length() < 0.01);
        assert!(Rapier3dBackend::has_body(app.world(), entity));
    }

    #[test]
    fn rapier_backend_velocity() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                RigidBody::Dynamic,
                Velocity::linear(Vec3::new(5.0, 3.0, -2.0)),
            ))
            .id();

        app.update();

        let vel = Rapier3dBackend::get_velocity(app.world(), entity);
        assert!((vel.x - 5.0).abs() < 0.01);
        assert!((vel.z + 2.0).abs() < 0.01);

        Rapier3dBackend::set_velocity(app.world_mut(), entity, Vec3::new(10.0, 0.0, 0.0));

        let vel = Rapier3dBackend::get_velocity(app.world(), entity);
        assert!((vel.x - 10.0).abs() < 0.01);
        assert!(vel.y.abs() < 0.01);
    }

    #[test]
    fn controller_forces_preserve_external_forces() {
        let mut world = World::new();
        let entity = world
            .spawn((
                ExternalForce {
                    force: Vec3::X,
                    ..default()
                },
                ControllerForces::default(),
            ))
            .id();

        Rapier3dBackend::apply_force(&mut world, entity, Vec3::NEG_Y * 20.0);
        world.run_system_once(apply_controller_forces).unwrap();
        assert_eq!(world.get::<ExternalForce>(entity).unwrap().force, Vec3::new(1.0, -20.0, 0.0));

        world.run_system_once(clear_controller_forces).unwrap();
        assert_eq!(world.get::<ExternalForce>(entity).unwrap().force, Vec3::X);
    }

    #[test]
    fn probe_reads_ground_contact() {
        let mut world = World::new();
        let entity = world
            .spawn(GroundContact {
                distance: Some(0.9),
                entity: None,
            })
            .id();
        assert!(Rapier3dBackend::probe_ground(&world, entity, Vec3::ZERO, 1.1, GroundLayers::ALL));
        assert!(!Rapier3dBackend::probe_ground(&world, entity, Vec3::ZERO, 0.5, GroundLayers::ALL));
    }

    #[test]
    fn rapier_character_bundle_creates_valid_entity() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                Rapier3dCharacterBundle::new(),
                Collider::capsule_y(0.5, 0.5),
            ))
            .id();

        app.update();

        assert!(app.world().get::<RigidBody>(entity).is_some());
        assert!(app.world().get::<Velocity>(entity).is_some());
        assert!(app.world().get::<ExternalForce>(entity).is_some());
        assert!(app.world().get::<GroundContact>(entity).is_some());
    }
}
