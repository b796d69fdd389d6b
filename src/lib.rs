//! # `blast_pack_controller`
//!
//! A physics-driven third-person momentum controller with physics backend abstraction.
//!
//! This crate turns per-frame input (two axes and one charge button) into
//! rigid-body motion that:
//! - Builds speed along camera-relative input with an easing curve and decays without it
//! - Launches with a chargeable "blast pack" impulse, stronger when moving fast
//! - Dives when pushing down in the air, raising the speed ceiling
//! - Rolls for a fixed time after landing from a dive, locking steering
//! - Abstracts the physics backend (headless kinematic and Rapier3D included)
//!
//! ## Architecture
//!
//! The core is engine-agnostic. [`controller::BlastController`] has two
//! entry points:
//! 1. `on_input_tick`, once per frame: stores input, handles charge edges
//! 2. `on_physics_tick`, once per fixed step: ground probe, aerial state
//!    machine, then momentum integration
//!
//! It talks to the world only through the [`body::RigidBody`],
//! [`body::GroundProbe`] and [`body::CameraView`] traits. The bevy layer
//! ([`BlastControllerPlugin`]) drives those entry points from `Update` and
//! `FixedUpdate` through a [`backend::CharacterPhysicsBackend`].
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use blast_pack_controller::prelude::*;
//!
//! let mut app = App::new();
//! app.add_plugins(MinimalPlugins)
//!     .add_plugins(BlastControllerPlugin::<KinematicBackend>::default())
//!     .insert_resource(FlatGround::at(0.0));
//!
//! let camera = app.world_mut().spawn(Transform::default()).id();
//! app.world_mut().spawn((
//!     BlastController::new(),
//!     ControllerConfig::arcade(),
//!     KinematicBody::resting_on(&FlatGround::at(0.0)),
//!     FollowCamera(camera),
//! ));
//! app.update();
//! ```

use bevy::prelude::*;

pub mod aerial;
pub mod backend;
pub mod body;
pub mod charge;
pub mod config;
pub mod controller;
pub mod intent;
pub mod kinematic;
pub mod momentum;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::aerial::AerialPhase;
    pub use crate::backend::CharacterPhysicsBackend;
    pub use crate::body::{CameraBasis, CameraView, FlatGround, GroundLayers, GroundProbe, KinematicBody};
    pub use crate::charge::{ChargeBubble, ChargePhase, Launch};
    pub use crate::config::{ConfigError, ControllerConfig, RollMomentum};
    pub use crate::controller::{
        BlastController, ControllerError, ControllerEvent, ControllerStatus, MotionSink, SignalLog,
        Wiring,
    };
    pub use crate::intent::{InputFrame, MovementIntent};
    pub use crate::kinematic::KinematicBackend;
    pub use crate::state::{Airborne, ControllerState, Diving, Grounded, MotionSignals, Rolling};
    pub use crate::systems::{ControllerNotification, FollowCamera, RespawnRequest, SpeedBoost};
    pub use crate::{BlastControllerPlugin, BlastControllerSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::Rapier3dBackend;
}

/// System sets of the controller.
///
/// `Input` runs in `Update`. The others run in `FixedUpdate`, chained in
/// declaration order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlastControllerSet {
    /// Start controllers, handle respawns and boosts, run the input tick.
    Input,
    /// Backend housekeeping before sensing.
    Preparation,
    /// Backend ground detection.
    Sensors,
    /// Physics tick and marker sync.
    Controller,
    /// Backend applies accumulated forces or steps bodies.
    FinalApplication,
}

/// Main plugin for the blast-pack controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (velocity, impulses, ground probing).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `KinematicBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use blast_pack_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(BlastControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct BlastControllerPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for BlastControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for BlastControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::ControllerConfig>();
        app.register_type::<config::RollMomentum>();
        app.register_type::<body::GroundLayers>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<controller::BlastController>();
        app.register_type::<state::MotionSignals>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Diving>();
        app.register_type::<state::Rolling>();
        app.register_type::<systems::FollowCamera>();

        app.add_event::<systems::ControllerNotification>();
        app.add_event::<systems::RespawnRequest>();
        app.add_event::<systems::SpeedBoost>();

        app.configure_sets(
            FixedUpdate,
            (
                BlastControllerSet::Preparation,
                BlastControllerSet::Sensors,
                BlastControllerSet::Controller,
                BlastControllerSet::FinalApplication,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            Update,
            (
                systems::start_controllers::<B>,
                systems::apply_respawns::<B>,
                systems::apply_speed_boosts::<B>,
                systems::run_input_tick::<B>,
            )
                .chain()
                .in_set(BlastControllerSet::Input),
        );

        app.add_systems(
            FixedUpdate,
            (systems::run_physics_tick::<B>, systems::sync_state_markers)
                .chain()
                .in_set(BlastControllerSet::Controller),
        );
    }
}
