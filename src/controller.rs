//! The blast-pack controller.
//!
//! [`BlastController`] owns the [`ControllerState`] and drives the charge
//! jump, the aerial state machine and the momentum integrator from two
//! explicit entry points:
//!
//! - [`on_input_tick`](BlastController::on_input_tick), once per rendered
//!   frame: stores the sampled input and handles charge edges.
//! - [`on_physics_tick`](BlastController::on_physics_tick), once per fixed
//!   step: ground probe, state machine, then integration.
//!
//! The controller is engine-agnostic. It only sees a [`RigidBody`], a
//! [`GroundProbe`] and a [`CameraView`], and reports to a [`MotionSink`].

use bevy::prelude::*;
use thiserror::Error;

use crate::aerial::{self, AerialPhase, AerialTransitions};
use crate::body::{CameraView, GroundProbe, RigidBody};
use crate::charge::{self, ChargePhase, Launch};
use crate::config::{ConfigError, ControllerConfig, RollMomentum};
use crate::intent::{InputFrame, MovementIntent};
use crate::momentum::{self, MoveBasis};
use crate::state::{ControllerState, MotionSignals};

/// Wiring or configuration failure. Fatal to one controller instance.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no rigid body attached")]
    MissingRigidBody,

    #[error("no camera to steer by")]
    MissingCamera,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Lifecycle of a controller instance.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerStatus {
    /// Attached but not started yet.
    #[default]
    Pending,
    /// Running.
    Active,
    /// Failed to start. Ticks are ignored.
    Disabled,
}

/// Collaborators found when starting a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    pub has_rigid_body: bool,
    pub has_camera: bool,
}

impl Wiring {
    /// Everything present.
    pub const COMPLETE: Self = Self {
        has_rigid_body: true,
        has_camera: true,
    };
}

/// Discrete things that happened to the controller.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub enum ControllerEvent {
    ChargeStarted,
    Launched { force: f32, impulse: Vec3 },
    DiveStarted,
    DiveEnded,
    RollStarted,
    RollEnded,
    Respawned { position: Vec3 },
}

/// One-way receiver for animation, particle and audio hooks.
pub trait MotionSink {
    /// Continuous signals, pushed once per physics tick.
    fn signals(&mut self, signals: &MotionSignals);

    /// Discrete events, pushed as they happen.
    fn event(&mut self, _event: ControllerEvent) {}
}

impl MotionSink for () {
    fn signals(&mut self, _signals: &MotionSignals) {}
}

/// Sink that keeps the latest signals and every event.
#[derive(Debug, Clone, Default)]
pub struct SignalLog {
    pub latest: Option<MotionSignals>,
    pub events: Vec<ControllerEvent>,
}

impl SignalLog {
    /// Whether `event` was recorded.
    pub fn saw(&self, event: &ControllerEvent) -> bool {
        self.events.contains(event)
    }

    /// Drop recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl MotionSink for SignalLog {
    fn signals(&mut self, signals: &MotionSignals) {
        self.latest = Some(*signals);
    }

    fn event(&mut self, event: ControllerEvent) {
        self.events.push(event);
    }
}

/// Blast-pack character controller.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use blast_pack_controller::prelude::*;
///
/// let config = ControllerConfig::default();
/// let ground = FlatGround::at(0.0);
/// let camera = CameraBasis::default();
/// let mut body = KinematicBody::resting_on(&ground);
/// let mut controller = BlastController::new();
/// controller.start(&config, Wiring::COMPLETE).unwrap();
///
/// let dt = 1.0 / 60.0;
/// controller.on_input_tick(0.0, InputFrame::new(0.0, 1.0), &config, &mut body, &camera, &mut ());
/// controller.on_physics_tick(0.0, dt, &config, &mut body, &ground, &camera, &mut ());
/// body.step(dt, Some(&ground));
///
/// assert!(controller.current_speed() > 0.0);
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
#[require(ControllerConfig, MovementIntent, MotionSignals)]
pub struct BlastController {
    state: ControllerState,
    input: InputFrame,
    status: ControllerStatus,
}

impl BlastController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate wiring and config and become active.
    ///
    /// On failure the instance disables itself, logs the cause and ignores
    /// every following tick.
    pub fn start(&mut self, config: &ControllerConfig, wiring: Wiring) -> Result<(), ControllerError> {
        match Self::check(config, wiring) {
            Ok(()) => {
                self.status = ControllerStatus::Active;
                Ok(())
            }
            Err(err) => {
                self.disable(&err);
                Err(err)
            }
        }
    }

    /// Stop ticking for good, logging `reason`. Used when a collaborator
    /// goes missing after start.
    pub fn disable(&mut self, reason: &ControllerError) {
        error!("blast controller disabled: {reason}");
        self.status = ControllerStatus::Disabled;
    }

    fn check(config: &ControllerConfig, wiring: Wiring) -> Result<(), ControllerError> {
        if !wiring.has_rigid_body {
            return Err(ControllerError::MissingRigidBody);
        }
        if !wiring.has_camera {
            return Err(ControllerError::MissingCamera);
        }
        config.validate()?;
        Ok(())
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ControllerStatus::Active
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Input stored by the latest input tick.
    pub fn input(&self) -> InputFrame {
        self.input
    }

    /// Horizontal speed, for speed readouts.
    pub fn current_speed(&self) -> f32 {
        self.state.current_speed
    }

    pub fn phase(&self) -> AerialPhase {
        AerialPhase::of(&self.state)
    }

    pub fn charge_phase(&self) -> ChargePhase {
        ChargePhase::of(&self.state)
    }

    /// Normalized charge at `now`, 0.0 when not charging.
    pub fn charge_fraction(&self, now: f32, config: &ControllerConfig) -> f32 {
        charge::charge_fraction(&self.state, now, config)
    }

    /// Snapshot of the continuous motion signals.
    pub fn signals(&self, now: f32, config: &ControllerConfig) -> MotionSignals {
        let normalized_speed = if config.max_speed > 0.0 {
            self.state.current_speed / config.max_speed
        } else {
            0.0
        };
        MotionSignals {
            normalized_speed,
            is_grounded: self.state.is_grounded,
            is_diving: self.state.is_diving,
            is_rolling: self.state.is_rolling,
            is_charging: self.state.is_charging,
            charge_fraction: self.charge_fraction(now, config),
        }
    }

    /// Per-frame tick: store `frame` and advance the charge jump.
    ///
    /// Returns the launch fired this frame, if any. The launch impulse has
    /// already been applied to `body`.
    pub fn on_input_tick(
        &mut self,
        now: f32,
        frame: InputFrame,
        config: &ControllerConfig,
        body: &mut impl RigidBody,
        camera: &impl CameraView,
        sink: &mut impl MotionSink,
    ) -> Option<Launch> {
        if !self.is_active() {
            return None;
        }
        self.input = frame;

        if frame.jump_pressed {
            if charge::try_start(&mut self.state, now, config) {
                sink.event(ControllerEvent::ChargeStarted);
            } else if !self.state.is_charging {
                debug!("charge press dropped, launch cooling down");
            }
        }

        let forward = momentum::flatten(camera.forward());
        let launch = charge::update(&mut self.state, &frame, now, config, forward)?;
        body.add_impulse(launch.impulse);
        debug!(
            "blast launch: held {:.2}s, force {:.1}, impulse {}",
            launch.held, launch.total_force, launch.impulse
        );
        sink.event(ControllerEvent::Launched {
            force: launch.total_force,
            impulse: launch.impulse,
        });
        Some(launch)
    }

    /// Fixed-step tick: probe the ground, run the aerial state machine, then
    /// integrate momentum and write the body.
    pub fn on_physics_tick(
        &mut self,
        now: f32,
        dt: f32,
        config: &ControllerConfig,
        body: &mut impl RigidBody,
        probe: &impl GroundProbe,
        camera: &impl CameraView,
        sink: &mut impl MotionSink,
    ) {
        if !self.is_active() {
            return;
        }

        let basis = MoveBasis::from_camera(camera);
        let grounded = probe.is_grounded(body.position(), config.ground_check_distance, config.ground_layers);
        let input = self.input;
        let desired = momentum::desired_direction(&basis, &input, grounded, config);

        let (speed, direction) =
            momentum::read_back(body.linear_velocity(), desired, self.state.velocity_direction);
        self.state.current_speed = speed;
        self.state.velocity_direction = direction;

        let transitions = aerial::update(&mut self.state, grounded, &input, now, config);
        if transitions.roll_started {
            let entry = aerial::roll_entry_speed(self.state.current_speed, config);
            self.state.current_speed = entry;
            self.state.roll_velocity = self.state.velocity_direction * entry;
            write_horizontal(body, self.state.roll_velocity);
        }
        report(transitions, sink);

        if let Some(force) = aerial::dive_force(&self.state, config) {
            body.add_force(force);
        }

        if self.state.is_rolling {
            match config.roll_momentum {
                RollMomentum::Freeze => {
                    write_horizontal(body, self.state.roll_velocity);
                    self.state.current_speed = self.state.roll_velocity.length();
                }
                RollMomentum::Coast => {
                    self.state.current_speed = self.state.current_speed.min(config.speed_ceiling(false));
                }
            }
        } else {
            let boost = aerial::dive_active(&self.state, config);
            let horizontal = momentum::integrate(&mut self.state, desired, dt, boost, config);
            write_horizontal(body, horizontal);
        }

        let facing = momentum::facing_rotation(body.rotation(), basis.forward, dt, config);
        body.move_rotation(facing);

        sink.signals(&self.signals(now, config));
        aerial::end_tick(&mut self.state);
    }

    /// Teleport to `position`, stop, and drop any charge, dive or roll.
    pub fn respawn(&mut self, position: Vec3, body: &mut impl RigidBody, sink: &mut impl MotionSink) {
        body.move_position(position);
        body.set_linear_velocity(Vec3::ZERO);
        self.state.clear_transient();
        self.input = InputFrame::neutral();
        info!("respawned at {position}");
        sink.event(ControllerEvent::Respawned { position });
    }
}

/// Overwrite horizontal velocity, keeping the body's vertical component.
fn write_horizontal(body: &mut impl RigidBody, horizontal: Vec3) {
    let vertical = body.linear_velocity().y;
    body.set_linear_velocity(Vec3::new(horizontal.x, vertical, horizontal.z));
}

fn report(transitions: AerialTransitions, sink: &mut impl MotionSink) {
    if transitions.roll_ended {
        debug!("roll ended");
        sink.event(ControllerEvent::RollEnded);
    }
    if transitions.dive_ended {
        debug!("dive ended");
        sink.event(ControllerEvent::DiveEnded);
    }
    if transitions.roll_started {
        debug!("dive landing, rolling");
        sink.event(ControllerEvent::RollStarted);
    }
    if transitions.dive_started {
        debug!("dive started");
        sink.event(ControllerEvent::DiveStarted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{CameraBasis, FlatGround, KinematicBody};

    const DT: f32 = 1.0 / 60.0;

    fn started(config: &ControllerConfig) -> BlastController {
        let mut controller = BlastController::new();
        controller.start(config, Wiring::COMPLETE).unwrap();
        controller
    }

    #[test]
    fn missing_camera_disables() {
        let config = ControllerConfig::default();
        let mut controller = BlastController::new();
        let result = controller.start(
            &config,
            Wiring {
                has_rigid_body: true,
                has_camera: false,
            },
        );
        assert!(matches!(result, Err(ControllerError::MissingCamera)));
        assert_eq!(controller.status(), ControllerStatus::Disabled);
    }

    #[test]
    fn missing_body_disables() {
        let config = ControllerConfig::default();
        let mut controller = BlastController::new();
        let result = controller.start(
            &config,
            Wiring {
                has_rigid_body: false,
                has_camera: true,
            },
        );
        assert!(matches!(result, Err(ControllerError::MissingRigidBody)));
    }

    #[test]
    fn invalid_config_disables() {
        let config = ControllerConfig::default().with_max_speed(-1.0);
        let mut controller = BlastController::new();
        let result = controller.start(&config, Wiring::COMPLETE);
        assert!(matches!(result, Err(ControllerError::InvalidConfig(_))));
        assert!(!controller.is_active());
    }

    #[test]
    fn disable_after_start_stops_ticks() {
        let config = ControllerConfig::default();
        let ground = FlatGround::at(0.0);
        let camera = CameraBasis::default();
        let mut body = KinematicBody::resting_on(&ground);
        let mut controller = started(&config);

        controller.disable(&ControllerError::MissingCamera);
        assert_eq!(controller.status(), ControllerStatus::Disabled);

        controller.on_input_tick(0.0, InputFrame::new(0.0, 1.0), &config, &mut body, &camera, &mut ());
        controller.on_physics_tick(0.0, DT, &config, &mut body, &ground, &camera, &mut ());
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn disabled_controller_ignores_ticks() {
        let config = ControllerConfig::default();
        let ground = FlatGround::at(0.0);
        let camera = CameraBasis::default();
        let mut body = KinematicBody::resting_on(&ground);
        let mut controller = BlastController::new();

        let frame = InputFrame::new(0.0, 1.0).with_jump_pressed();
        assert!(controller
            .on_input_tick(0.0, frame, &config, &mut body, &camera, &mut ())
            .is_none());
        controller.on_physics_tick(0.0, DT, &config, &mut body, &ground, &camera, &mut ());

        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(!controller.state().is_charging);
    }

    #[test]
    fn release_launches_along_camera() {
        let config = ControllerConfig::default()
            .with_blast_force(10.0, 25.0)
            .with_max_charge_time(1.5)
            .with_launch_ratios(0.6, 1.0);
        let ground = FlatGround::at(0.0);
        let camera = CameraBasis::default();
        let mut body = KinematicBody::resting_on(&ground);
        let mut controller = started(&config);
        let mut log = SignalLog::default();

        let press = InputFrame::neutral().with_jump_pressed();
        controller.on_input_tick(1.0, press, &config, &mut body, &camera, &mut log);
        assert!(log.saw(&ControllerEvent::ChargeStarted));

        let release = InputFrame::neutral().with_jump_released();
        let launch = controller
            .on_input_tick(1.75, release, &config, &mut body, &camera, &mut log)
            .unwrap();

        assert_eq!(launch.base_force, 17.5);
        assert!((body.velocity - Vec3::new(0.0, 10.5, -17.5)).length() < 1e-4);
        assert!(matches!(log.events.last(), Some(ControllerEvent::Launched { .. })));
    }

    #[test]
    fn physics_tick_reports_signals() {
        let config = ControllerConfig::default();
        let ground = FlatGround::at(0.0);
        let camera = CameraBasis::default();
        let mut body = KinematicBody::resting_on(&ground);
        let mut controller = started(&config);
        let mut log = SignalLog::default();

        controller.on_input_tick(0.0, InputFrame::new(0.0, 1.0), &config, &mut body, &camera, &mut log);
        controller.on_physics_tick(0.0, DT, &config, &mut body, &ground, &camera, &mut log);

        let signals = log.latest.unwrap();
        assert!(signals.is_grounded);
        assert!(signals.normalized_speed > 0.0);
        assert!(body.velocity.z < 0.0);
    }

    #[test]
    fn respawn_clears_transient_state() {
        let config = ControllerConfig::default();
        let camera = CameraBasis::default();
        let ground = FlatGround::at(0.0);
        let mut body = KinematicBody::at(Vec3::new(0.0, 10.0, 0.0)).with_velocity(Vec3::new(8.0, -3.0, 0.0));
        let mut controller = started(&config);
        let mut log = SignalLog::default();

        controller.on_input_tick(0.0, InputFrame::new(0.0, -1.0).with_jump_pressed(), &config, &mut body, &camera, &mut log);
        controller.on_physics_tick(0.0, DT, &config, &mut body, &ground, &camera, &mut log);
        assert!(controller.state().is_diving);
        assert!(controller.state().is_charging);

        let spawn = Vec3::new(1.0, 1.0, 2.0);
        controller.respawn(spawn, &mut body, &mut log);

        assert_eq!(body.position, spawn);
        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(!controller.state().is_charging);
        assert!(!controller.state().is_diving);
        assert!(!controller.state().was_diving);
        assert!(!controller.state().is_rolling);
        assert_eq!(controller.input(), InputFrame::neutral());
        assert!(log.saw(&ControllerEvent::Respawned { position: spawn }));
    }
}
