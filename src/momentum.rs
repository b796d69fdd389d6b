//! Momentum integration.
//!
//! Speed is a scalar that builds up along camera-relative input and bleeds
//! off through decay. Each physics tick:
//!
//! 1. flatten the camera basis onto the horizontal plane
//! 2. derive the desired direction from input
//! 3. read speed and direction back from the body
//! 4. decay, blend toward `desired * max_speed`, clamp to the ceiling
//!
//! Vertical velocity is never touched here; gravity, launches and dive forces
//! own it.

use bevy::prelude::*;

use crate::body::CameraView;
use crate::config::ControllerConfig;
use crate::intent::InputFrame;
use crate::state::ControllerState;

/// Horizontal speed below which the body reads as stationary.
pub const READ_BACK_EPSILON: f32 = 0.01;

/// Desired-direction magnitude below which there is no steering intent.
pub const DESIRED_EPSILON: f32 = 0.01;

/// Project `v` onto the horizontal plane and normalize.
///
/// Returns zero for vertical or degenerate input.
#[inline]
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z).normalize_or_zero()
}

/// Level steering basis derived from the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveBasis {
    pub forward: Vec3,
    pub right: Vec3,
}

impl MoveBasis {
    pub fn from_camera(camera: &impl CameraView) -> Self {
        Self {
            forward: flatten(camera.forward()),
            right: flatten(camera.right()),
        }
    }
}

/// Desired movement direction for this tick, length at most 1.
///
/// Forward follows the positive vertical axis as a throttle. Sideways input
/// only steers in the air, scaled by `lateral_air_control`. Zero input gives
/// zero, which holds the current velocity and lets decay act.
pub fn desired_direction(
    basis: &MoveBasis,
    input: &InputFrame,
    grounded: bool,
    config: &ControllerConfig,
) -> Vec3 {
    let mut desired = basis.forward * input.throttle();
    if !grounded {
        desired += basis.right * (input.horizontal * config.lateral_air_control);
    }
    desired.clamp_length_max(1.0)
}

/// Speed and direction recovered from the body's velocity.
///
/// Below [`READ_BACK_EPSILON`] the body reads as stationary and the direction
/// falls back to `desired`, or `previous` when there is no desire either.
pub fn read_back(velocity: Vec3, desired: Vec3, previous: Vec3) -> (f32, Vec3) {
    let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
    let speed = horizontal.length();
    if speed > READ_BACK_EPSILON {
        return (speed, horizontal / speed);
    }

    let fallback = desired.normalize_or_zero();
    if fallback != Vec3::ZERO {
        (0.0, fallback)
    } else {
        (0.0, previous)
    }
}

/// Speed after one tick of decay, floored at 0.
pub fn apply_decay(speed: f32, grounded: bool, dt: f32, config: &ControllerConfig) -> f32 {
    let ratio = if grounded { config.ground_decay_ratio } else { 1.0 };
    (speed - config.decay_rate * ratio * dt).max(0.0)
}

/// Acceleration taper: `1 - (speed / max_speed)^accel_exponent`, in `[0, 1]`.
///
/// Strong from rest and fading to nothing at `max_speed`.
pub fn accel_factor(speed: f32, config: &ControllerConfig) -> f32 {
    if config.max_speed <= 0.0 {
        return 0.0;
    }
    let ratio = (speed / config.max_speed).max(0.0);
    (1.0 - ratio.powf(config.accel_exponent)).clamp(0.0, 1.0)
}

/// Blend the current horizontal velocity toward `desired * max_speed`.
pub fn blend(current: Vec3, desired: Vec3, speed: f32, dt: f32, config: &ControllerConfig) -> Vec3 {
    if desired.length() <= DESIRED_EPSILON {
        return current;
    }
    let t = (accel_factor(speed, config) * config.acceleration * dt).clamp(0.0, 1.0);
    current.lerp(desired * config.max_speed, t)
}

/// Run decay, blending and the dive gain on `state`, then clamp to the
/// ceiling. Returns the horizontal velocity to write to the body.
///
/// Expects `state.current_speed` and `state.velocity_direction` to hold this
/// tick's read-back.
pub fn integrate(
    state: &mut ControllerState,
    desired: Vec3,
    dt: f32,
    dive_boost: bool,
    config: &ControllerConfig,
) -> Vec3 {
    let speed = apply_decay(state.current_speed, state.is_grounded, dt, config);
    let velocity = blend(state.velocity_direction * speed, desired, speed, dt, config);

    let mut speed = velocity.length();
    if speed > READ_BACK_EPSILON {
        state.velocity_direction = velocity / speed;
    }
    if dive_boost {
        speed += config.dive_speed_gain * dt;
    }

    state.current_speed = speed.clamp(0.0, config.speed_ceiling(state.is_diving));
    state.horizontal_velocity()
}

/// Facing rotation slerped toward the level camera forward.
///
/// Returns `current` unchanged when the camera has no level forward.
pub fn facing_rotation(current: Quat, forward: Vec3, dt: f32, config: &ControllerConfig) -> Quat {
    if forward == Vec3::ZERO {
        return current;
    }
    let target = Transform::IDENTITY.looking_to(forward, Vec3::Y).rotation;
    current.slerp(target, (config.rotation_speed * dt).clamp(0.0, 1.0))
}

/// Impulse for a speed ring: `strength` along the current velocity.
///
/// Zero when the body is not moving.
pub fn speed_boost_impulse(velocity: Vec3, strength: f32) -> Vec3 {
    velocity.normalize_or_zero() * strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::CameraBasis;

    const DT: f32 = 1.0 / 60.0;

    fn basis() -> MoveBasis {
        MoveBasis::from_camera(&CameraBasis::default())
    }

    #[test]
    fn flatten_drops_pitch() {
        let pitched = Vec3::new(0.0, -0.5, -1.0);
        assert!((flatten(pitched) - Vec3::NEG_Z).length() < 1e-6);
        assert_eq!(flatten(Vec3::NEG_Y), Vec3::ZERO);
    }

    #[test]
    fn grounded_ignores_sideways_input() {
        let config = ControllerConfig::default();
        let input = InputFrame::new(1.0, 1.0);
        assert_eq!(desired_direction(&basis(), &input, true, &config), Vec3::NEG_Z);
    }

    #[test]
    fn airborne_sideways_input_steers_and_is_clamped() {
        let config = ControllerConfig {
            lateral_air_control: 1.0,
            ..default()
        };
        let input = InputFrame::new(1.0, 1.0);
        let desired = desired_direction(&basis(), &input, false, &config);
        assert!((desired.length() - 1.0).abs() < 1e-5);
        assert!(desired.x > 0.0 && desired.z < 0.0);
    }

    #[test]
    fn zero_input_has_no_desire() {
        let config = ControllerConfig::default();
        let desired = desired_direction(&basis(), &InputFrame::neutral(), false, &config);
        assert_eq!(desired, Vec3::ZERO);
    }

    #[test]
    fn read_back_uses_horizontal_velocity() {
        let (speed, dir) = read_back(Vec3::new(3.0, -20.0, 4.0), Vec3::ZERO, Vec3::ZERO);
        assert!((speed - 5.0).abs() < 1e-5);
        assert!((dir - Vec3::new(0.6, 0.0, 0.8)).length() < 1e-5);
    }

    #[test]
    fn read_back_falls_back_when_stationary() {
        let (speed, dir) = read_back(Vec3::new(0.001, 5.0, 0.0), Vec3::NEG_Z, Vec3::X);
        assert_eq!(speed, 0.0);
        assert_eq!(dir, Vec3::NEG_Z);

        let (_, dir) = read_back(Vec3::ZERO, Vec3::ZERO, Vec3::X);
        assert_eq!(dir, Vec3::X);
    }

    #[test]
    fn decay_is_halved_on_ground_and_floored() {
        let config = ControllerConfig::default().with_decay(2.0, 0.5);
        assert_eq!(apply_decay(10.0, false, 0.5, &config), 9.0);
        assert_eq!(apply_decay(10.0, true, 0.5, &config), 9.5);
        assert_eq!(apply_decay(0.2, false, 1.0, &config), 0.0);
    }

    #[test]
    fn accel_factor_tapers_to_zero_at_max() {
        let config = ControllerConfig::default().with_max_speed(30.0).with_accel_exponent(2.0);
        assert_eq!(accel_factor(0.0, &config), 1.0);
        assert_eq!(accel_factor(15.0, &config), 0.75);
        assert_eq!(accel_factor(30.0, &config), 0.0);
        assert_eq!(accel_factor(40.0, &config), 0.0);
    }

    #[test]
    fn forward_input_from_rest_gains_speed() {
        let config = ControllerConfig::default().with_max_speed(30.0);
        let mut state = ControllerState {
            is_grounded: true,
            velocity_direction: Vec3::NEG_Z,
            ..default()
        };
        let desired = desired_direction(&basis(), &InputFrame::new(0.0, 1.0), true, &config);

        let velocity = integrate(&mut state, desired, DT, false, &config);
        assert!(state.current_speed > 0.0);
        assert!(state.current_speed <= 30.0);
        assert!(velocity.z < 0.0);
        assert_eq!(velocity.y, 0.0);
    }

    #[test]
    fn holding_forward_never_exceeds_max_speed() {
        let config = ControllerConfig::default().with_max_speed(30.0).with_movement(30.0, 50.0);
        let mut state = ControllerState {
            is_grounded: true,
            velocity_direction: Vec3::NEG_Z,
            ..default()
        };
        for _ in 0..600 {
            integrate(&mut state, Vec3::NEG_Z, DT, false, &config);
            assert!(state.current_speed <= 30.0);
        }
        assert!(state.current_speed > 25.0);
    }

    #[test]
    fn zero_input_decays_monotonically_to_rest() {
        let config = ControllerConfig::default();
        let mut state = ControllerState {
            current_speed: 3.0,
            velocity_direction: Vec3::X,
            ..default()
        };
        let mut previous = state.current_speed;
        for _ in 0..200 {
            integrate(&mut state, Vec3::ZERO, DT, false, &config);
            if previous > 0.0 {
                assert!(state.current_speed < previous);
            } else {
                assert_eq!(state.current_speed, 0.0);
            }
            previous = state.current_speed;
        }
        assert_eq!(state.current_speed, 0.0);
        assert_eq!(state.velocity_direction, Vec3::X);
    }

    #[test]
    fn dive_boost_raises_ceiling() {
        let config = ControllerConfig::default().with_max_speed(20.0);
        let mut state = ControllerState {
            current_speed: 20.0,
            velocity_direction: Vec3::NEG_Z,
            is_diving: true,
            ..default()
        };
        for _ in 0..600 {
            integrate(&mut state, Vec3::ZERO, DT, true, &config);
            assert!(state.current_speed <= 25.0);
        }
        assert!(state.current_speed > 20.0);

        state.is_diving = false;
        integrate(&mut state, Vec3::ZERO, DT, false, &config);
        assert!(state.current_speed <= 20.0);
    }

    #[test]
    fn facing_turns_toward_camera_forward() {
        let config = ControllerConfig {
            rotation_speed: 5.0,
            ..default()
        };
        let target = Transform::IDENTITY.looking_to(Vec3::X, Vec3::Y).rotation;
        let mut rotation = Quat::IDENTITY;
        let start = rotation.angle_between(target);
        rotation = facing_rotation(rotation, Vec3::X, DT, &config);
        assert!(rotation.angle_between(target) < start);

        for _ in 0..200 {
            rotation = facing_rotation(rotation, Vec3::X, DT, &config);
        }
        assert!(rotation.angle_between(target) < 1e-3);
    }

    #[test]
    fn facing_holds_without_level_forward() {
        let config = ControllerConfig::default();
        let rotation = Quat::from_rotation_y(0.3);
        assert_eq!(facing_rotation(rotation, Vec3::ZERO, DT, &config), rotation);
    }

    #[test]
    fn speed_boost_follows_velocity() {
        let impulse = speed_boost_impulse(Vec3::new(0.0, 0.0, -4.0), 10.0);
        assert_eq!(impulse, Vec3::new(0.0, 0.0, -10.0));
        assert_eq!(speed_boost_impulse(Vec3::ZERO, 10.0), Vec3::ZERO);
    }
}
