//! Controller state.
//!
//! [`ControllerState`] is the single state bag shared by the charge jump,
//! the aerial state machine and the momentum integrator. The marker
//! components below mirror it onto the entity so gameplay and animation
//! systems can filter with `With<Diving>` and friends; they are synced by
//! the controller systems and never read back.

use bevy::prelude::*;

/// Mutable per-character state.
///
/// Timestamps are seconds on the host's monotonic clock. Fields documented
/// as "valid only while ..." hold stale values otherwise.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// Horizontal speed after decay, within `[0, speed ceiling]`.
    pub current_speed: f32,
    /// Horizontal unit direction the speed is applied along (y is always 0).
    pub velocity_direction: Vec3,

    /// Charge button held and cooldown elapsed.
    pub is_charging: bool,
    /// When charging began. Valid only while `is_charging`.
    pub charge_start_time: f32,
    /// Last successful launch, if any.
    pub last_launch_time: Option<f32>,

    /// Ground probe result of the latest physics tick.
    pub is_grounded: bool,
    /// Airborne with strong downward input.
    pub is_diving: bool,
    /// `is_diving` as of the end of the previous physics tick.
    pub was_diving: bool,
    /// When the last dive ended, if any.
    pub last_dive_end: Option<f32>,

    /// Post-dive recovery lock.
    pub is_rolling: bool,
    /// Roll entry time. Valid only while `is_rolling`.
    pub roll_start_time: f32,
    /// Horizontal velocity at roll entry. Valid only while `is_rolling`.
    pub roll_velocity: Vec3,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            current_speed: 0.0,
            velocity_direction: Vec3::ZERO,
            is_charging: false,
            charge_start_time: 0.0,
            last_launch_time: None,
            is_grounded: false,
            is_diving: false,
            was_diving: false,
            last_dive_end: None,
            is_rolling: false,
            roll_start_time: 0.0,
            roll_velocity: Vec3::ZERO,
        }
    }
}

impl ControllerState {
    /// Clear every transient flag. Used on respawn so nothing stays stuck
    /// mid-charge, mid-dive or mid-roll. Cooldown timestamps are kept.
    pub fn clear_transient(&mut self) {
        self.current_speed = 0.0;
        self.is_charging = false;
        self.charge_start_time = 0.0;
        self.is_diving = false;
        self.was_diving = false;
        self.is_rolling = false;
        self.roll_start_time = 0.0;
        self.roll_velocity = Vec3::ZERO;
    }

    /// Horizontal velocity implied by speed and direction.
    pub fn horizontal_velocity(&self) -> Vec3 {
        self.velocity_direction * self.current_speed
    }
}

/// One-way motion signals for animation, particle and audio sinks.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct MotionSignals {
    /// `current_speed / max_speed`; may exceed 1.0 while diving.
    pub normalized_speed: f32,
    pub is_grounded: bool,
    pub is_diving: bool,
    pub is_rolling: bool,
    pub is_charging: bool,
    /// Normalized charge (0.0-1.0) while charging, 0.0 otherwise.
    pub charge_fraction: f32,
}

/// Marker component indicating the character is grounded.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating an active dive.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Diving;

/// Marker component indicating the post-dive roll.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Rolling;
