//! Controller tuning.
//!
//! Every number the controller uses lives in [`ControllerConfig`]. The config
//! is a reflected component (so it can be tweaked live in an inspector),
//! serializable with serde, and can be loaded from a RON tuning file with
//! [`ControllerConfig::from_ron`].

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::body::GroundLayers;

/// Errors produced while loading or validating a [`ControllerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse controller config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid controller config: `{field}` {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// What happens to horizontal velocity while the character rolls after a
/// dive landing.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RollMomentum {
    /// Horizontal velocity is pinned to its value at roll entry for the whole
    /// roll. External pushes are overwritten every tick.
    #[default]
    Freeze,
    /// The controller stops writing horizontal velocity during the roll;
    /// whatever the body carries keeps going, undecayed.
    Coast,
}

/// Configuration parameters for the blast-pack controller.
///
/// Units are meters, seconds and newtons (impulses in newton-seconds).
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct ControllerConfig {
    // === Movement ===
    /// Top horizontal speed reachable by steering.
    pub max_speed: f32,

    /// Facing slerp rate toward camera forward (per second).
    pub rotation_speed: f32,

    /// Speed lost per second with no input, in the air.
    pub decay_rate: f32,

    /// Multiplier on `decay_rate` while grounded, in `(0, 1]`.
    pub ground_decay_ratio: f32,

    /// Exponent of the acceleration taper. Higher keeps acceleration strong
    /// until close to `max_speed`.
    pub accel_exponent: f32,

    /// Multiplier on the velocity blend rate.
    pub acceleration: f32,

    /// How much sideways input steers while airborne (0.0-1.0).
    pub lateral_air_control: f32,

    // === Blast pack ===
    /// Launch force at zero charge.
    pub min_blast_force: f32,

    /// Launch force at full charge.
    pub max_blast_force: f32,

    /// Seconds of holding for a full charge. Charging auto-launches here.
    pub max_charge_time: f32,

    /// Share of the launch force applied upward.
    pub upward_ratio: f32,

    /// Share of the launch force applied along camera forward.
    pub forward_ratio: f32,

    /// Seconds after a launch before a new charge may start.
    pub jump_cooldown: f32,

    /// Extra launch force per unit of normalized speed:
    /// `force *= 1 + launch_speed_bonus * speed / max_speed`.
    pub launch_speed_bonus: f32,

    // === Dive ===
    /// Vertical input below this value while airborne starts a dive.
    pub dive_input_threshold: f32,

    /// Downward dive force. The forward push is this times `dive_forward_multiplier`.
    pub dive_force: f32,

    /// Forward dive force as a fraction of `dive_force`.
    pub dive_forward_multiplier: f32,

    /// Dive forces only apply above this speed.
    pub min_speed_for_dive: f32,

    /// Speed ceiling while diving, as a multiple of `max_speed`.
    pub dive_speed_ceiling: f32,

    /// Speed gained per second while diving fast enough.
    pub dive_speed_gain: f32,

    /// Seconds after a dive ends before another may start.
    pub dive_cooldown: f32,

    // === Roll ===
    /// Length of the post-dive roll.
    pub roll_duration: f32,

    /// Horizontal velocity policy while rolling.
    pub roll_momentum: RollMomentum,

    /// Bleed speed when landing from a dive:
    /// `speed = max(speed * dive_landing_speed_factor, min_speed_for_dive)`.
    pub dive_landing_damping: bool,

    /// Factor used by `dive_landing_damping`.
    pub dive_landing_speed_factor: f32,

    // === Ground check ===
    /// Length of the downward ground probe from the body origin.
    pub ground_check_distance: f32,

    /// Layers that count as ground.
    pub ground_layers: GroundLayers,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_speed: 30.0,
            rotation_speed: 5.0,
            decay_rate: 2.0,
            ground_decay_ratio: 0.5,
            accel_exponent: 2.0,
            acceleration: 1.0,
            lateral_air_control: 0.5,

            min_blast_force: 10.0,
            max_blast_force: 25.0,
            max_charge_time: 1.5,
            upward_ratio: 0.6,
            forward_ratio: 1.0,
            jump_cooldown: 1.5,
            launch_speed_bonus: 0.5,

            dive_input_threshold: -0.5,
            dive_force: 20.0,
            dive_forward_multiplier: 0.5,
            min_speed_for_dive: 5.0,
            dive_speed_ceiling: 1.25,
            dive_speed_gain: 6.0,
            dive_cooldown: 0.25,

            roll_duration: 0.5,
            roll_momentum: RollMomentum::Freeze,
            dive_landing_damping: false,
            dive_landing_speed_factor: 0.7,

            ground_check_distance: 1.1,
            ground_layers: GroundLayers::ALL,
        }
    }
}

impl ControllerConfig {
    /// Snappy tuning: fast blend, short cooldowns.
    pub fn arcade() -> Self {
        Self {
            acceleration: 3.0,
            accel_exponent: 3.0,
            decay_rate: 1.0,
            jump_cooldown: 0.5,
            max_charge_time: 1.0,
            lateral_air_control: 0.8,
            ..default()
        }
    }

    /// Heavy tuning: slow to build speed, keeps it longer, damped dive landings.
    pub fn heavy() -> Self {
        Self {
            max_speed: 24.0,
            acceleration: 0.6,
            accel_exponent: 1.5,
            decay_rate: 0.8,
            min_blast_force: 14.0,
            max_blast_force: 30.0,
            dive_force: 30.0,
            dive_landing_damping: true,
            roll_duration: 0.8,
            ..default()
        }
    }

    /// Parse a RON tuning file and validate it. Missing fields take their
    /// default values.
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tunings the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        }

        let positive = [
            ("max_speed", self.max_speed),
            ("max_charge_time", self.max_charge_time),
            ("roll_duration", self.roll_duration),
            ("accel_exponent", self.accel_exponent),
            ("dive_speed_ceiling", self.dive_speed_ceiling),
            ("decay_rate", self.decay_rate),
            ("ground_decay_ratio", self.ground_decay_ratio),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return invalid(field, "must be positive and finite");
            }
        }

        let non_negative = [
            ("rotation_speed", self.rotation_speed),
            ("acceleration", self.acceleration),
            ("lateral_air_control", self.lateral_air_control),
            ("min_blast_force", self.min_blast_force),
            ("max_blast_force", self.max_blast_force),
            ("upward_ratio", self.upward_ratio),
            ("forward_ratio", self.forward_ratio),
            ("jump_cooldown", self.jump_cooldown),
            ("launch_speed_bonus", self.launch_speed_bonus),
            ("dive_force", self.dive_force),
            ("dive_forward_multiplier", self.dive_forward_multiplier),
            ("min_speed_for_dive", self.min_speed_for_dive),
            ("dive_speed_gain", self.dive_speed_gain),
            ("dive_cooldown", self.dive_cooldown),
            ("dive_landing_speed_factor", self.dive_landing_speed_factor),
            ("ground_check_distance", self.ground_check_distance),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(field, "must be non-negative and finite");
            }
        }

        if self.min_blast_force > self.max_blast_force {
            return invalid("min_blast_force", "must not exceed max_blast_force");
        }
        if self.ground_decay_ratio > 1.0 {
            return invalid("ground_decay_ratio", "must not exceed 1.0");
        }
        if self.dive_speed_ceiling < 1.0 {
            return invalid("dive_speed_ceiling", "must be at least 1.0");
        }
        if !(-1.0..=0.0).contains(&self.dive_input_threshold) {
            return invalid("dive_input_threshold", "must be within [-1, 0]");
        }
        Ok(())
    }

    /// Speed ceiling for the current dive state.
    #[inline]
    pub fn speed_ceiling(&self, diving: bool) -> f32 {
        if diving {
            self.max_speed * self.dive_speed_ceiling
        } else {
            self.max_speed
        }
    }

    /// Builder: set movement parameters.
    pub fn with_movement(mut self, max_speed: f32, acceleration: f32) -> Self {
        self.max_speed = max_speed;
        self.acceleration = acceleration;
        self
    }

    /// Builder: set max speed.
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Builder: set decay rate and its grounded ratio.
    pub fn with_decay(mut self, rate: f32, ground_ratio: f32) -> Self {
        self.decay_rate = rate;
        self.ground_decay_ratio = ground_ratio;
        self
    }

    /// Builder: set the acceleration taper exponent.
    pub fn with_accel_exponent(mut self, exponent: f32) -> Self {
        self.accel_exponent = exponent;
        self
    }

    /// Builder: set blast force range.
    pub fn with_blast_force(mut self, min: f32, max: f32) -> Self {
        self.min_blast_force = min;
        self.max_blast_force = max;
        self
    }

    /// Builder: set full-charge time.
    pub fn with_max_charge_time(mut self, seconds: f32) -> Self {
        self.max_charge_time = seconds;
        self
    }

    /// Builder: set launch cooldown.
    pub fn with_jump_cooldown(mut self, seconds: f32) -> Self {
        self.jump_cooldown = seconds;
        self
    }

    /// Builder: set the upward/forward split of the launch force.
    pub fn with_launch_ratios(mut self, upward: f32, forward: f32) -> Self {
        self.upward_ratio = upward;
        self.forward_ratio = forward;
        self
    }

    /// Builder: set dive force and the minimum speed for it to apply.
    pub fn with_dive(mut self, force: f32, min_speed: f32) -> Self {
        self.dive_force = force;
        self.min_speed_for_dive = min_speed;
        self
    }

    /// Builder: set dive cooldown.
    pub fn with_dive_cooldown(mut self, seconds: f32) -> Self {
        self.dive_cooldown = seconds;
        self
    }

    /// Builder: set roll duration.
    pub fn with_roll_duration(mut self, seconds: f32) -> Self {
        self.roll_duration = seconds;
        self
    }

    /// Builder: set the roll momentum policy.
    pub fn with_roll_momentum(mut self, policy: RollMomentum) -> Self {
        self.roll_momentum = policy;
        self
    }

    /// Builder: enable or disable speed damping on dive landings.
    pub fn with_dive_landing_damping(mut self, enabled: bool) -> Self {
        self.dive_landing_damping = enabled;
        self
    }

    /// Builder: set the ground probe.
    pub fn with_ground_check(mut self, distance: f32, layers: GroundLayers) -> Self {
        self.ground_check_distance = distance;
        self.ground_layers = layers;
        self
    }
}
