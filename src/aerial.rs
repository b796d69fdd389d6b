//! Aerial state machine: diving and the post-dive roll.
//!
//! ```text
//! Grounded <--> Airborne --vertical < threshold--> Diving
//!    ^                                                |
//!    +--- Rolling <--- lands while was_diving --------+
//!            | roll_duration elapsed, or left the ground
//!            v
//!     Grounded / Airborne
//! ```
//!
//! A roll only exists on the ground. Launching out of a roll ends it on the
//! first airborne tick, so the launch keeps its forward push.
//!
//! This module is the only writer of `is_diving`, `was_diving` and
//! `is_rolling`. It runs at the start of every physics tick, before the
//! momentum integrator reads those flags.

use bevy::prelude::*;

use crate::config::ControllerConfig;
use crate::intent::InputFrame;
use crate::state::ControllerState;

/// Movement phase derived from the state flags.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AerialPhase {
    Grounded,
    Airborne,
    /// Airborne sub-state with strong downward input.
    Diving,
    /// Recovery lock after a dive landing.
    Rolling,
}

impl AerialPhase {
    pub fn of(state: &ControllerState) -> Self {
        if state.is_rolling {
            Self::Rolling
        } else if state.is_diving {
            Self::Diving
        } else if state.is_grounded {
            Self::Grounded
        } else {
            Self::Airborne
        }
    }
}

/// Transitions taken during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AerialTransitions {
    pub dive_started: bool,
    pub dive_ended: bool,
    pub roll_started: bool,
    pub roll_ended: bool,
}

/// Whether the dive cooldown has elapsed at `now`.
pub fn dive_cooldown_elapsed(state: &ControllerState, now: f32, config: &ControllerConfig) -> bool {
    state
        .last_dive_end
        .is_none_or(|end| now - end >= config.dive_cooldown)
}

/// Resolve this tick's transitions from the fresh ground probe and input.
pub fn update(
    state: &mut ControllerState,
    grounded: bool,
    input: &InputFrame,
    now: f32,
    config: &ControllerConfig,
) -> AerialTransitions {
    let mut transitions = AerialTransitions::default();
    state.is_grounded = grounded;

    let roll_expired = now - state.roll_start_time >= config.roll_duration;
    if state.is_rolling && (roll_expired || !grounded) {
        state.is_rolling = false;
        transitions.roll_ended = true;
    }

    if grounded {
        if state.is_diving {
            end_dive(state, now);
            transitions.dive_ended = true;
        }
        if state.was_diving && !state.is_rolling {
            state.is_rolling = true;
            state.roll_start_time = now;
            transitions.roll_started = true;
        }
        return transitions;
    }

    let wants_dive = input.is_dive_input(config.dive_input_threshold);
    if state.is_diving && !wants_dive {
        end_dive(state, now);
        transitions.dive_ended = true;
    } else if !state.is_diving && wants_dive && dive_cooldown_elapsed(state, now, config) {
        state.is_diving = true;
        transitions.dive_started = true;
    }

    transitions
}

fn end_dive(state: &mut ControllerState, now: f32) {
    state.is_diving = false;
    state.last_dive_end = Some(now);
}

/// Latch `was_diving` for the next tick. Call last in the physics tick.
pub fn end_tick(state: &mut ControllerState) {
    state.was_diving = state.is_diving;
}

/// Whether dive forces and the dive speed gain apply this tick.
pub fn dive_active(state: &ControllerState, config: &ControllerConfig) -> bool {
    state.is_diving && state.current_speed > config.min_speed_for_dive
}

/// Dive force: straight down plus a forward push along the travel direction.
pub fn dive_force(state: &ControllerState, config: &ControllerConfig) -> Option<Vec3> {
    if !dive_active(state, config) {
        return None;
    }
    let down = Vec3::NEG_Y * config.dive_force;
    let forward = state.velocity_direction * (config.dive_force * config.dive_forward_multiplier);
    Some(down + forward)
}

/// Horizontal speed carried into a roll.
///
/// Never above `max_speed` (the dive ceiling no longer applies once landed).
/// With `dive_landing_damping`, the speed bleeds to
/// `max(speed * dive_landing_speed_factor, min_speed_for_dive)` without ever
/// speeding the character up.
pub fn roll_entry_speed(speed: f32, config: &ControllerConfig) -> f32 {
    let speed = speed.min(config.max_speed);
    if !config.dive_landing_damping {
        return speed;
    }
    (speed * config.dive_landing_speed_factor)
        .max(config.min_speed_for_dive)
        .min(speed)
}
