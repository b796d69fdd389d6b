//! Blast-pack charge jump.
//!
//! Holding the charge button builds up a launch. Releasing it (or holding
//! until `max_charge_time`) fires an impulse whose magnitude grows linearly
//! with the held duration and gets a bonus for launching while fast.
//!
//! ```text
//! Idle --pressed & cooldown elapsed--> Charging
//! Charging --released--> Idle   (launch at held duration)
//! Charging --held >= cap--> Idle (launch at the cap)
//! ```
//!
//! Presses during the cooldown are dropped, not buffered. Ground contact has
//! no influence on charging.

use bevy::prelude::*;

use crate::config::ControllerConfig;
use crate::intent::InputFrame;
use crate::state::ControllerState;

/// Phase of the charge state machine.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub enum ChargePhase {
    Idle,
    Charging { started_at: f32 },
}

impl ChargePhase {
    /// Read the phase out of the shared state bag.
    pub fn of(state: &ControllerState) -> Self {
        if state.is_charging {
            Self::Charging {
                started_at: state.charge_start_time,
            }
        } else {
            Self::Idle
        }
    }
}

/// A fired launch.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct Launch {
    /// Held duration used, clamped to `[0, max_charge_time]`.
    pub held: f32,
    /// Force from the charge alone.
    pub base_force: f32,
    /// Force after the speed bonus.
    pub total_force: f32,
    /// Impulse applied to the body.
    pub impulse: Vec3,
}

/// Normalized charge for a held duration.
pub fn charge_ratio(held: f32, max_charge_time: f32) -> f32 {
    if max_charge_time <= 0.0 {
        return 1.0;
    }
    (held / max_charge_time).clamp(0.0, 1.0)
}

/// Launch force for a held duration, before the speed bonus.
///
/// `lerp(min_blast_force, max_blast_force, clamp01(held / max_charge_time))`.
pub fn launch_force(held: f32, config: &ControllerConfig) -> f32 {
    let t = charge_ratio(held, config.max_charge_time);
    config.min_blast_force + (config.max_blast_force - config.min_blast_force) * t
}

/// Multiplier rewarding launches at speed: `1 + bonus * speed / max_speed`.
pub fn speed_boost_multiplier(current_speed: f32, config: &ControllerConfig) -> f32 {
    if config.max_speed <= 0.0 {
        return 1.0;
    }
    1.0 + config.launch_speed_bonus * (current_speed.max(0.0) / config.max_speed)
}

/// Impulse for `total_force` along a level camera forward.
pub fn launch_impulse(forward_flat: Vec3, total_force: f32, config: &ControllerConfig) -> Vec3 {
    forward_flat * (total_force * config.forward_ratio) + Vec3::Y * (total_force * config.upward_ratio)
}

/// Whether the launch cooldown has elapsed at `now`.
pub fn cooldown_elapsed(state: &ControllerState, now: f32, config: &ControllerConfig) -> bool {
    state
        .last_launch_time
        .is_none_or(|last| now - last >= config.jump_cooldown)
}

/// Try to enter `Charging`. Returns `false` if already charging or the
/// cooldown has not elapsed; the press is then dropped.
pub fn try_start(state: &mut ControllerState, now: f32, config: &ControllerConfig) -> bool {
    if state.is_charging || !cooldown_elapsed(state, now, config) {
        return false;
    }
    state.is_charging = true;
    state.charge_start_time = now;
    true
}

/// Advance a running charge. Fires at the cap or on release.
///
/// `forward_flat` is the level camera forward at the time of the launch.
pub fn update(
    state: &mut ControllerState,
    input: &InputFrame,
    now: f32,
    config: &ControllerConfig,
    forward_flat: Vec3,
) -> Option<Launch> {
    if !state.is_charging {
        return None;
    }

    let held = now - state.charge_start_time;
    if held >= config.max_charge_time {
        Some(fire(state, config.max_charge_time, now, config, forward_flat))
    } else if input.jump_released {
        Some(fire(state, held, now, config, forward_flat))
    } else {
        None
    }
}

fn fire(
    state: &mut ControllerState,
    held: f32,
    now: f32,
    config: &ControllerConfig,
    forward_flat: Vec3,
) -> Launch {
    let held = held.clamp(0.0, config.max_charge_time);
    let base_force = launch_force(held, config);
    let total_force = base_force * speed_boost_multiplier(state.current_speed, config);

    state.is_charging = false;
    state.last_launch_time = Some(now);

    Launch {
        held,
        base_force,
        total_force,
        impulse: launch_impulse(forward_flat, total_force, config),
    }
}

/// Normalized charge at `now`, or 0.0 when idle.
pub fn charge_fraction(state: &ControllerState, now: f32, config: &ControllerConfig) -> f32 {
    match ChargePhase::of(state) {
        ChargePhase::Idle => 0.0,
        ChargePhase::Charging { started_at } => charge_ratio(now - started_at, config.max_charge_time),
    }
}

/// Visual scale of the charge bubble that grows while charging.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct ChargeBubble {
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for ChargeBubble {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 1.0,
        }
    }
}

impl ChargeBubble {
    /// Scale for a normalized charge.
    pub fn scale(&self, fraction: f32) -> f32 {
        let t = fraction.clamp(0.0, 1.0);
        self.min_scale + (self.max_scale - self.min_scale) * t
    }
}
