//! Input sampling.
//!
//! The controller consumes one [`InputFrame`] per logic tick: two raw axes
//! and the rising/falling edges of the charge button. Hosts that only know
//! whether the button is held can drive a [`MovementIntent`] component
//! instead and let it derive the edges.

use bevy::prelude::*;

/// Clamp an axis to `[-1, 1]`. Non-finite values read as neutral.
fn sanitize_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Input snapshot for one logic tick.
///
/// # Example
///
/// ```rust
/// use blast_pack_controller::prelude::*;
///
/// let frame = InputFrame::new(0.0, 2.0).with_jump_pressed();
/// assert_eq!(frame.vertical, 1.0);
/// assert!(frame.jump_pressed);
/// assert!(!frame.jump_released);
/// ```
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    /// Raw horizontal axis (-1.0 = left, 1.0 = right).
    pub horizontal: f32,
    /// Raw vertical axis (-1.0 = back/down, 1.0 = forward).
    pub vertical: f32,
    /// The charge button went down this tick.
    pub jump_pressed: bool,
    /// The charge button went up this tick.
    pub jump_released: bool,
}

impl InputFrame {
    /// A frame with the given axes and no button edges.
    pub fn new(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal: sanitize_axis(horizontal),
            vertical: sanitize_axis(vertical),
            jump_pressed: false,
            jump_released: false,
        }
    }

    /// Neutral input; what the controller sees when no input source exists.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Builder: mark the button as pressed this tick.
    pub fn with_jump_pressed(mut self) -> Self {
        self.jump_pressed = true;
        self
    }

    /// Builder: mark the button as released this tick.
    pub fn with_jump_released(mut self) -> Self {
        self.jump_released = true;
        self
    }

    /// Forward throttle: the positive part of the vertical axis.
    pub fn throttle(&self) -> f32 {
        self.vertical.max(0.0)
    }

    /// Whether the vertical axis is pushed down past `threshold`.
    pub fn is_dive_input(&self, threshold: f32) -> bool {
        self.vertical < threshold
    }
}

/// Movement intent written by the host every frame.
///
/// You handle input devices; the controller handles edges and timing. Set the
/// axes and the held state of the charge button each frame, or queue explicit
/// edges with [`press_jump`](Self::press_jump) / [`release_jump`](Self::release_jump).
///
/// # Example
///
/// ```rust
/// use blast_pack_controller::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.set_axes(0.0, 1.0);
/// intent.set_jump_held(true);
/// assert!(intent.sample().jump_pressed);
///
/// // Still held: no new edge
/// assert!(!intent.sample().jump_pressed);
///
/// intent.set_jump_held(false);
/// assert!(intent.sample().jump_released);
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Horizontal axis (-1.0 = left, 1.0 = right).
    pub horizontal: f32,
    /// Vertical axis (-1.0 = back/dive, 1.0 = forward).
    pub vertical: f32,
    /// Whether the charge button is currently held.
    pub jump_held: bool,
    /// Held state seen by the previous sample.
    pub(crate) jump_held_prev: bool,
    /// Edges queued explicitly since the previous sample.
    pub(crate) queued_press: bool,
    pub(crate) queued_release: bool,
}

impl MovementIntent {
    /// Create a neutral intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both axes (clamped to `[-1, 1]`).
    pub fn set_axes(&mut self, horizontal: f32, vertical: f32) {
        self.horizontal = sanitize_axis(horizontal);
        self.vertical = sanitize_axis(vertical);
    }

    /// Set the held state of the charge button.
    pub fn set_jump_held(&mut self, held: bool) {
        self.jump_held = held;
    }

    /// Queue a press edge regardless of the held state.
    pub fn press_jump(&mut self) {
        self.queued_press = true;
        self.jump_held = true;
    }

    /// Queue a release edge regardless of the held state.
    pub fn release_jump(&mut self) {
        self.queued_release = true;
        self.jump_held = false;
    }

    /// Clear axes and button state.
    pub fn clear(&mut self) {
        self.horizontal = 0.0;
        self.vertical = 0.0;
        self.jump_held = false;
        self.queued_press = false;
        self.queued_release = false;
    }

    /// Produce this tick's [`InputFrame`] and consume the edges.
    pub fn sample(&mut self) -> InputFrame {
        let pressed = self.queued_press || (self.jump_held && !self.jump_held_prev);
        let released = self.queued_release || (!self.jump_held && self.jump_held_prev);
        self.jump_held_prev = self.jump_held;
        self.queued_press = false;
        self.queued_release = false;

        InputFrame {
            horizontal: sanitize_axis(self.horizontal),
            vertical: sanitize_axis(self.vertical),
            jump_pressed: pressed,
            jump_released: released,
        }
    }
}
