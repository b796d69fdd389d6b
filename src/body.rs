//! Capability interfaces the controller core depends on.
//!
//! The core never talks to a physics engine directly. It reads and writes a
//! [`RigidBody`], asks a [`GroundProbe`] whether the character stands on
//! something, and steers relative to a [`CameraView`]. Engine backends (see
//! [`crate::backend`]) adapt their world to these traits; tests and headless
//! simulations use [`KinematicBody`] and [`FlatGround`].

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Opaque rigid body driven by the controller.
///
/// Impulses are instantaneous velocity changes; forces act over the next
/// physics step. The controller never caches velocity across ticks, so any
/// external write is picked up on the next read-back.
pub trait RigidBody {
    /// World-space position.
    fn position(&self) -> Vec3;

    /// World-space rotation.
    fn rotation(&self) -> Quat;

    /// Current linear velocity.
    fn linear_velocity(&self) -> Vec3;

    /// Overwrite the linear velocity.
    fn set_linear_velocity(&mut self, velocity: Vec3);

    /// Apply an instantaneous, mass-scaled velocity change.
    fn add_impulse(&mut self, impulse: Vec3);

    /// Apply a continuous force for the next physics step.
    fn add_force(&mut self, force: Vec3);

    /// Teleport the body.
    fn move_position(&mut self, position: Vec3);

    /// Set the body's rotation.
    fn move_rotation(&mut self, rotation: Quat);
}

/// Downward ground query.
pub trait GroundProbe {
    /// Whether a ray cast down from `origin` hits a surface on one of
    /// `layers` within `max_distance`.
    fn is_grounded(&self, origin: Vec3, max_distance: f32, layers: GroundLayers) -> bool;
}

/// Read-only view direction of the active camera.
pub trait CameraView {
    /// Forward vector of the viewpoint (not necessarily horizontal).
    fn forward(&self) -> Vec3;

    /// Right vector of the viewpoint.
    fn right(&self) -> Vec3;
}

impl CameraView for GlobalTransform {
    fn forward(&self) -> Vec3 {
        GlobalTransform::forward(self).as_vec3()
    }

    fn right(&self) -> Vec3 {
        GlobalTransform::right(self).as_vec3()
    }
}

impl CameraView for Transform {
    fn forward(&self) -> Vec3 {
        Transform::forward(self).as_vec3()
    }

    fn right(&self) -> Vec3 {
        Transform::right(self).as_vec3()
    }
}

/// A fixed camera basis, for hosts that compute their own view vectors.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub forward: Vec3,
    pub right: Vec3,
}

impl Default for CameraBasis {
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            right: Vec3::X,
        }
    }
}

impl CameraBasis {
    /// Create a basis from explicit forward and right vectors.
    pub fn new(forward: Vec3, right: Vec3) -> Self {
        Self { forward, right }
    }

    /// Build a level basis looking along `forward`, with right derived from
    /// world up. Degenerate input falls back to the default basis.
    pub fn looking(forward: Vec3) -> Self {
        let forward = forward.normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        if right == Vec3::ZERO {
            return Self::default();
        }
        Self { forward, right }
    }
}

impl CameraView for CameraBasis {
    fn forward(&self) -> Vec3 {
        self.forward
    }

    fn right(&self) -> Vec3 {
        self.right
    }
}

/// Bitmask of physics layers that count as ground.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundLayers(pub u32);

impl Default for GroundLayers {
    fn default() -> Self {
        Self::ALL
    }
}

impl GroundLayers {
    pub const ALL: Self = Self(u32::MAX);
    pub const NONE: Self = Self(0);

    /// A mask with only `layer` (0-31) set.
    pub fn layer(layer: u32) -> Self {
        Self(1u32.checked_shl(layer).unwrap_or(0))
    }

    /// Raw bits.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether the two masks share at least one layer.
    pub fn intersects(&self, other: GroundLayers) -> bool {
        self.0 & other.0 != 0
    }
}

/// An infinite horizontal ground plane.
#[derive(Resource, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Resource)]
pub struct FlatGround {
    /// Height of the surface.
    pub height: f32,
    /// Layers the plane belongs to.
    pub layers: GroundLayers,
}

impl Default for FlatGround {
    fn default() -> Self {
        Self {
            height: 0.0,
            layers: GroundLayers::layer(0),
        }
    }
}

impl FlatGround {
    /// A ground plane at `height` on layer 0.
    pub fn at(height: f32) -> Self {
        Self {
            height,
            ..default()
        }
    }

    /// Builder: set the layers of the plane.
    pub fn with_layers(mut self, layers: GroundLayers) -> Self {
        self.layers = layers;
        self
    }
}

impl GroundProbe for FlatGround {
    fn is_grounded(&self, origin: Vec3, max_distance: f32, layers: GroundLayers) -> bool {
        if !layers.intersects(self.layers) {
            return false;
        }
        let distance = origin.y - self.height;
        // Ray starts below the surface: nothing to hit.
        distance >= -f32::EPSILON && distance <= max_distance
    }
}

/// A minimal point-mass body with explicit Euler integration.
///
/// Used by the headless [`crate::kinematic::KinematicBackend`] and by tests
/// that need deterministic physics without a solver. The position is the
/// body's center; it rests `half_height` above a [`FlatGround`].
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct KinematicBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    /// Mass in kilograms. Non-positive values are treated as 1.
    pub mass: f32,
    /// Gravity acceleration applied every step.
    pub gravity: Vec3,
    /// Distance from the center to the bottom of the body.
    pub half_height: f32,
    /// Forces accumulated since the last step.
    pub(crate) accumulated_force: Vec3,
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            mass: 1.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            half_height: 1.0,
            accumulated_force: Vec3::ZERO,
        }
    }
}

impl KinematicBody {
    /// A body at `position`.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..default()
        }
    }

    /// A body resting on `ground`.
    pub fn resting_on(ground: &FlatGround) -> Self {
        let body = Self::default();
        Self {
            position: Vec3::new(0.0, ground.height + body.half_height, 0.0),
            ..body
        }
    }

    /// Builder: set the initial velocity.
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Builder: set gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder: set mass.
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Forces waiting for the next [`step`](Self::step).
    pub fn pending_force(&self) -> Vec3 {
        self.accumulated_force
    }

    fn effective_mass(&self) -> f32 {
        if self.mass > 0.0 && self.mass.is_finite() {
            self.mass
        } else {
            1.0
        }
    }

    /// Integrate one step and resolve contact with `ground`.
    pub fn step(&mut self, dt: f32, ground: Option<&FlatGround>) {
        let acceleration = self.gravity + self.accumulated_force / self.effective_mass();
        self.accumulated_force = Vec3::ZERO;
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;

        if let Some(ground) = ground {
            let floor = ground.height + self.half_height;
            if self.position.y < floor {
                self.position.y = floor;
                self.velocity.y = self.velocity.y.max(0.0);
            }
        }
    }
}

impl RigidBody for KinematicBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn add_impulse(&mut self, impulse: Vec3) {
        self.velocity += impulse / self.effective_mass();
    }

    fn add_force(&mut self, force: Vec3) {
        self.accumulated_force += force;
    }

    fn move_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn move_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_layers_intersect() {
        assert!(GroundLayers::ALL.intersects(GroundLayers::layer(3)));
        assert!(!GroundLayers::layer(1).intersects(GroundLayers::layer(2)));
        assert!(!GroundLayers::NONE.intersects(GroundLayers::ALL));
        assert_eq!(GroundLayers::layer(40), GroundLayers::NONE);
    }

    #[test]
    fn flat_ground_probe_distance() {
        let ground = FlatGround::at(2.0);
        let layers = GroundLayers::ALL;
        assert!(ground.is_grounded(Vec3::new(0.0, 3.0, 0.0), 1.1, layers));
        assert!(!ground.is_grounded(Vec3::new(0.0, 3.5, 0.0), 1.1, layers));
        // Below the surface
        assert!(!ground.is_grounded(Vec3::new(0.0, 1.0, 0.0), 1.1, layers));
    }

    #[test]
    fn flat_ground_probe_respects_layers() {
        let ground = FlatGround::at(0.0).with_layers(GroundLayers::layer(4));
        let origin = Vec3::new(0.0, 0.5, 0.0);
        assert!(ground.is_grounded(origin, 1.0, GroundLayers::layer(4)));
        assert!(!ground.is_grounded(origin, 1.0, GroundLayers::layer(0)));
    }

    #[test]
    fn kinematic_body_impulse_is_mass_scaled() {
        let mut body = KinematicBody::default().with_mass(2.0);
        body.add_impulse(Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(body.linear_velocity(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn kinematic_body_force_applies_on_step() {
        let mut body = KinematicBody::default().with_gravity(Vec3::ZERO);
        body.add_force(Vec3::new(0.0, 0.0, -10.0));
        assert_eq!(body.linear_velocity(), Vec3::ZERO);

        body.step(0.5, None);
        assert_eq!(body.linear_velocity(), Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(body.pending_force(), Vec3::ZERO);
    }

    #[test]
    fn kinematic_body_lands_on_ground() {
        let ground = FlatGround::at(0.0);
        let mut body = KinematicBody::at(Vec3::new(0.0, 1.05, 0.0)).with_velocity(Vec3::new(1.0, -5.0, 0.0));
        body.step(0.1, Some(&ground));
        assert_eq!(body.position.y, 1.0);
        assert_eq!(body.velocity.y, 0.0);
        assert_eq!(body.velocity.x, 1.0);
    }

    #[test]
    fn camera_basis_looking_is_level() {
        let basis = CameraBasis::looking(Vec3::new(1.0, 0.0, 0.0));
        assert!((basis.right - Vec3::Z).length() < 1e-6);

        // Straight down has no level right vector
        assert_eq!(CameraBasis::looking(Vec3::NEG_Y), CameraBasis::default());
    }

    #[test]
    fn global_transform_camera_view() {
        let camera = GlobalTransform::IDENTITY;
        assert_eq!(CameraView::forward(&camera), Vec3::NEG_Z);
        assert_eq!(CameraView::right(&camera), Vec3::X);
    }
}
