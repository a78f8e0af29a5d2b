//! Object lifecycle capability.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::handle::ObjectHandle;

/// Rigid body parameters for a spawned object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    /// Initial linear velocity.
    pub velocity: Vec3,
    /// Body mass.
    pub mass: f32,
    /// Angular drag coefficient.
    pub angular_drag: f32,
}

impl RigidBody {
    /// Body moving at `velocity` with unit mass and no angular drag.
    #[must_use]
    pub fn moving(velocity: Vec3) -> Self {
        Self {
            velocity,
            mass: 1.0,
            angular_drag: 0.0,
        }
    }
}

/// Description of an object to spawn.
///
/// # Example
///
/// ```
/// use spellforge_host::{ObjectDesc, RigidBody};
/// use glam::Vec3;
///
/// let desc = ObjectDesc::new("Projectile", Vec3::ZERO)
///     .facing(Vec3::Z)
///     .with_body(RigidBody::moving(Vec3::Z * 5.0));
///
/// assert_eq!(desc.name, "Projectile");
/// assert!(desc.body.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDesc {
    /// Display name of the object.
    pub name: String,
    /// World position.
    pub position: Vec3,
    /// Facing direction (not necessarily normalized).
    pub forward: Vec3,
    /// Optional rigid body; objects without one are static.
    pub body: Option<RigidBody>,
}

impl ObjectDesc {
    /// A static object at `position` facing +Z.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            forward: Vec3::Z,
            body: None,
        }
    }

    /// Sets the facing direction.
    #[must_use]
    pub fn facing(mut self, forward: Vec3) -> Self {
        self.forward = forward;
        self
    }

    /// Attaches a rigid body.
    #[must_use]
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Spawns, destroys, and locates engine objects.
///
/// Implementations must tolerate stale handles: `destroy`, `exists`, and
/// `position` on a handle whose object is gone return `false`/`None`, never
/// panic.
pub trait ObjectService: Send + Sync {
    /// Spawns a new object and returns its handle.
    fn spawn(&self, desc: ObjectDesc) -> ObjectHandle;

    /// Destroys an object. Returns `true` if the object existed.
    fn destroy(&self, handle: ObjectHandle) -> bool;

    /// Returns true if the object still exists.
    fn exists(&self, handle: ObjectHandle) -> bool;

    /// Returns the object's world position, if it still exists.
    fn position(&self, handle: ObjectHandle) -> Option<Vec3>;

    /// Moves the object.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ObjectGone`] if the object no longer exists.
    fn set_position(&self, handle: ObjectHandle, position: Vec3) -> Result<(), HostError>;
}
