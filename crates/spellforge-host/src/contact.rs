//! First-contact notification capability.
//!
//! A spawned object reports contact at most once in its lifetime: the first
//! trigger/collision with any object other than itself. Listeners registered
//! before that contact are each invoked exactly once; listeners registered
//! afterwards are never invoked. Listeners are dropped uninvoked when the
//! object is destroyed first.

use glam::Vec3;

use crate::error::HostError;
use crate::handle::ObjectHandle;

/// Details of a first contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// The object that made contact.
    pub object: ObjectHandle,
    /// The object it touched, if the host can name one.
    pub other: Option<ObjectHandle>,
    /// Approximate contact point.
    pub point: Vec3,
}

/// One-shot listener for a first contact.
pub type ContactCallback = Box<dyn FnOnce(Contact) + Send>;

/// Delivers one-shot first-contact notifications.
pub trait ContactService: Send + Sync {
    /// Registers `callback` to run on the first contact of `object`.
    ///
    /// Callbacks run on the host's thread during its physics step, with no
    /// host locks held, so they may freely call back into any service.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ObjectGone`] if `object` no longer exists.
    fn on_first_contact(
        &self,
        object: ObjectHandle,
        callback: ContactCallback,
    ) -> Result<(), HostError>;
}
