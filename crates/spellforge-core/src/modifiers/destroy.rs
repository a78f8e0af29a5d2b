//! Destroy modifier.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use spellforge_host::ObjectHandle;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope, ReferenceLabels};

bitflags! {
    /// When a [`Destroy`] modifier destroys its target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DestroyFlags: u8 {
        /// When the action source (slot B) fires.
        const ON_EVENT = 1;
        /// `delay` seconds after the cast.
        const BY_TIMER = 1 << 1;
    }
}

impl Default for DestroyFlags {
    fn default() -> Self {
        Self::BY_TIMER
    }
}

/// Destroys the object exposed by its cast source.
///
/// - With [`DestroyFlags::BY_TIMER`], the target is captured at cast time
///   and destroyed after `delay` seconds if it still exists
/// - With [`DestroyFlags::ON_EVENT`], the target is destroyed when the
///   action source fires: the action source's exposed object if it has a
///   live one, otherwise the object captured earlier in the cast if that
///   one is still alive. A pending timed destroy of the same cast is
///   cancelled.
///
/// Either way the action channel fires before the object is destroyed, and
/// only when there is a live object to destroy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destroy {
    /// Triggers.
    pub flags: DestroyFlags,
    /// Seconds until a timed destroy.
    pub delay: f32,
}

impl Default for Destroy {
    fn default() -> Self {
        Self {
            flags: DestroyFlags::default(),
            delay: 3.0,
        }
    }
}

impl Destroy {
    /// A destroy with explicit triggers and timer.
    #[must_use]
    pub fn new(flags: DestroyFlags, delay: f32) -> Self {
        Self { flags, delay }
    }

    /// Event-only destroy.
    #[must_use]
    pub fn on_event() -> Self {
        Self::new(DestroyFlags::ON_EVENT, 3.0)
    }

    /// Timer-only destroy after `delay` seconds.
    #[must_use]
    pub fn after(delay: f32) -> Self {
        Self::new(DestroyFlags::BY_TIMER, delay)
    }
}

fn destroy_target(scope: &ModifierScope<'_>, target: ObjectHandle) {
    if scope.services().objects.destroy(target) {
        info!(modifier = %scope.id(), object = %target, "destroyed");
    } else {
        debug!(modifier = %scope.id(), object = %target, "target already gone");
    }
}

impl Modifier for Destroy {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Destroy
    }

    fn uses_reference(&self) -> bool {
        true
    }

    fn reference_labels(&self) -> ReferenceLabels {
        ReferenceLabels {
            slot_a: "Event for GameObject Initiator",
            slot_b: Some("Action Event to trigger destruction"),
        }
    }

    fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        if !self.flags.contains(DestroyFlags::BY_TIMER) {
            return Ok(());
        }

        let Some(target) = scope.object_from(Channel::Cast) else {
            warn!(modifier = %scope.id(), "no target object on cast");
            return Ok(());
        };
        scope.expose(target);

        let deferred = scope.deferred();
        let timer = scope.schedule(self.delay, move || {
            deferred.enter(|scope| {
                scope.take_timer();
                if scope.services().objects.exists(target) {
                    scope.action(|| destroy_target(scope, target));
                } else {
                    debug!(modifier = %scope.id(), object = %target, "timed destroy target already gone");
                }
            });
        })?;
        scope.set_timer(timer);
        debug!(modifier = %scope.id(), object = %target, %timer, delay = self.delay, "timed destroy scheduled");
        Ok(())
    }

    fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        match channel {
            Channel::Cast => {
                if let Some(target) = scope.object_from(Channel::Cast) {
                    scope.expose(target);
                    debug!(modifier = %scope.id(), object = %target, "target captured");
                }
            }
            Channel::Action if self.flags.contains(DestroyFlags::ON_EVENT) => {
                let objects = &scope.services().objects;
                let candidates = [scope.object_from(Channel::Action), scope.exposed()];
                let Some(target) = candidates
                    .into_iter()
                    .flatten()
                    .find(|object| objects.exists(*object))
                else {
                    debug!(modifier = %scope.id(), "no live target on action event");
                    return Ok(());
                };

                if let Some(timer) = scope.take_timer() {
                    scope.services().scheduler.cancel(timer);
                    debug!(modifier = %scope.id(), %timer, "timed destroy cancelled");
                }
                scope.action(|| destroy_target(scope, target));
            }
            Channel::Action => {}
        }
        Ok(())
    }
}
