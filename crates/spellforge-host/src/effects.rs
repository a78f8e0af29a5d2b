//! Visual effect capability.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::handle::{EffectHandle, ObjectHandle};

/// Templates shorter than this are given [`DEFAULT_EFFECT_LIFETIME`] instead.
pub const MIN_EFFECT_DURATION: f32 = 2.0;

/// Lifetime used when a template's own duration is below the floor.
pub const DEFAULT_EFFECT_LIFETIME: f32 = 5.0;

/// A particle/visual effect template.
///
/// # Example
///
/// ```
/// use spellforge_host::EffectTemplate;
///
/// assert_eq!(EffectTemplate::new("sparks", 3.0).lifetime(), 3.0);
/// assert_eq!(EffectTemplate::new("flash", 0.5).lifetime(), 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectTemplate {
    /// Template name as known to the host.
    pub name: String,
    /// Playback duration of one cycle, in seconds.
    pub duration: f32,
}

impl EffectTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    /// How long an instance of this effect should be kept alive.
    #[must_use]
    pub fn lifetime(&self) -> f32 {
        if self.duration >= MIN_EFFECT_DURATION {
            self.duration
        } else {
            DEFAULT_EFFECT_LIFETIME
        }
    }
}

/// Instantiates effects.
pub trait EffectService: Send + Sync {
    /// Instantiates `template` at `at`, optionally parented to an object so
    /// it follows (and dies with) that object.
    ///
    /// # Errors
    ///
    /// - [`HostError::ObjectGone`] if `parent` no longer exists
    /// - [`HostError::UnknownEffectTemplate`] if the host cannot play `template`
    fn instantiate_effect(
        &self,
        template: &EffectTemplate,
        at: Vec3,
        parent: Option<ObjectHandle>,
    ) -> Result<EffectHandle, HostError>;
}
