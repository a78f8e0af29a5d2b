//! Errors reported by host services.

use thiserror::Error;

use crate::handle::ObjectHandle;

/// Failure of a host capability call.
///
/// None of these are fatal: the spell engine logs them and degrades the
/// affected modifier step to a no-op.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The object was destroyed (or never existed).
    #[error("object {0} no longer exists")]
    ObjectGone(ObjectHandle),

    /// The effect template cannot be instantiated.
    #[error("effect template `{0}` cannot be instantiated")]
    UnknownEffectTemplate(String),

    /// The requested delay is not a finite number of seconds.
    #[error("cannot schedule an action with delay {0}")]
    InvalidDelay(f32),
}
