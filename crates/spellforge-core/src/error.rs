//! Error types for modifier hooks and spell editing.

use spellforge_host::HostError;
use thiserror::Error;

use crate::modifier::ModifierId;

/// Failure raised by a modifier hook.
///
/// Hook failures never escape a cast: the caster records them in the
/// [`CastOutcome`](crate::caster::CastOutcome) and moves on to the next
/// modifier. Failures inside event handlers are logged and dropped.
#[derive(Debug, Error)]
pub enum ModifierError {
    /// A host service rejected a request.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The hook panicked. The panic was caught at the cast boundary.
    #[error("modifier {modifier} panicked: {message}")]
    Panicked {
        /// The modifier whose hook panicked.
        modifier: ModifierId,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The hook reported a failure of its own.
    #[error("modifier {modifier} failed: {reason}")]
    Failed {
        /// The failing modifier.
        modifier: ModifierId,
        /// Human readable reason.
        reason: String,
    },
}

/// Failure while editing or building a spell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpellError {
    /// A modifier index was past the end of the spell.
    #[error("modifier index {index} is out of range for a spell of {len} modifiers")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of modifiers in the spell.
        len: usize,
    },

    /// No factory is registered under this name.
    #[error("no modifier type named `{0}` is registered")]
    UnknownModifier(String),

    /// A modifier configuration failed validation.
    #[error("invalid modifier config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use spellforge_host::ObjectHandle;

    #[test]
    fn host_errors_convert() {
        let err: ModifierError = HostError::ObjectGone(ObjectHandle::new(3)).into();
        assert!(matches!(err, ModifierError::Host(HostError::ObjectGone(_))));
    }

    #[test]
    fn messages_name_the_modifier() {
        let err = ModifierError::Panicked {
            modifier: ModifierId::new(4),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "modifier 4 panicked: boom");

        let err = SpellError::IndexOutOfRange { index: 5, len: 2 };
        assert!(err.to_string().contains("index 5"));
    }
}
