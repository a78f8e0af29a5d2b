//! Log modifier.

use serde::{Deserialize, Serialize};
use spellforge_host::LogKind;

use crate::channel::Channel;
use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope};

/// Writes designer-authored lines to the spell log.
///
/// On cast it writes `"{cast_message} - Cast triggered"` (if enabled) and
/// then fires its action. On events from its sources it writes the event or
/// action message (if enabled).
///
/// # Example
///
/// ```
/// use spellforge_core::modifiers::Log;
///
/// let log = Log::default();
/// assert!(log.use_cast_message);
/// assert!(!log.use_event_message);
/// assert_eq!(log.cast_message, "Log Cast Triggered");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Write a line when cast.
    pub use_cast_message: bool,
    /// Cast message prefix.
    pub cast_message: String,
    /// Write a line on events from sources.
    pub use_event_message: bool,
    /// Prefix for cast events from the slot source.
    pub event_message: String,
    /// Prefix for action events from the slot source.
    pub action_message: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            use_cast_message: true,
            cast_message: "Log Cast Triggered".to_string(),
            use_event_message: false,
            event_message: "Event Triggered".to_string(),
            action_message: "Action Triggered".to_string(),
        }
    }
}

impl Log {
    /// A log that writes nothing on cast and reports every event.
    #[must_use]
    pub fn events_only() -> Self {
        Self {
            use_cast_message: false,
            use_event_message: true,
            ..Self::default()
        }
    }
}

impl Modifier for Log {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Log
    }

    fn uses_reference(&self) -> bool {
        true
    }

    fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        if self.use_cast_message {
            scope.log(LogKind::Cast, format!("{} - Cast triggered", self.cast_message));
        }
        scope.action(|| {});
        Ok(())
    }

    fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        if !self.use_event_message {
            return Ok(());
        }
        match channel {
            Channel::Cast => scope.log(
                LogKind::Event,
                format!("{} - Event triggered: {channel}", self.event_message),
            ),
            Channel::Action => scope.log(
                LogKind::Action,
                format!("{} - Event triggered: {channel}", self.action_message),
            ),
        }
        Ok(())
    }
}
