//! Delay modifier.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope};

/// Fires its action `on_cast_timer` seconds after being cast.
///
/// Listeners on its action channel therefore run on the scheduler, not
/// inside the cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delay {
    /// Seconds between cast and action.
    pub on_cast_timer: f32,
}

impl Default for Delay {
    fn default() -> Self {
        Self { on_cast_timer: 3.0 }
    }
}

impl Delay {
    /// A delay of `seconds`.
    #[must_use]
    pub fn new(seconds: f32) -> Self {
        Self {
            on_cast_timer: seconds,
        }
    }
}

impl Modifier for Delay {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Delay
    }

    fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        let deferred = scope.deferred();
        let timer = scope.schedule(self.on_cast_timer, move || {
            deferred.enter(|scope| scope.action(|| {}));
        })?;
        debug!(modifier = %scope.id(), %timer, delay = self.on_cast_timer, "delay started");
        Ok(())
    }
}
