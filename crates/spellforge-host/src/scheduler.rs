//! Delayed-execution capability.
//!
//! Delayed spell behaviour (timed destroy, delay modifiers, effect cleanup)
//! is expressed as scheduled continuations, never as blocking waits.

use crate::error::HostError;
use crate::handle::TimerHandle;

/// An action to run once after a delay.
pub type ScheduledAction = Box<dyn FnOnce() + Send>;

/// Runs actions after a delay.
///
/// Actions run on the scheduler's own thread of control, with no scheduler
/// locks held, so an action may schedule or cancel further actions.
pub trait Scheduler: Send + Sync {
    /// Schedules `action` to run once after `delay_secs` seconds.
    ///
    /// A zero or negative delay runs the action at the next opportunity; it
    /// is never run inline.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidDelay`] if `delay_secs` is not finite.
    fn schedule(&self, delay_secs: f32, action: ScheduledAction) -> Result<TimerHandle, HostError>;

    /// Cancels a pending action. Returns `true` if it had not yet run.
    fn cancel(&self, handle: TimerHandle) -> bool;
}
