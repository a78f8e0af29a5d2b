//! Simulated clock implementing [`Scheduler`].
//!
//! Time only moves when [`SimClock::advance`] is called. Time is tracked in
//! whole microseconds so that scheduling and advancing by the same decimal
//! amounts compare exactly.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use crate::error::HostError;
use crate::handle::TimerHandle;
use crate::scheduler::{ScheduledAction, Scheduler};

const MICROS_PER_SEC: f64 = 1_000_000.0;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_micros(secs: f64) -> u64 {
    (secs.max(0.0) * MICROS_PER_SEC).round() as u64
}

#[allow(clippy::cast_precision_loss)]
fn to_secs(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_SEC
}

#[derive(Default)]
struct ClockState {
    /// Current time in microseconds.
    now: u64,
    /// Monotonic sequence used for handles and FIFO tie-breaking.
    next_seq: u64,
    /// Pending actions keyed by (due time, sequence).
    queue: BTreeMap<(u64, u64), ScheduledAction>,
    /// Handle sequence -> due time, for cancellation.
    due_by_seq: HashMap<u64, u64>,
}

/// A manually advanced clock.
///
/// Actions due at the same instant run in scheduling order. An action that
/// schedules another action with a delay that still falls inside the current
/// `advance` window runs within the same call.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use spellforge_host::sim::SimClock;
/// use spellforge_host::Scheduler;
///
/// let clock = SimClock::new();
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
/// clock
///     .schedule(2.0, Box::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
///
/// clock.advance(1.5);
/// assert_eq!(fired.load(Ordering::SeqCst), 0);
/// clock.advance(0.5);
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct SimClock {
    state: Mutex<ClockState>,
}

impl std::fmt::Debug for SimClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SimClock")
            .field("now", &to_secs(state.now))
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl SimClock {
    /// Creates a clock at time zero with nothing scheduled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        to_secs(self.lock().now)
    }

    /// Number of actions waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Advances time by `secs`, running every action that falls due.
    ///
    /// Returns the number of actions run. A panicking action is logged and
    /// does not stop the remaining actions.
    pub fn advance(&self, secs: f64) -> usize {
        let target = {
            let state = self.lock();
            state.now.saturating_add(to_micros(secs))
        };

        let mut ran = 0;
        loop {
            // Pop one due action at a time so the lock is never held while an
            // action runs.
            let next = {
                let mut state = self.lock();
                let key = state
                    .queue
                    .keys()
                    .next()
                    .copied()
                    .filter(|(due, _)| *due <= target);
                key.and_then(|key| {
                    state.now = key.0;
                    state.due_by_seq.remove(&key.1);
                    state.queue.remove(&key).map(|action| (key.1, action))
                })
            };

            let Some((seq, action)) = next else {
                break;
            };

            if catch_unwind(AssertUnwindSafe(action)).is_err() {
                tracing::error!(timer = seq, "scheduled action panicked");
            }
            ran += 1;
        }

        self.lock().now = target;
        ran
    }

    /// Drops every pending action without running it. Returns how many were
    /// dropped.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut state = self.lock();
            state.due_by_seq.clear();
            std::mem::take(&mut state.queue)
        };
        dropped.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for SimClock {
    fn schedule(&self, delay_secs: f32, action: ScheduledAction) -> Result<TimerHandle, HostError> {
        if !delay_secs.is_finite() {
            return Err(HostError::InvalidDelay(delay_secs));
        }

        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now.saturating_add(to_micros(f64::from(delay_secs)));
        state.queue.insert((due, seq), action);
        state.due_by_seq.insert(seq, due);

        tracing::trace!(timer = seq, due = to_secs(due), "scheduled");
        Ok(TimerHandle::new(seq))
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let mut state = self.lock();
        let seq = handle.as_u64();
        match state.due_by_seq.remove(&seq) {
            Some(due) => {
                state.queue.remove(&(due, seq));
                tracing::trace!(timer = seq, "cancelled");
                true
            }
            None => false,
        }
    }
}
