//! The caster: runs spells and external events.
//!
//! A [`Caster`] owns the host [`Services`] and turns a [`Spell`] into one
//! cast:
//!
//! 1. **GUARD**: refuse empty spells and casts that start while another cast
//!    on the same caster is still running
//! 2. **CONTEXT**: create a fresh [`CastContext`] and publish it as the
//!    caster's current spell
//! 3. **CAST**: run every modifier's `on_cast` in spell order; each one
//!    publishes on its cast channel, which drives every listener
//!    synchronously before the next modifier starts
//! 4. **RELEASE**: clear the current spell (immediately or after a linger
//!    period) and release the casting guard
//!
//! A failing or panicking modifier is recorded in the [`CastOutcome`] and
//! never stops the remaining modifiers.
//!
//! # Example
//!
//! ```
//! use spellforge_core::caster::{Caster, CasterConfig};
//! use spellforge_core::modifiers::Log;
//! use spellforge_core::spell::Spell;
//! use spellforge_host::sim::SimHost;
//! use spellforge_host::LogKind;
//!
//! let host = SimHost::new();
//! let caster = Caster::new(host.services(), CasterConfig::default());
//!
//! let mut spell = Spell::new("hello");
//! spell.push(Box::new(Log::default()));
//!
//! let outcome = caster.cast(&spell).expect("cast accepted");
//! assert!(outcome.failures.is_empty());
//! assert_eq!(host.log().count(LogKind::Cast), 1);
//! assert!(!caster.is_casting());
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use spellforge_host::Services;
use tracing::{debug, error, info, warn};

use crate::context::{CastContext, CastId, EventPayload};
use crate::error::ModifierError;
use crate::modifier::{ModifierId, ModifierNode};
use crate::spell::Spell;

// =============================================================================
// Configuration
// =============================================================================

/// Caster position and facing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CasterOrigin {
    /// World position.
    pub position: Vec3,
    /// Facing direction.
    pub forward: Vec3,
}

impl Default for CasterOrigin {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
        }
    }
}

impl CasterOrigin {
    /// An origin at `position` facing `forward`.
    #[must_use]
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }
}

/// When the caster forgets its current spell after a cast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum ContextRetention {
    /// Clear as soon as the cast returns.
    #[default]
    ClearImmediately,
    /// Keep the current spell visible for a while, then clear it unless a
    /// newer cast has replaced it.
    Linger {
        /// Seconds to keep it.
        seconds: f32,
    },
}

/// Caster configuration.
///
/// # Example
///
/// ```
/// use spellforge_core::caster::{CasterConfig, ContextRetention};
///
/// let config: CasterConfig =
///     serde_json::from_str(r#"{ "seed": 7, "context_retention": { "Linger": { "seconds": 2.0 } } }"#)
///         .unwrap();
/// assert_eq!(config.seed, 7);
/// assert_eq!(config.context_retention, ContextRetention::Linger { seconds: 2.0 });
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasterConfig {
    /// Seed for every cast's random stream.
    pub seed: u64,
    /// When to clear the current spell.
    pub context_retention: ContextRetention,
    /// Initial origin.
    pub origin: CasterOrigin,
}

// =============================================================================
// Outcome
// =============================================================================

/// Whether a caster is inside a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CasterState {
    /// Ready to cast.
    Idle,
    /// A cast is running; further casts are rejected.
    Casting,
}

/// The spell a caster is currently processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSpell {
    /// Spell name.
    pub name: String,
    /// The cast or event being processed.
    pub cast: CastId,
}

/// One modifier that failed during a cast.
#[derive(Debug)]
pub struct ModifierFailure {
    /// Position of the modifier in the spell.
    pub index: usize,
    /// The failing modifier.
    pub modifier: ModifierId,
    /// What went wrong.
    pub error: ModifierError,
}

/// Result of an accepted cast.
#[derive(Debug)]
pub struct CastOutcome {
    /// The cast's id.
    pub cast: CastId,
    /// The cast's context, still shared with any pending continuation.
    pub context: CastContext,
    /// Modifiers whose `on_cast` failed or panicked, in spell order.
    pub failures: Vec<ModifierFailure>,
}

impl CastOutcome {
    /// Returns true if every modifier's `on_cast` succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// Caster
// =============================================================================

/// Runs spells against a set of host services.
pub struct Caster {
    services: Services,
    config: CasterConfig,
    origin: Mutex<CasterOrigin>,
    casting: AtomicBool,
    current: Arc<Mutex<Option<CurrentSpell>>>,
    next_cast: AtomicU64,
}

impl fmt::Debug for Caster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caster")
            .field("config", &self.config)
            .field("origin", &self.origin())
            .field("casting", &self.is_casting())
            .field("current", &self.current_spell())
            .finish_non_exhaustive()
    }
}

/// Releases the casting latch when dropped.
struct CastingLatch<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CastingLatch<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CastingLatch<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs `hook` for `node`, turning a panic into [`ModifierError::Panicked`].
fn guarded(
    node: &Arc<ModifierNode>,
    hook: impl FnOnce() -> Result<(), ModifierError>,
) -> Result<(), ModifierError> {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(ModifierError::Panicked {
            modifier: node.id(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

impl Caster {
    /// Creates a caster using `services`.
    #[must_use]
    pub fn new(services: Services, config: CasterConfig) -> Self {
        Self {
            services,
            origin: Mutex::new(config.origin),
            config,
            casting: AtomicBool::new(false),
            current: Arc::new(Mutex::new(None)),
            next_cast: AtomicU64::new(1),
        }
    }

    /// The host services.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// The configuration this caster was built with.
    #[must_use]
    pub fn config(&self) -> &CasterConfig {
        &self.config
    }

    /// Current position and facing.
    #[must_use]
    pub fn origin(&self) -> CasterOrigin {
        *lock(&self.origin)
    }

    /// Moves the caster. Affects casts started afterwards.
    pub fn set_origin(&self, origin: CasterOrigin) {
        *lock(&self.origin) = origin;
    }

    /// Returns true while a cast is running on this caster.
    #[must_use]
    pub fn is_casting(&self) -> bool {
        self.casting.load(Ordering::Acquire)
    }

    /// Idle or casting.
    #[must_use]
    pub fn state(&self) -> CasterState {
        if self.is_casting() {
            CasterState::Casting
        } else {
            CasterState::Idle
        }
    }

    /// The spell currently being processed or lingering, if any.
    #[must_use]
    pub fn current_spell(&self) -> Option<CurrentSpell> {
        lock(&self.current).clone()
    }

    fn next_cast_id(&self) -> CastId {
        CastId::new(self.next_cast.fetch_add(1, Ordering::Relaxed))
    }

    /// Casts `spell`.
    ///
    /// Returns `None` without side effects if the spell is empty or this
    /// caster is already casting (including a cast started from inside one
    /// of this cast's own modifiers).
    pub fn cast(&self, spell: &Spell) -> Option<CastOutcome> {
        if spell.is_empty() {
            debug!(spell = %spell.name(), "ignoring cast of an empty spell");
            return None;
        }
        let Some(_latch) = CastingLatch::acquire(&self.casting) else {
            warn!(spell = %spell.name(), "already casting, cast rejected");
            return None;
        };

        let cast = self.next_cast_id();
        let ctx = CastContext::new(
            cast,
            spell.name(),
            self.origin(),
            self.services.clone(),
            self.config.seed,
        );
        self.set_current(spell.name(), cast);
        info!(%cast, spell = %spell.name(), modifiers = spell.len(), "casting");

        let mut failures = Vec::new();
        for (index, node) in spell.iter().enumerate() {
            if let Err(error) = guarded(node, || node.cast(&ctx)) {
                error!(%cast, index, modifier = %node.id(), kind = %node.kind(), %error, "modifier failed");
                failures.push(ModifierFailure {
                    index,
                    modifier: node.id(),
                    error,
                });
            }
        }

        self.release_current(cast);
        debug!(%cast, failures = failures.len(), "cast complete");
        Some(CastOutcome {
            cast,
            context: ctx,
            failures,
        })
    }

    /// Delivers an external event to every modifier in `spell`.
    ///
    /// Each modifier's `on_event` runs with [`Channel::Cast`] semantics in
    /// spell order, under a fresh context carrying `payload`, and the
    /// modifier then publishes its cast channel, so listeners also receive
    /// the event through their sources. When no cast
    /// is running the event becomes the current spell for its duration.
    /// Events are not blocked by the casting guard.
    ///
    /// Returns the event's id, or `None` for an empty spell.
    ///
    /// [`Channel::Cast`]: crate::channel::Channel::Cast
    pub fn trigger_event(&self, spell: &Spell, payload: EventPayload) -> Option<CastId> {
        if spell.is_empty() {
            return None;
        }

        let cast = self.next_cast_id();
        let ctx = CastContext::for_event(
            cast,
            spell.name(),
            self.origin(),
            self.services.clone(),
            self.config.seed,
            payload,
        );
        let owns_current = !self.is_casting();
        if owns_current {
            self.set_current(spell.name(), cast);
        }
        info!(%cast, spell = %spell.name(), event = %ctx.payload().map_or("", |p| p.name.as_str()), "event triggered");

        for (index, node) in spell.iter().enumerate() {
            if let Err(error) = guarded(node, || node.process_event(&ctx)) {
                warn!(%cast, index, modifier = %node.id(), %error, "event handler failed");
            }
        }

        if owns_current {
            self.release_current(cast);
        }
        Some(cast)
    }

    fn set_current(&self, name: &str, cast: CastId) {
        *lock(&self.current) = Some(CurrentSpell {
            name: name.to_string(),
            cast,
        });
    }

    fn release_current(&self, cast: CastId) {
        match self.config.context_retention {
            ContextRetention::ClearImmediately => clear_if_current(&self.current, cast),
            ContextRetention::Linger { seconds } => {
                let current = Arc::clone(&self.current);
                let scheduled = self
                    .services
                    .scheduler
                    .schedule(seconds, Box::new(move || clear_if_current(&current, cast)));
                if let Err(error) = scheduled {
                    warn!(%cast, %error, "could not schedule context release, clearing now");
                    clear_if_current(&self.current, cast);
                }
            }
        }
    }
}

fn clear_if_current(current: &Mutex<Option<CurrentSpell>>, cast: CastId) {
    let mut current = lock(current);
    if current.as_ref().is_some_and(|c| c.cast == cast) {
        *current = None;
    }
}
