//! Per-cast execution context.
//!
//! Every cast and every externally triggered event gets a fresh
//! [`CastContext`]. It carries the identity of the cast, the caster's origin
//! at cast time, the host services, and all per-cast modifier state: the
//! object each modifier exposed and any pending timer a modifier may want to
//! cancel. Scheduled continuations clone the context, so it stays alive
//! until the last of them has run.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use spellforge_host::{ObjectHandle, Services, TimerHandle};

use crate::caster::CasterOrigin;
use crate::modifier::ModifierId;

/// Nested publishes deeper than this are dropped.
///
/// Only a reference cycle between modifiers can reach it.
pub const MAX_PROPAGATION_DEPTH: usize = 64;

/// Identifier of one cast (or one triggered event) within a caster.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CastId(u64);

impl CastId {
    /// Creates an id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CastId({})", self.0)
    }
}

impl fmt::Display for CastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cast#{}", self.0)
    }
}

/// Data attached to an externally triggered event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Free-form event name, e.g. `"button"`.
    pub name: String,
    /// Where the event happened, if it has a location.
    pub position: Option<Vec3>,
}

impl EventPayload {
    /// A named event without a location.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: None,
        }
    }

    /// Attaches a location.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }
}

struct CastState {
    id: CastId,
    spell: String,
    origin: CasterOrigin,
    services: Services,
    payload: Option<EventPayload>,
    exposed: Mutex<HashMap<ModifierId, ObjectHandle>>,
    timers: Mutex<HashMap<ModifierId, TimerHandle>>,
    rng: Mutex<ChaCha8Rng>,
    depth: AtomicUsize,
}

/// Shared handle to the state of one cast.
///
/// Cloning is cheap; all clones see the same state.
#[derive(Clone)]
pub struct CastContext {
    inner: Arc<CastState>,
}

impl fmt::Debug for CastContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastContext")
            .field("id", &self.inner.id)
            .field("spell", &self.inner.spell)
            .field("origin", &self.inner.origin)
            .field("payload", &self.inner.payload)
            .field("exposed", &*lock(&self.inner.exposed))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CastContext {
    /// Creates the context for one cast.
    ///
    /// The random stream is seeded from `seed` and the cast id, so replaying
    /// the same casts with the same seed reproduces every roll.
    #[must_use]
    pub fn new(
        id: CastId,
        spell: impl Into<String>,
        origin: CasterOrigin,
        services: Services,
        seed: u64,
    ) -> Self {
        Self::build(id, spell.into(), origin, services, seed, None)
    }

    /// Creates the context for an externally triggered event.
    #[must_use]
    pub fn for_event(
        id: CastId,
        spell: impl Into<String>,
        origin: CasterOrigin,
        services: Services,
        seed: u64,
        payload: EventPayload,
    ) -> Self {
        Self::build(id, spell.into(), origin, services, seed, Some(payload))
    }

    fn build(
        id: CastId,
        spell: String,
        origin: CasterOrigin,
        services: Services,
        seed: u64,
        payload: Option<EventPayload>,
    ) -> Self {
        let stream = seed ^ id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            inner: Arc::new(CastState {
                id,
                spell,
                origin,
                services,
                payload,
                exposed: Mutex::new(HashMap::new()),
                timers: Mutex::new(HashMap::new()),
                rng: Mutex::new(ChaCha8Rng::seed_from_u64(stream)),
                depth: AtomicUsize::new(0),
            }),
        }
    }

    /// This cast's id.
    #[must_use]
    pub fn id(&self) -> CastId {
        self.inner.id
    }

    /// Name of the spell being cast.
    #[must_use]
    pub fn spell_name(&self) -> &str {
        &self.inner.spell
    }

    /// Caster position and facing when the cast started.
    #[must_use]
    pub fn origin(&self) -> CasterOrigin {
        self.inner.origin
    }

    /// Host services.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    /// The triggering event, for contexts created by a triggered event.
    #[must_use]
    pub fn payload(&self) -> Option<&EventPayload> {
        self.inner.payload.as_ref()
    }

    /// The object `modifier` exposed in this cast.
    #[must_use]
    pub fn exposed_object(&self, modifier: ModifierId) -> Option<ObjectHandle> {
        lock(&self.inner.exposed).get(&modifier).copied()
    }

    /// Records `object` as `modifier`'s exposed object in this cast.
    pub fn expose(&self, modifier: ModifierId, object: ObjectHandle) {
        lock(&self.inner.exposed).insert(modifier, object);
    }

    /// Number of modifiers that exposed an object in this cast.
    #[must_use]
    pub fn exposed_count(&self) -> usize {
        lock(&self.inner.exposed).len()
    }

    /// Records a pending timer for `modifier`, returning the one it replaces.
    pub fn set_timer(&self, modifier: ModifierId, timer: TimerHandle) -> Option<TimerHandle> {
        lock(&self.inner.timers).insert(modifier, timer)
    }

    /// Removes and returns `modifier`'s pending timer.
    pub fn take_timer(&self, modifier: ModifierId) -> Option<TimerHandle> {
        lock(&self.inner.timers).remove(&modifier)
    }

    /// Uniform roll in `[0, max)`. Always 0 when `max` is 0.
    #[must_use]
    pub fn roll(&self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        lock(&self.inner.rng).gen_range(0..max)
    }

    /// Current nesting depth of publishes in this cast.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::Relaxed)
    }

    /// Enters one level of publish nesting. `None` past the depth limit.
    pub(crate) fn descend(&self) -> Option<DepthGuard<'_>> {
        let depth = self.inner.depth.fetch_add(1, Ordering::AcqRel);
        let guard = DepthGuard { depth: &self.inner.depth };
        (depth < MAX_PROPAGATION_DEPTH).then_some(guard)
    }
}

pub(crate) struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}
