//! The modifier contract and the per-modifier runtime node.
//!
//! A [`Modifier`] is the behaviour: what happens when it is cast and when it
//! receives an event from another modifier. A [`ModifierNode`] wraps one
//! behaviour with everything the engine needs around it: a stable
//! [`ModifierId`], the two reference slots, the two broadcast channels other
//! modifiers may listen to, and the subscriptions this node currently holds.
//!
//! Hooks receive a [`ModifierScope`], which ties the node to the
//! [`CastContext`] of the cast or event being processed. Everything a
//! modifier remembers about one cast (the object it exposes, a pending
//! timer) lives in that context, so overlapping casts of the same spell
//! never see each other's state.
//!
//! # Example
//!
//! ```
//! use spellforge_core::modifier::{Modifier, ModifierKind, ModifierScope};
//! use spellforge_core::ModifierError;
//! use spellforge_host::LogKind;
//!
//! #[derive(Debug)]
//! struct Shout;
//!
//! impl Modifier for Shout {
//!     fn kind(&self) -> ModifierKind {
//!         ModifierKind::Custom("Shout")
//!     }
//!
//!     fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
//!         scope.log(LogKind::Cast, "HEY");
//!         scope.action(|| {});
//!         Ok(())
//!     }
//! }
//!
//! assert_eq!(Shout.kind().name(), "Shout");
//! assert!(!Shout.uses_reference());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use spellforge_host::{LogKind, ObjectHandle, ScheduledAction, Services, SpellLogLine, TimerHandle};
use tracing::{debug, trace, warn};

use crate::caster::CasterOrigin;
use crate::channel::{Broadcast, Channel, Channels, Subscription};
use crate::context::CastContext;
use crate::error::ModifierError;
use crate::reference::{self, Reference, ReferenceSlots, Slot};

// =============================================================================
// Identity
// =============================================================================

static NEXT_MODIFIER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a modifier node.
///
/// Ids are never reused, so an id held by a stale subscription or a pending
/// timer can never alias a newer modifier.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModifierId(u64);

impl ModifierId {
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

    pub(crate) fn next() -> Self {
        Self(NEXT_MODIFIER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModifierId({})", self.0)
    }
}

impl fmt::Display for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Kind and labels
// =============================================================================

/// The type of a modifier.
///
/// The built-in kinds decide whether a modifier exposes a per-cast object to
/// its listeners. Custom kinds never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// Spawns a moving projectile.
    Projectile,
    /// Reacts to the first contact of a referenced object.
    Collider,
    /// Fires its action after a delay.
    Delay,
    /// Attaches a particle effect.
    Particle,
    /// Destroys an object on a timer or on an event.
    Destroy,
    /// Writes designer-authored log lines.
    Log,
    /// Reference implementation of the full hook surface.
    Template,
    /// Anything registered from outside the crate.
    Custom(&'static str),
}

impl ModifierKind {
    /// Type name as shown in editors and descriptions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Projectile => "Projectile",
            Self::Collider => "Collider",
            Self::Delay => "Delay",
            Self::Particle => "Particle",
            Self::Destroy => "Destroy",
            Self::Log => "Log",
            Self::Template => "Template",
            Self::Custom(name) => name,
        }
    }

    /// Whether listeners may read this kind's exposed object.
    #[must_use]
    pub fn exposes_object(self) -> bool {
        matches!(
            self,
            Self::Projectile | Self::Collider | Self::Particle | Self::Destroy | Self::Template
        )
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Editor labels for the two reference slots.
///
/// `slot_b` is `None` when the modifier hides its second slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceLabels {
    /// Label of slot A.
    pub slot_a: &'static str,
    /// Label of slot B, if shown.
    pub slot_b: Option<&'static str>,
}

impl Default for ReferenceLabels {
    fn default() -> Self {
        Self {
            slot_a: "Listen for OnCast Event from:",
            slot_b: Some("Listen for OnAction Event from:"),
        }
    }
}

// =============================================================================
// Modifier
// =============================================================================

/// Behaviour of one modifier variant.
///
/// Implementations hold configuration only. Per-cast state goes through the
/// [`ModifierScope`] into the cast context.
pub trait Modifier: Send + Sync + fmt::Debug {
    /// The modifier's type.
    fn kind(&self) -> ModifierKind;

    /// Whether the reference slots are wired at all.
    fn uses_reference(&self) -> bool {
        false
    }

    /// Labels for the editor.
    fn reference_labels(&self) -> ReferenceLabels {
        ReferenceLabels::default()
    }

    /// Runs when the spell is cast, before this modifier's cast channel fires.
    ///
    /// # Errors
    ///
    /// Any [`ModifierError`]; the caster records it and continues with the
    /// next modifier.
    fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError>;

    /// Runs when a subscribed source publishes on `channel`.
    ///
    /// On success the node relays the broadcast on its own `channel`, so
    /// listeners further down a chain see it too.
    ///
    /// # Errors
    ///
    /// Any [`ModifierError`]; it is logged, this node does not relay, and the
    /// source's broadcast continues to its other listeners.
    fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        let _ = (scope, channel);
        Ok(())
    }
}

// =============================================================================
// Node
// =============================================================================

pub(crate) struct Wire {
    pub(crate) source: Weak<ModifierNode>,
    pub(crate) _subscription: Subscription,
}

#[derive(Default)]
pub(crate) struct Wiring {
    cast: Option<Wire>,
    action: Option<Wire>,
}

impl Wiring {
    pub(crate) fn get(&self, channel: Channel) -> Option<&Wire> {
        match channel {
            Channel::Cast => self.cast.as_ref(),
            Channel::Action => self.action.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, channel: Channel, wire: Option<Wire>) -> Option<Wire> {
        let slot = match channel {
            Channel::Cast => &mut self.cast,
            Channel::Action => &mut self.action,
        };
        std::mem::replace(slot, wire)
    }
}

/// A modifier placed in a spell.
///
/// Nodes are always handled through `Arc`. Listeners registered on other
/// nodes hold only `Weak` links back to this one, and this node's
/// subscriptions hold only `Weak` links to its sources, so removing a node
/// from its spell frees it even while references to it remain configured.
pub struct ModifierNode {
    id: ModifierId,
    behavior: Box<dyn Modifier>,
    references: Mutex<ReferenceSlots>,
    channels: Channels<CastContext>,
    wiring: Mutex<Wiring>,
}

impl fmt::Debug for ModifierNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierNode")
            .field("id", &self.id)
            .field("kind", &self.behavior.kind())
            .field("references", &self.references())
            .finish_non_exhaustive()
    }
}

impl ModifierNode {
    /// Wraps `behavior` with empty reference slots.
    #[must_use]
    pub fn new(behavior: Box<dyn Modifier>) -> Arc<Self> {
        Self::with_references(behavior, ReferenceSlots::default())
    }

    /// Wraps `behavior` with the given reference slots.
    #[must_use]
    pub fn with_references(behavior: Box<dyn Modifier>, references: ReferenceSlots) -> Arc<Self> {
        let id = ModifierId::next();
        Arc::new(Self {
            id,
            behavior,
            references: Mutex::new(references),
            channels: Channels::new(id),
            wiring: Mutex::new(Wiring::default()),
        })
    }

    /// This node's id.
    #[must_use]
    pub fn id(&self) -> ModifierId {
        self.id
    }

    /// The behaviour's kind.
    #[must_use]
    pub fn kind(&self) -> ModifierKind {
        self.behavior.kind()
    }

    /// Type name, e.g. `Projectile`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.behavior.kind().name()
    }

    /// Short label used as the source of log lines, e.g. `Log#7`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}#{}", self.type_name(), self.id)
    }

    /// The wrapped behaviour.
    #[must_use]
    pub fn behavior(&self) -> &dyn Modifier {
        self.behavior.as_ref()
    }

    /// Whether this node wires its reference slots.
    #[must_use]
    pub fn uses_reference(&self) -> bool {
        self.behavior.uses_reference()
    }

    /// Current reference slots.
    #[must_use]
    pub fn references(&self) -> ReferenceSlots {
        *self.lock_references()
    }

    /// One reference slot.
    #[must_use]
    pub fn reference(&self, slot: Slot) -> Option<Reference> {
        self.lock_references().get(slot)
    }

    pub(crate) fn set_references(&self, references: ReferenceSlots) {
        *self.lock_references() = references;
    }

    /// The broadcast this node publishes on for `channel`.
    #[must_use]
    pub fn broadcast(&self, channel: Channel) -> &Broadcast<CastContext> {
        self.channels.get(channel)
    }

    /// The node this one currently listens to on `channel`, if it is alive.
    #[must_use]
    pub fn source(&self, channel: Channel) -> Option<Arc<ModifierNode>> {
        self.lock_wiring()
            .get(channel)
            .and_then(|wire| wire.source.upgrade())
    }

    /// Whether this node currently holds a subscription for `channel`.
    #[must_use]
    pub fn is_listening(&self, channel: Channel) -> bool {
        self.lock_wiring().get(channel).is_some()
    }

    /// Number of subscriptions this node currently holds.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        let wiring = self.lock_wiring();
        Channel::ALL
            .iter()
            .filter(|channel| wiring.get(**channel).is_some())
            .count()
    }

    /// Drops every subscription this node holds, then re-wires from the
    /// current reference slots against `modifiers`.
    ///
    /// `modifiers` is the spell this node belongs to. Calling this again
    /// without changes leaves exactly the same subscriptions in place.
    pub fn initialize_references(self: &Arc<Self>, modifiers: &[Arc<ModifierNode>]) {
        reference::wire(self, modifiers);
    }

    /// Drops every subscription this node holds.
    pub fn unsubscribe_all(&self) {
        let old = std::mem::take(&mut *self.lock_wiring());
        drop(old);
    }

    pub(crate) fn replace_wire(&self, channel: Channel, wire: Option<Wire>) {
        let old = self.lock_wiring().set(channel, wire);
        drop(old);
    }

    /// Runs `on_cast`, then publishes on the cast channel.
    ///
    /// The cast channel is not published if `on_cast` fails.
    ///
    /// # Errors
    ///
    /// Whatever `on_cast` returned.
    pub fn cast(self: &Arc<Self>, ctx: &CastContext) -> Result<(), ModifierError> {
        trace!(modifier = %self.id, kind = %self.kind(), cast = %ctx.id(), "on_cast");
        self.behavior.on_cast(&self.scope(ctx))?;
        self.publish(ctx, Channel::Cast);
        Ok(())
    }

    /// Publishes on the action channel, then runs `follow_up`.
    pub fn fire_action(self: &Arc<Self>, ctx: &CastContext, follow_up: impl FnOnce()) {
        self.publish(ctx, Channel::Action);
        follow_up();
    }

    /// Delivers an external event to this node as if a cast source fired,
    /// then publishes on the cast channel so listeners see it too.
    ///
    /// Nothing is published if `on_event` fails.
    ///
    /// # Errors
    ///
    /// Whatever `on_event` returned.
    pub fn process_event(self: &Arc<Self>, ctx: &CastContext) -> Result<(), ModifierError> {
        self.behavior.on_event(&self.scope(ctx), Channel::Cast)?;
        self.publish(ctx, Channel::Cast);
        Ok(())
    }

    /// A scope binding this node to `ctx`.
    #[must_use]
    pub fn scope<'a>(self: &'a Arc<Self>, ctx: &'a CastContext) -> ModifierScope<'a> {
        ModifierScope { node: self, ctx }
    }

    /// Runs `on_event` for a broadcast from a source, then relays it on this
    /// node's own channel of the same kind.
    pub(crate) fn receive(self: &Arc<Self>, ctx: &CastContext, channel: Channel) {
        match self.behavior.on_event(&self.scope(ctx), channel) {
            Ok(()) => self.publish(ctx, channel),
            Err(error) => warn!(
                modifier = %self.id,
                kind = %self.kind(),
                %channel,
                %error,
                "event handler failed"
            ),
        }
    }

    fn publish(&self, ctx: &CastContext, channel: Channel) {
        let Some(_depth) = ctx.descend() else {
            warn!(
                modifier = %self.id,
                %channel,
                depth = ctx.depth(),
                "propagation depth exceeded, dropping broadcast"
            );
            return;
        };
        let delivered = self.channels.get(channel).publish(ctx);
        trace!(modifier = %self.id, %channel, delivered, "published");
    }

    fn lock_references(&self) -> MutexGuard<'_, ReferenceSlots> {
        self.references.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_wiring(&self) -> MutexGuard<'_, Wiring> {
        self.wiring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Scope
// =============================================================================

/// What a hook sees: its own node plus the cast it runs in.
pub struct ModifierScope<'a> {
    node: &'a Arc<ModifierNode>,
    ctx: &'a CastContext,
}

impl fmt::Debug for ModifierScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierScope")
            .field("modifier", &self.node.id)
            .field("cast", &self.ctx.id())
            .finish()
    }
}

impl<'a> ModifierScope<'a> {
    /// The running modifier's id.
    #[must_use]
    pub fn id(&self) -> ModifierId {
        self.node.id
    }

    /// The running modifier's node.
    #[must_use]
    pub fn node(&self) -> &'a Arc<ModifierNode> {
        self.node
    }

    /// The cast being processed.
    #[must_use]
    pub fn ctx(&self) -> &'a CastContext {
        self.ctx
    }

    /// Host services for this cast.
    #[must_use]
    pub fn services(&self) -> &'a Services {
        self.ctx.services()
    }

    /// Caster position and facing at cast time.
    #[must_use]
    pub fn origin(&self) -> CasterOrigin {
        self.ctx.origin()
    }

    /// Publishes on this modifier's action channel, then runs `follow_up`.
    pub fn action(&self, follow_up: impl FnOnce()) {
        self.node.fire_action(self.ctx, follow_up);
    }

    /// The node this modifier listens to on `channel`.
    #[must_use]
    pub fn source(&self, channel: Channel) -> Option<Arc<ModifierNode>> {
        self.node.source(channel)
    }

    /// The object exposed in this cast by the source on `channel`.
    ///
    /// `None` if there is no source, the source's kind does not expose
    /// objects, or the source has not exposed one in this cast.
    #[must_use]
    pub fn object_from(&self, channel: Channel) -> Option<ObjectHandle> {
        let source = self.source(channel)?;
        if !source.kind().exposes_object() {
            debug!(
                modifier = %self.node.id,
                source = %source.id(),
                kind = %source.kind(),
                "source does not expose an object"
            );
            return None;
        }
        self.ctx.exposed_object(source.id())
    }

    /// Records `object` as this modifier's exposed object for this cast.
    pub fn expose(&self, object: ObjectHandle) {
        self.ctx.expose(self.node.id, object);
    }

    /// The object this modifier exposed in this cast, if any.
    #[must_use]
    pub fn exposed(&self) -> Option<ObjectHandle> {
        self.ctx.exposed_object(self.node.id)
    }

    /// Remembers a pending timer for this modifier in this cast, returning
    /// any timer it replaces.
    pub fn set_timer(&self, timer: TimerHandle) -> Option<TimerHandle> {
        self.ctx.set_timer(self.node.id, timer)
    }

    /// Removes and returns this modifier's pending timer for this cast.
    pub fn take_timer(&self) -> Option<TimerHandle> {
        self.ctx.take_timer(self.node.id)
    }

    /// Runs `action` after `delay_secs` on the host scheduler.
    ///
    /// # Errors
    ///
    /// [`ModifierError::Host`] if the scheduler rejects the delay.
    pub fn schedule(
        &self,
        delay_secs: f32,
        action: impl FnOnce() + Send + 'static,
    ) -> Result<TimerHandle, ModifierError> {
        let action: ScheduledAction = Box::new(action);
        Ok(self.services().scheduler.schedule(delay_secs, action)?)
    }

    /// A handle for re-entering this scope from a deferred continuation.
    #[must_use]
    pub fn deferred(&self) -> DeferredScope {
        DeferredScope {
            node: Arc::downgrade(self.node),
            ctx: self.ctx.clone(),
        }
    }

    /// Uniform roll in `[0, max)` from this cast's random stream.
    #[must_use]
    pub fn roll(&self, max: u32) -> u32 {
        self.ctx.roll(max)
    }

    /// Emits a spell log line attributed to this modifier.
    pub fn log(&self, kind: LogKind, text: impl Into<String>) {
        self.services().log.emit(SpellLogLine {
            source: self.node.label(),
            kind,
            text: text.into(),
        });
    }

    /// Builds a [`ModifierError::Failed`] for this modifier.
    #[must_use]
    pub fn fail(&self, reason: impl Into<String>) -> ModifierError {
        ModifierError::Failed {
            modifier: self.node.id,
            reason: reason.into(),
        }
    }
}

/// A scope captured for later: a weak link to the node plus the cast.
///
/// Scheduled actions and contact callbacks hold one of these. If the node
/// has been dropped from its spell by the time the continuation runs, the
/// continuation does nothing.
#[derive(Clone)]
pub struct DeferredScope {
    node: Weak<ModifierNode>,
    ctx: CastContext,
}

impl fmt::Debug for DeferredScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredScope")
            .field("alive", &(self.node.strong_count() > 0))
            .field("cast", &self.ctx.id())
            .finish()
    }
}

impl DeferredScope {
    /// Runs `f` in the captured scope. Returns `None` if the node is gone.
    pub fn enter<R>(&self, f: impl FnOnce(&ModifierScope<'_>) -> R) -> Option<R> {
        let Some(node) = self.node.upgrade() else {
            debug!(cast = %self.ctx.id(), "deferred continuation for a dropped modifier");
            return None;
        };
        let scope = node.scope(&self.ctx);
        Some(f(&scope))
    }

    /// The captured cast.
    #[must_use]
    pub fn ctx(&self) -> &CastContext {
        &self.ctx
    }
}

// =============================================================================
// Tests
// =============================================================================
