//! Reference slots and the resolver that turns them into subscriptions.
//!
//! Each modifier has two configurable slots, A and B. A filled slot names
//! another modifier in the same spell by index, plus which of that
//! modifier's channels to listen to.
//!
//! # Resolution rules
//!
//! - A slot is ignored if its index is out of range or names the owner itself
//! - Nothing is wired for a modifier whose behaviour does not use references
//! - At most one subscription per listened channel: if both slots resolve to
//!   the same channel, slot B wins
//! - Resolution always starts by dropping every existing subscription of the
//!   owner, so resolving twice yields the same wiring as resolving once
//!
//! [`resolve`] is the pure part of this and is what the editor and the
//! property tests use. [`wire`] applies it to live nodes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::Channel;
use crate::context::CastContext;
use crate::modifier::{ModifierNode, Wire};

/// One filled reference slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Index of the source modifier within the spell.
    pub target: usize,
    /// Which of the source's channels to listen to.
    pub channel: Channel,
}

impl Reference {
    /// Listen to `target` on `channel`.
    #[must_use]
    pub const fn new(target: usize, channel: Channel) -> Self {
        Self { target, channel }
    }

    /// Listen to `target`'s cast channel.
    #[must_use]
    pub const fn cast(target: usize) -> Self {
        Self::new(target, Channel::Cast)
    }

    /// Listen to `target`'s action channel.
    #[must_use]
    pub const fn action(target: usize) -> Self {
        Self::new(target, Channel::Action)
    }
}

/// Which of the two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// The first slot.
    A,
    /// The second slot.
    B,
}

/// The two reference slots of a modifier.
///
/// # Example
///
/// ```
/// use spellforge_core::reference::{Reference, ReferenceSlots, Slot};
///
/// let slots = ReferenceSlots::default()
///     .with(Slot::A, Some(Reference::cast(0)))
///     .with(Slot::B, Some(Reference::action(1)));
///
/// assert_eq!(slots.get(Slot::A), Some(Reference::cast(0)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSlots {
    /// Slot A.
    pub a: Option<Reference>,
    /// Slot B.
    pub b: Option<Reference>,
}

impl ReferenceSlots {
    /// Both slots at once.
    #[must_use]
    pub const fn new(a: Option<Reference>, b: Option<Reference>) -> Self {
        Self { a, b }
    }

    /// Reads one slot.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<Reference> {
        match slot {
            Slot::A => self.a,
            Slot::B => self.b,
        }
    }

    /// Writes one slot, returning the previous value.
    pub fn set(&mut self, slot: Slot, reference: Option<Reference>) -> Option<Reference> {
        let target = match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        };
        std::mem::replace(target, reference)
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, slot: Slot, reference: Option<Reference>) -> Self {
        self.set(slot, reference);
        self
    }

    /// Both slots, A first.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, Option<Reference>)> {
        [(Slot::A, self.a), (Slot::B, self.b)].into_iter()
    }

    /// Slots after the modifier at `removed` leaves the spell.
    ///
    /// References to the removed index are cleared; references past it
    /// shift down by one so they keep naming the same modifier.
    #[must_use]
    pub fn after_removal(self, removed: usize) -> Self {
        let remap = |reference: Option<Reference>| {
            reference.and_then(|r| match r.target.cmp(&removed) {
                std::cmp::Ordering::Less => Some(r),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(Reference::new(r.target - 1, r.channel)),
            })
        };
        Self {
            a: remap(self.a),
            b: remap(self.b),
        }
    }
}

/// The subscriptions a modifier should hold, by listened channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedWiring {
    /// Index listened to on its cast channel.
    pub cast: Option<usize>,
    /// Index listened to on its action channel.
    pub action: Option<usize>,
}

impl ResolvedWiring {
    /// Source index for `channel`.
    #[must_use]
    pub fn get(&self, channel: Channel) -> Option<usize> {
        match channel {
            Channel::Cast => self.cast,
            Channel::Action => self.action,
        }
    }

    /// Returns true if nothing would be wired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cast.is_none() && self.action.is_none()
    }

    fn set(&mut self, channel: Channel, target: usize) {
        match channel {
            Channel::Cast => self.cast = Some(target),
            Channel::Action => self.action = Some(target),
        }
    }
}

/// Validates one slot for the modifier at `owner` in a spell of `len`.
#[must_use]
pub fn resolve_slot(reference: Option<Reference>, owner: usize, len: usize) -> Option<Reference> {
    reference.filter(|r| r.target < len && r.target != owner)
}

/// Resolves both slots of the modifier at `owner` in a spell of `len`.
///
/// # Example
///
/// ```
/// use spellforge_core::reference::{resolve, Reference, ReferenceSlots};
///
/// // Slot A points at the owner itself and is ignored.
/// let slots = ReferenceSlots::new(Some(Reference::cast(2)), Some(Reference::action(0)));
/// let wiring = resolve(slots, 2, 3);
///
/// assert_eq!(wiring.cast, None);
/// assert_eq!(wiring.action, Some(0));
/// ```
#[must_use]
pub fn resolve(slots: ReferenceSlots, owner: usize, len: usize) -> ResolvedWiring {
    let mut wiring = ResolvedWiring::default();
    for (_, reference) in slots.iter() {
        if let Some(r) = resolve_slot(reference, owner, len) {
            wiring.set(r.channel, r.target);
        }
    }
    wiring
}

/// Re-wires `node` against `modifiers`, the spell it belongs to.
///
/// Every existing subscription of `node` is dropped first. A node that is
/// not part of `modifiers` ends up with no subscriptions.
pub(crate) fn wire(node: &Arc<ModifierNode>, modifiers: &[Arc<ModifierNode>]) {
    node.unsubscribe_all();
    if !node.uses_reference() {
        return;
    }

    let Some(owner) = modifiers.iter().position(|m| Arc::ptr_eq(m, node)) else {
        debug!(modifier = %node.id(), "modifier is not part of the spell, nothing to wire");
        return;
    };

    let slots = node.references();
    for (slot, reference) in slots.iter() {
        if reference.is_some() && resolve_slot(reference, owner, modifiers.len()).is_none() {
            debug!(modifier = %node.id(), ?slot, ?reference, "ignoring unresolvable reference");
        }
    }
    if let (Some(a), Some(b)) = (
        resolve_slot(slots.a, owner, modifiers.len()),
        resolve_slot(slots.b, owner, modifiers.len()),
    ) {
        if a.channel == b.channel {
            debug!(
                modifier = %node.id(),
                channel = %a.channel,
                "both slots listen on the same channel, slot B wins"
            );
        }
    }

    let resolved = resolve(slots, owner, modifiers.len());
    for channel in Channel::ALL {
        let Some(source) = resolved.get(channel).and_then(|index| modifiers.get(index)) else {
            continue;
        };

        let subscriber = Arc::downgrade(node);
        let subscription = source.broadcast(channel).subscribe(
            node.id(),
            Arc::new(move |ctx: &CastContext| {
                if let Some(subscriber) = subscriber.upgrade() {
                    subscriber.receive(ctx, channel);
                }
            }),
        );
        node.replace_wire(
            channel,
            Some(Wire {
                source: Arc::downgrade(source),
                _subscription: subscription,
            }),
        );
        debug!(modifier = %node.id(), source = %source.id(), %channel, "subscribed");
    }
}
