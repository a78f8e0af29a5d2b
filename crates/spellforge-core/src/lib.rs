//! # Spellforge Core
//!
//! Spell-modifier composition and event-propagation engine.
//!
//! A spell is an ordered list of modifiers. Casting a spell runs each
//! modifier's cast hook in order. Modifiers are wired to each other through
//! two reference slots: a modifier listening to another's **cast** channel
//! reacts when that modifier is cast, and one listening to an **action**
//! channel reacts when that modifier acts (after a delay, on a contact,
//! ...). Complex behaviour comes from composition: a projectile, a collider
//! watching it, and a destroy reacting to the collider make a fireball.
//!
//! ## Architecture
//!
//! - **Channels** ([`channel`]): synchronous broadcast points with RAII
//!   subscription tokens
//! - **Modifiers** ([`modifier`], [`modifiers`]): the behaviour trait, the
//!   per-modifier runtime node, and the built-in variants
//! - **References** ([`reference`]): slot data and the pure resolver that
//!   decides which subscriptions exist
//! - **Spells** ([`spell`], [`book`], [`registry`]): ordered lists, editing,
//!   definitions, and the type registry
//! - **Casting** ([`caster`], [`context`]): the cast pipeline and per-cast state
//!
//! The engine never touches engine objects, physics, or timers directly; it
//! goes through the capabilities in [`spellforge_host`].
//!
//! ## Usage
//!
//! ```
//! use spellforge_core::caster::{Caster, CasterConfig};
//! use spellforge_core::modifiers::{Delay, Log};
//! use spellforge_core::reference::{Reference, ReferenceSlots};
//! use spellforge_core::spell::Spell;
//! use spellforge_host::sim::SimHost;
//! use spellforge_host::LogKind;
//!
//! let host = SimHost::new();
//! let caster = Caster::new(host.services(), CasterConfig::default());
//!
//! let mut spell = Spell::new("Slow Hello");
//! spell.push(Box::new(Delay::new(2.0)));
//! spell.push_with(
//!     Box::new(Log::events_only()),
//!     ReferenceSlots::new(None, Some(Reference::action(0))),
//! );
//!
//! caster.cast(&spell).unwrap();
//! assert_eq!(host.log().count(LogKind::Action), 0);
//!
//! host.advance(2.0);
//! assert_eq!(host.log().count(LogKind::Action), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export the host crate so users need only one dependency
pub use spellforge_host;

pub mod book;
pub mod caster;
pub mod channel;
pub mod context;
pub mod error;
pub mod modifier;
pub mod modifiers;
pub mod reference;
pub mod registry;
pub mod spell;

// Re-exports for convenience
pub use book::SpellBook;
pub use caster::{CastOutcome, Caster, CasterConfig, CasterOrigin, CasterState, ContextRetention};
pub use channel::Channel;
pub use context::{CastContext, CastId, EventPayload};
pub use error::{ModifierError, SpellError};
pub use modifier::{Modifier, ModifierId, ModifierKind, ModifierNode, ModifierScope};
pub use reference::{Reference, ReferenceSlots, Slot};
pub use registry::{ModifierConfig, ModifierRegistry};
pub use spell::{Spell, SpellDefinition};

#[cfg(test)]
mod tests;
