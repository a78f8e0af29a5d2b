//! Spells: named, ordered lists of modifiers.
//!
//! The order of a spell is both the cast order and the index space that
//! reference slots point into. Every structural edit (push, remove, replace,
//! slot change) re-wires every modifier in the spell, so subscriptions always
//! reflect the current layout.
//!
//! # Example
//!
//! ```
//! use spellforge_core::channel::Channel;
//! use spellforge_core::modifiers::{Collider, Destroy, Projectile};
//! use spellforge_core::reference::{Reference, Slot};
//! use spellforge_core::spell::Spell;
//!
//! let mut spell = Spell::new("Fireball");
//! spell.push(Box::new(Projectile::new(5.0)));
//! spell.push(Box::new(Collider));
//! spell.push(Box::new(Destroy::on_event()));
//!
//! spell.set_reference(1, Slot::A, Some(Reference::cast(0))).unwrap();
//! spell.set_reference(2, Slot::A, Some(Reference::cast(0))).unwrap();
//! spell.set_reference(2, Slot::B, Some(Reference::action(1))).unwrap();
//!
//! let destroy = spell.get(2).unwrap();
//! assert_eq!(destroy.source(Channel::Action).unwrap().id(), spell.get(1).unwrap().id());
//! assert_eq!(
//!     spell.describe(2).unwrap(),
//!     "Destroy\n→ References [OnCast]: Projectile\n→ References [OnAction]: Collider"
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SpellError;
use crate::modifier::{Modifier, ModifierId, ModifierNode};
use crate::reference::{Reference, ReferenceSlots, Slot};
use crate::registry::ModifierConfig;

// =============================================================================
// Definitions
// =============================================================================

/// One modifier of a [`SpellDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDefinition {
    /// Variant and its configuration.
    pub modifier: ModifierConfig,
    /// Reference slots.
    #[serde(default)]
    pub references: ReferenceSlots,
}

/// Plain-data description of a spell.
///
/// # Example
///
/// ```
/// use spellforge_core::spell::{Spell, SpellDefinition};
///
/// let json = r#"{
///     "name": "Fireball",
///     "modifiers": [
///         { "modifier": { "Projectile": { "speed": 5.0 } } },
///         { "modifier": { "Collider": null },
///           "references": { "a": { "target": 0, "channel": "Cast" } } }
///     ]
/// }"#;
///
/// let definition: SpellDefinition = serde_json::from_str(json).unwrap();
/// let spell = Spell::from_definition(definition).unwrap();
/// assert_eq!(spell.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellDefinition {
    /// Spell name.
    pub name: String,
    /// Modifiers in cast order.
    #[serde(default)]
    pub modifiers: Vec<ModifierDefinition>,
}

// =============================================================================
// Spell
// =============================================================================

/// One selectable target for a reference slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOption {
    /// Index of the target modifier.
    pub index: usize,
    /// Its type name.
    pub type_name: &'static str,
}

/// A named, ordered list of modifiers.
pub struct Spell {
    name: String,
    modifiers: Vec<Arc<ModifierNode>>,
}

impl fmt::Debug for Spell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spell")
            .field("name", &self.name)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

impl Spell {
    /// Creates an empty spell.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Vec::new(),
        }
    }

    /// Builds and wires a spell from a definition.
    ///
    /// # Errors
    ///
    /// [`SpellError::InvalidConfig`] if any modifier configuration fails
    /// validation.
    pub fn from_definition(definition: SpellDefinition) -> Result<Self, SpellError> {
        let mut modifiers = Vec::with_capacity(definition.modifiers.len());
        for entry in definition.modifiers {
            entry.modifier.validate()?;
            modifiers.push(ModifierNode::with_references(
                entry.modifier.into_modifier(),
                entry.references,
            ));
        }
        let spell = Self {
            name: definition.name,
            modifiers,
        };
        spell.initialize_references();
        info!(spell = %spell.name, modifiers = spell.len(), "spell loaded");
        Ok(spell)
    }

    /// Spell name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the spell.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of modifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    /// Returns true if the spell has no modifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// The modifier at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<ModifierNode>> {
        self.modifiers.get(index)
    }

    /// All modifiers in cast order.
    #[must_use]
    pub fn modifiers(&self) -> &[Arc<ModifierNode>] {
        &self.modifiers
    }

    /// Iterates modifiers in cast order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<ModifierNode>> {
        self.modifiers.iter()
    }

    /// Position of the modifier with `id`.
    #[must_use]
    pub fn position_of(&self, id: ModifierId) -> Option<usize> {
        self.modifiers.iter().position(|node| node.id() == id)
    }

    /// Appends a modifier with empty slots. Returns its index.
    pub fn push(&mut self, behavior: Box<dyn Modifier>) -> usize {
        self.push_with(behavior, ReferenceSlots::default())
    }

    /// Appends a modifier with the given slots. Returns its index.
    pub fn push_with(&mut self, behavior: Box<dyn Modifier>, references: ReferenceSlots) -> usize {
        let node = ModifierNode::with_references(behavior, references);
        debug!(spell = %self.name, modifier = %node.id(), kind = %node.kind(), "modifier added");
        self.modifiers.push(node);
        self.initialize_references();
        self.modifiers.len() - 1
    }

    /// Removes the modifier at `index` and returns it, unwired.
    ///
    /// Slots elsewhere in the spell that pointed at it are cleared. Slots
    /// pointing past it are renumbered rather than cleared: each shifts down
    /// by one and keeps naming the same modifier. Afterwards no slot names
    /// the removed modifier and none points past the end.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn remove(&mut self, index: usize) -> Result<Arc<ModifierNode>, SpellError> {
        self.check_index(index)?;
        let removed = self.modifiers.remove(index);
        removed.unsubscribe_all();
        for node in &self.modifiers {
            node.set_references(node.references().after_removal(index));
        }
        debug!(spell = %self.name, modifier = %removed.id(), index, "modifier removed");
        self.initialize_references();
        Ok(removed)
    }

    /// Swaps the behaviour at `index` for `behavior`, keeping the slots.
    ///
    /// The new modifier gets a new id. Returns the old node, unwired.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn replace(
        &mut self,
        index: usize,
        behavior: Box<dyn Modifier>,
    ) -> Result<Arc<ModifierNode>, SpellError> {
        self.check_index(index)?;
        let references = self.modifiers[index].references();
        let node = ModifierNode::with_references(behavior, references);
        let old = std::mem::replace(&mut self.modifiers[index], node);
        old.unsubscribe_all();
        debug!(
            spell = %self.name,
            index,
            from = %old.kind(),
            to = %self.modifiers[index].kind(),
            "modifier replaced"
        );
        self.initialize_references();
        Ok(old)
    }

    /// Edits one reference slot of the modifier at `index`, then re-wires.
    /// Returns the previous slot value.
    ///
    /// Slots naming the modifier itself or an index past the end are stored
    /// as given but never wired.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn set_reference(
        &mut self,
        index: usize,
        slot: Slot,
        reference: Option<Reference>,
    ) -> Result<Option<Reference>, SpellError> {
        self.check_index(index)?;
        let node = &self.modifiers[index];
        let mut references = node.references();
        let previous = references.set(slot, reference);
        node.set_references(references);
        debug!(spell = %self.name, modifier = %node.id(), ?slot, ?reference, "reference changed");
        self.initialize_references();
        Ok(previous)
    }

    /// Re-wires every modifier from its current slots.
    pub fn initialize_references(&self) {
        for node in &self.modifiers {
            node.initialize_references(&self.modifiers);
        }
    }

    /// Drops every subscription in the spell.
    pub fn unwire(&self) {
        for node in &self.modifiers {
            node.unsubscribe_all();
        }
    }

    /// Targets selectable for the modifier at `index`: every other modifier.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn reference_options(&self, index: usize) -> Result<Vec<ReferenceOption>, SpellError> {
        self.check_index(index)?;
        Ok(self
            .modifiers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(i, node)| ReferenceOption {
                index: i,
                type_name: node.type_name(),
            })
            .collect())
    }

    /// Debug text for the modifier at `index`: its type name, then one line
    /// per in-range slot naming the channel and the target's type.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn describe(&self, index: usize) -> Result<String, SpellError> {
        self.check_index(index)?;
        let node = &self.modifiers[index];
        let mut text = node.type_name().to_string();
        if node.uses_reference() {
            for (_, reference) in node.references().iter() {
                let Some(reference) = reference else { continue };
                if let Some(target) = self.modifiers.get(reference.target) {
                    text.push_str(&format!(
                        "\n→ References [{}]: {}",
                        reference.channel,
                        target.type_name()
                    ));
                }
            }
        }
        Ok(text)
    }

    fn check_index(&self, index: usize) -> Result<(), SpellError> {
        if index < self.modifiers.len() {
            Ok(())
        } else {
            Err(SpellError::IndexOutOfRange {
                index,
                len: self.modifiers.len(),
            })
        }
    }
}

impl<'a> IntoIterator for &'a Spell {
    type Item = &'a Arc<ModifierNode>;
    type IntoIter = std::slice::Iter<'a, Arc<ModifierNode>>;

    fn into_iter(self) -> Self::IntoIter {
        self.modifiers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::modifiers::{Collider, Delay, Destroy, Log, Projectile};

    fn fireball() -> Spell {
        let mut spell = Spell::new("Fireball");
        spell.push(Box::new(Projectile::new(5.0)));
        spell.push_with(
            Box::new(Collider),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        spell.push_with(
            Box::new(Destroy::on_event()),
            ReferenceSlots::new(Some(Reference::cast(0)), Some(Reference::action(1))),
        );
        spell
    }

    mod edit_tests {
        use super::*;

        #[test]
        fn push_wires_immediately() {
            let spell = fireball();
            let collider = spell.get(1).unwrap();
            assert_eq!(collider.source(Channel::Cast).unwrap().id(), spell.get(0).unwrap().id());
            assert_eq!(spell.get(0).unwrap().broadcast(Channel::Cast).subscriber_count(), 2);
        }

        #[test]
        fn out_of_range_edits_fail() {
            let mut spell = fireball();
            assert_eq!(
                spell.set_reference(9, Slot::A, None),
                Err(SpellError::IndexOutOfRange { index: 9, len: 3 })
            );
            assert!(spell.remove(3).is_err());
            assert!(spell.replace(3, Box::new(Delay::default())).is_err());
            assert!(spell.describe(3).is_err());
        }

        #[test]
        fn remove_clears_and_shifts_slots() {
            let mut spell = fireball();
            let removed = spell.remove(1).unwrap();
            assert_eq!(removed.subscription_count(), 0);

            let destroy = spell.get(1).unwrap();
            assert_eq!(destroy.references().a, Some(Reference::cast(0)));
            assert_eq!(destroy.references().b, None);
            assert!(!destroy.is_listening(Channel::Action));
            assert!(destroy.is_listening(Channel::Cast));
        }

        #[test]
        fn remove_renumbers_later_targets_to_the_same_modifier() {
            let mut spell = Spell::new("renumber");
            spell.push(Box::new(Delay::new(1.0)));
            spell.push(Box::new(Delay::new(2.0)));
            spell.push_with(
                Box::new(Log::events_only()),
                ReferenceSlots::new(None, Some(Reference::action(1))),
            );
            let second = spell.get(1).unwrap().id();

            spell.remove(0).unwrap();
            let log = spell.get(1).unwrap();
            assert_eq!(log.references().b, Some(Reference::action(0)));
            assert_eq!(log.source(Channel::Action).unwrap().id(), second);
        }

        #[test]
        fn removing_the_source_unwires_listeners() {
            let mut spell = fireball();
            spell.remove(0).unwrap();
            let collider = spell.get(0).unwrap();
            assert_eq!(collider.subscription_count(), 0);
            let destroy = spell.get(1).unwrap();
            assert_eq!(destroy.references().b, Some(Reference::action(0)));
            assert!(destroy.is_listening(Channel::Action));
        }

        #[test]
        fn replace_keeps_slots_and_rewires_listeners() {
            let mut spell = fireball();
            let old_id = spell.get(0).unwrap().id();
            spell.replace(0, Box::new(Projectile::new(9.0))).unwrap();

            let new_id = spell.get(0).unwrap().id();
            assert_ne!(old_id, new_id);
            assert_eq!(spell.get(1).unwrap().source(Channel::Cast).unwrap().id(), new_id);
        }

        #[test]
        fn set_reference_returns_previous() {
            let mut spell = fireball();
            let previous = spell.set_reference(2, Slot::B, None).unwrap();
            assert_eq!(previous, Some(Reference::action(1)));
            assert!(!spell.get(2).unwrap().is_listening(Channel::Action));
        }

        #[test]
        fn unwire_drops_everything() {
            let spell = fireball();
            spell.unwire();
            assert!(spell.iter().all(|node| node.subscription_count() == 0));
        }
    }

    mod authoring_tests {
        use super::*;

        #[test]
        fn options_exclude_self() {
            let spell = fireball();
            let options = spell.reference_options(1).unwrap();
            assert_eq!(
                options,
                vec![
                    ReferenceOption {
                        index: 0,
                        type_name: "Projectile",
                    },
                    ReferenceOption {
                        index: 2,
                        type_name: "Destroy",
                    },
                ]
            );
        }

        #[test]
        fn describe_without_references_is_type_name() {
            let mut spell = Spell::new("s");
            spell.push(Box::new(Delay::default()));
            assert_eq!(spell.describe(0).unwrap(), "Delay");
        }

        #[test]
        fn describe_skips_out_of_range_slots() {
            let mut spell = Spell::new("s");
            spell.push(Box::new(Log::default()));
            spell.push_with(
                Box::new(Log::default()),
                ReferenceSlots::new(Some(Reference::cast(7)), Some(Reference::action(0))),
            );
            assert_eq!(spell.describe(1).unwrap(), "Log\n→ References [OnAction]: Log");
        }
    }

    #[test]
    fn position_of_finds_by_id() {
        let spell = fireball();
        let id = spell.get(2).unwrap().id();
        assert_eq!(spell.position_of(id), Some(2));
        assert_eq!(spell.position_of(ModifierId::new(u64::MAX)), None);
    }
}
