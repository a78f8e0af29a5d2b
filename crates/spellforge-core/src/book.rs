//! A caster's collection of spells.
//!
//! Spells in a [`SpellBook`] carry a `selected` flag; casting the book casts
//! every selected spell in order. Each spell is its own reference universe,
//! so [`SpellBook::initialize_all`] wires them in parallel.

use rayon::prelude::*;
use tracing::debug;

use crate::caster::{CastOutcome, Caster};
use crate::error::SpellError;
use crate::spell::Spell;

/// One spell in a book.
#[derive(Debug)]
pub struct SpellEntry {
    /// The spell.
    pub spell: Spell,
    /// Whether `cast_selected` casts it.
    pub selected: bool,
}

/// An ordered list of spells with selection flags.
///
/// # Example
///
/// ```
/// use spellforge_core::book::SpellBook;
/// use spellforge_core::caster::{Caster, CasterConfig};
/// use spellforge_core::modifiers::Log;
/// use spellforge_core::spell::Spell;
/// use spellforge_host::sim::SimHost;
///
/// let host = SimHost::new();
/// let caster = Caster::new(host.services(), CasterConfig::default());
///
/// let mut book = SpellBook::new();
/// for name in ["a", "b", "c"] {
///     let mut spell = Spell::new(name);
///     spell.push(Box::new(Log::default()));
///     book.add(spell);
/// }
/// book.deselect(1).unwrap();
///
/// let outcomes = book.cast_selected(&caster);
/// assert_eq!(outcomes.len(), 2);
/// assert_eq!(host.log().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SpellBook {
    entries: Vec<SpellEntry>,
}

impl SpellBook {
    /// An empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a selected spell. Returns its index.
    pub fn add(&mut self, spell: Spell) -> usize {
        self.entries.push(SpellEntry {
            spell,
            selected: true,
        });
        self.entries.len() - 1
    }

    /// Number of spells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The spell at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Spell> {
        self.entries.get(index).map(|entry| &entry.spell)
    }

    /// The spell at `index`, for editing.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Spell> {
        self.entries.get_mut(index).map(|entry| &mut entry.spell)
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[SpellEntry] {
        &self.entries
    }

    /// Finds a spell by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Spell> {
        self.entries
            .iter()
            .map(|entry| &entry.spell)
            .find(|spell| spell.name() == name)
    }

    /// Removes and returns the spell at `index`.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn remove(&mut self, index: usize) -> Result<Spell, SpellError> {
        self.check_index(index)?;
        Ok(self.entries.remove(index).spell)
    }

    /// Marks the spell at `index` for casting.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn select(&mut self, index: usize) -> Result<(), SpellError> {
        self.set_selected(index, true)
    }

    /// Excludes the spell at `index` from casting.
    ///
    /// # Errors
    ///
    /// [`SpellError::IndexOutOfRange`] if `index` is past the end.
    pub fn deselect(&mut self, index: usize) -> Result<(), SpellError> {
        self.set_selected(index, false)
    }

    /// Selected spells in order.
    pub fn selected(&self) -> impl Iterator<Item = &Spell> {
        self.entries
            .iter()
            .filter(|entry| entry.selected)
            .map(|entry| &entry.spell)
    }

    /// Re-wires every spell, in parallel.
    pub fn initialize_all(&self) {
        self.entries
            .par_iter()
            .for_each(|entry| entry.spell.initialize_references());
        debug!(spells = self.entries.len(), "spell book wired");
    }

    /// Casts every selected spell through `caster`, in order. Returns the
    /// outcome of each cast the caster accepted.
    pub fn cast_selected(&self, caster: &Caster) -> Vec<CastOutcome> {
        self.selected().filter_map(|spell| caster.cast(spell)).collect()
    }

    fn set_selected(&mut self, index: usize, selected: bool) -> Result<(), SpellError> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(SpellError::IndexOutOfRange { index, len })?;
        entry.selected = selected;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), SpellError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(SpellError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::modifiers::{Collider, Projectile};
    use crate::reference::{Reference, ReferenceSlots};

    fn wired_spell(name: &str) -> Spell {
        let mut spell = Spell::new(name);
        spell.push(Box::new(Projectile::default()));
        spell.push_with(
            Box::new(Collider),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        spell
    }

    #[test]
    fn initialize_all_rewires_every_spell() {
        let mut book = SpellBook::new();
        for i in 0..16 {
            book.add(wired_spell(&format!("spell-{i}")));
        }
        for entry in book.entries() {
            entry.spell.unwire();
        }

        book.initialize_all();
        for entry in book.entries() {
            assert!(entry.spell.get(1).unwrap().is_listening(Channel::Cast));
        }
    }

    #[test]
    fn initialize_all_is_idempotent() {
        let mut book = SpellBook::new();
        book.add(wired_spell("a"));
        book.initialize_all();
        book.initialize_all();
        let spell = book.get(0).unwrap();
        assert_eq!(spell.get(0).unwrap().broadcast(Channel::Cast).subscriber_count(), 1);
    }

    #[test]
    fn selection_edits_check_bounds() {
        let mut book = SpellBook::new();
        book.add(wired_spell("a"));
        assert!(book.select(1).is_err());
        book.deselect(0).unwrap();
        assert_eq!(book.selected().count(), 0);
        book.select(0).unwrap();
        assert_eq!(book.selected().count(), 1);
    }

    #[test]
    fn find_and_remove() {
        let mut book = SpellBook::new();
        book.add(wired_spell("a"));
        book.add(wired_spell("b"));
        assert!(book.find("b").is_some());
        assert_eq!(book.remove(0).unwrap().name(), "a");
        assert_eq!(book.len(), 1);
        assert!(book.find("a").is_none());
        assert!(book.get_mut(0).is_some());
    }
}
