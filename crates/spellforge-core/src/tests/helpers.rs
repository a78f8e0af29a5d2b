//! Test harness and counting modifiers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use spellforge_host::sim::SimHost;
use spellforge_host::Services;

use crate::caster::{Caster, CasterConfig};
use crate::channel::Channel;
use crate::context::CastContext;
use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope};
use crate::reference::{Reference, ReferenceSlots};
use crate::spell::Spell;

/// Installs a test-writer subscriber once. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// =============================================================================
// Harness
// =============================================================================

/// A simulated host and a caster bound to it.
pub struct Harness {
    pub host: SimHost,
    pub caster: Arc<Caster>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CasterConfig::default())
    }

    pub fn with_config(config: CasterConfig) -> Self {
        init_tracing();
        let host = SimHost::new();
        let caster = Arc::new(Caster::new(host.services(), config));
        Self { host, caster }
    }

    pub fn spell(&self, name: &str) -> Spell {
        Spell::new(name)
    }

    pub fn services(&self) -> Services {
        self.host.services()
    }
}

// =============================================================================
// Test modifiers
// =============================================================================

#[derive(Debug, Default)]
struct Counters {
    casts: AtomicUsize,
    cast_events: AtomicUsize,
    actions: AtomicUsize,
}

/// Counts hook invocations. Never acts on its own.
#[derive(Debug)]
struct CountingModifier {
    counters: Arc<Counters>,
    listens: bool,
}

impl Modifier for CountingModifier {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Custom("CountingModifier")
    }

    fn uses_reference(&self) -> bool {
        self.listens
    }

    fn on_cast(&self, _scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        self.counters.casts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_event(&self, _scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        let counter = match channel {
            Channel::Cast => &self.counters.cast_events,
            Channel::Action => &self.counters.actions,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handle to a tally pushed onto a spell.
#[derive(Debug, Clone)]
pub struct Tally {
    counters: Arc<Counters>,
    index: usize,
}

impl Tally {
    /// Appends a tally listening to `reference` through slot A.
    pub fn listening_to(spell: &mut Spell, reference: Reference) -> Self {
        let counters = Arc::new(Counters::default());
        let index = spell.push_with(
            Box::new(CountingModifier {
                counters: Arc::clone(&counters),
                listens: true,
            }),
            ReferenceSlots::new(Some(reference), None),
        );
        Self { counters, index }
    }

    /// Appends a tally other modifiers can listen to. Its action fires only
    /// through [`Tally::fire`].
    pub fn acting(spell: &mut Spell) -> Self {
        let counters = Arc::new(Counters::default());
        let index = spell.push(Box::new(CountingModifier {
            counters: Arc::clone(&counters),
            listens: false,
        }));
        Self { counters, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn casts(&self) -> usize {
        self.counters.casts.load(Ordering::SeqCst)
    }

    pub fn cast_events(&self) -> usize {
        self.counters.cast_events.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> usize {
        self.counters.actions.load(Ordering::SeqCst)
    }

    /// Fires the tally's action under `ctx`.
    pub fn fire(&self, spell: &Spell, ctx: &CastContext) {
        spell
            .get(self.index)
            .expect("tally still in spell")
            .fire_action(ctx, || {});
    }
}

/// Records the order of `on_cast` calls into a shared list.
#[derive(Debug)]
pub struct OrderRecorder {
    pub tag: usize,
    pub seen: Arc<std::sync::Mutex<Vec<usize>>>,
}

impl Modifier for OrderRecorder {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Custom("OrderRecorder")
    }

    fn on_cast(&self, _scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        self.seen.lock().unwrap().push(self.tag);
        Ok(())
    }
}
