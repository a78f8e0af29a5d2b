//! Template modifier.
//!
//! Every hook does something observable, which makes it a useful starting
//! point when writing a new variant and a useful fixture in tests.

use serde::{Deserialize, Serialize};
use spellforge_host::ObjectDesc;
use tracing::debug;

use crate::channel::Channel;
use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope};

/// Name of the object spawned on cast.
pub const TEMPLATE_OBJECT_NAME: &str = "SpellTemplate_Object";

/// Name of the object spawned on action events.
pub const TEMPLATE_EFFECT_NAME: &str = "SpellTemplate_Effect";

/// Seconds before an action-event object is destroyed.
pub const TEMPLATE_EFFECT_LIFETIME: f32 = 5.0;

/// Reference variant.
///
/// - On cast: spawns an object at the caster and exposes it, then rolls
///   `[0, random_max)` and fires its action if the roll is at most
///   `random_max / 2`
/// - On a cast event: exposes the source's object
/// - On an action event: spawns an object at the source object's position,
///   exposes it, and destroys it after five seconds
///
/// Slots are not wired by default, so the event hooks only run through
/// [`Caster::trigger_event`](crate::caster::Caster::trigger_event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    /// Upper bound (exclusive) of the roll.
    pub random_max: u32,
}

impl Default for Template {
    fn default() -> Self {
        Self { random_max: 2 }
    }
}

impl Modifier for Template {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Template
    }

    fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        let origin = scope.origin();
        let object = scope
            .services()
            .objects
            .spawn(ObjectDesc::new(TEMPLATE_OBJECT_NAME, origin.position).facing(origin.forward));
        scope.expose(object);

        let roll = scope.roll(self.random_max);
        if roll <= self.random_max / 2 {
            debug!(modifier = %scope.id(), roll, "roll passed, acting");
            scope.action(|| debug!(modifier = %scope.id(), "template action"));
        } else {
            debug!(modifier = %scope.id(), roll, "roll failed, skipping action");
        }
        Ok(())
    }

    fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        match channel {
            Channel::Cast => {
                if let Some(source) = scope.object_from(Channel::Cast) {
                    scope.expose(source);
                    debug!(modifier = %scope.id(), object = %source, "source object captured");
                }
            }
            Channel::Action => {
                let Some(source) = scope.object_from(Channel::Action) else {
                    return Ok(());
                };
                let objects = &scope.services().objects;
                let Some(position) = objects.position(source) else {
                    return Ok(());
                };
                let effect = objects.spawn(ObjectDesc::new(TEMPLATE_EFFECT_NAME, position));
                scope.expose(effect);

                let services = scope.services().clone();
                scope.schedule(TEMPLATE_EFFECT_LIFETIME, move || {
                    services.objects.destroy(effect);
                })?;
                debug!(modifier = %scope.id(), %effect, "effect object spawned");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caster::{Caster, CasterConfig};
    use crate::reference::Reference;
    use crate::tests::helpers::{Tally, Harness};
    use spellforge_host::sim::SimHost;

    fn action_count(seed: u64, random_max: u32, casts: usize) -> usize {
        let host = SimHost::new();
        let caster = Caster::new(
            host.services(),
            CasterConfig {
                seed,
                ..CasterConfig::default()
            },
        );
        let mut spell = crate::spell::Spell::new("roll");
        spell.push(Box::new(Template { random_max }));
        let tally = Tally::listening_to(&mut spell, Reference::action(0));
        for _ in 0..casts {
            caster.cast(&spell).unwrap();
        }
        tally.actions()
    }

    #[test]
    fn spawns_and_exposes_object() {
        let harness = Harness::new();
        let mut spell = harness.spell("t");
        spell.push(Box::new(Template::default()));
        let outcome = harness.caster.cast(&spell).unwrap();

        let objects = harness.host.world().objects_named(TEMPLATE_OBJECT_NAME);
        assert_eq!(objects.len(), 1);
        assert_eq!(
            outcome.context.exposed_object(spell.get(0).unwrap().id()),
            Some(objects[0])
        );
    }

    #[test]
    fn default_roll_always_acts() {
        // random_max 2 rolls 0 or 1, both <= 1
        assert_eq!(action_count(11, 2, 20), 20);
    }

    #[test]
    fn zero_max_always_acts() {
        assert_eq!(action_count(3, 0, 5), 5);
    }

    #[test]
    fn same_seed_same_branches() {
        assert_eq!(action_count(99, 10, 50), action_count(99, 10, 50));
    }

    #[test]
    fn wide_roll_sometimes_skips() {
        let acted = action_count(5, 100, 200);
        assert!(acted > 0 && acted < 200);
    }

    #[derive(Debug)]
    struct Wired(Template);

    impl Modifier for Wired {
        fn kind(&self) -> ModifierKind {
            ModifierKind::Template
        }

        fn uses_reference(&self) -> bool {
            true
        }

        fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
            self.0.on_cast(scope)
        }

        fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
            self.0.on_event(scope, channel)
        }
    }

    #[test]
    fn unwired_events_do_nothing() {
        let harness = Harness::new();
        let mut spell = harness.spell("t");
        spell.push(Box::new(Template::default()));
        harness
            .caster
            .trigger_event(&spell, crate::context::EventPayload::named("poke"))
            .unwrap();
        assert!(harness.host.world().objects_named(TEMPLATE_EFFECT_NAME).is_empty());
        assert!(harness.host.world().objects_named(TEMPLATE_OBJECT_NAME).is_empty());
    }

    #[test]
    fn action_event_spawns_timed_effect_object() {
        use crate::modifiers::{Collider, Projectile};
        use crate::reference::ReferenceSlots;
        use glam::Vec3;

        let harness = Harness::new();
        let mut spell = harness.spell("wired");
        spell.push(Box::new(Projectile::new(0.0)));
        spell.push_with(Box::new(Collider), ReferenceSlots::new(Some(Reference::cast(0)), None));
        spell.push_with(
            Box::new(Wired(Template { random_max: 0 })),
            ReferenceSlots::new(None, Some(Reference::action(1))),
        );
        harness
            .caster
            .set_origin(crate::caster::CasterOrigin::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z));
        harness.caster.cast(&spell).unwrap();

        let projectile = harness.host.world().objects_named("Projectile")[0];
        harness.host.world().touch(projectile, None);

        let effects = harness.host.world().objects_named(TEMPLATE_EFFECT_NAME);
        assert_eq!(effects.len(), 1);
        assert_eq!(
            harness.host.world().object(effects[0]).unwrap().position,
            Vec3::new(0.0, 1.0, 0.0)
        );

        harness.host.advance(TEMPLATE_EFFECT_LIFETIME);
        assert!(harness.host.world().objects_named(TEMPLATE_EFFECT_NAME).is_empty());
    }
}
