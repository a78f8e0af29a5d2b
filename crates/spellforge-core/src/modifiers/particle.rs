//! Particle modifier.

use serde::{Deserialize, Serialize};
use spellforge_host::{EffectTemplate, ObjectDesc, ObjectHandle};
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope, ReferenceLabels};

/// Name of the holder object spawned for action-only effects.
pub const EFFECT_HOLDER_NAME: &str = "ParticleSystemObject";

/// Plays a particle effect.
///
/// - By default, when its cast source (slot A) casts, the effect is attached
///   to the source's exposed object and follows it
/// - With `use_action_only`, cast events are ignored; when the action source
///   (slot B) acts, a holder object is spawned at the source object's
///   position, the effect is attached to it, and the holder is destroyed
///   after the template's lifetime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Particle {
    /// The effect to play. Nothing happens without one.
    pub template: Option<EffectTemplate>,
    /// Only react to action events.
    pub use_action_only: bool,
}

impl Particle {
    /// Attaches `template` to the cast source's object.
    #[must_use]
    pub fn attached(template: EffectTemplate) -> Self {
        Self {
            template: Some(template),
            use_action_only: false,
        }
    }

    /// Spawns `template` where the action source's object is.
    #[must_use]
    pub fn at_action(template: EffectTemplate) -> Self {
        Self {
            template: Some(template),
            use_action_only: true,
        }
    }

    fn play_on_cast(&self, scope: &ModifierScope<'_>) {
        let Some(source) = scope.object_from(Channel::Cast) else {
            debug!(modifier = %scope.id(), "no object to attach to");
            return;
        };
        let Some(template) = &self.template else {
            debug!(modifier = %scope.id(), "no effect template");
            return;
        };
        scope.expose(source);
        scope.action(|| attach(scope, template, source));
    }

    fn play_on_action(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        let Some(source) = scope.object_from(Channel::Action) else {
            warn!(modifier = %scope.id(), "action source has no object");
            return Ok(());
        };
        let Some(template) = &self.template else {
            warn!(modifier = %scope.id(), "no effect template");
            return Ok(());
        };
        let objects = &scope.services().objects;
        let Some(position) = objects.position(source) else {
            warn!(modifier = %scope.id(), object = %source, "action source object is gone");
            return Ok(());
        };

        let holder = objects.spawn(ObjectDesc::new(EFFECT_HOLDER_NAME, position));
        scope.expose(holder);
        scope.action(|| attach(scope, template, holder));

        let services = scope.services().clone();
        scope.schedule(template.lifetime(), move || {
            services.objects.destroy(holder);
        })?;
        debug!(modifier = %scope.id(), %holder, lifetime = template.lifetime(), "effect holder spawned");
        Ok(())
    }
}

fn attach(scope: &ModifierScope<'_>, template: &EffectTemplate, object: ObjectHandle) {
    let Some(at) = scope.services().objects.position(object) else {
        warn!(modifier = %scope.id(), %object, "effect target is gone");
        return;
    };
    match scope.services().effects.instantiate_effect(template, at, Some(object)) {
        Ok(effect) => info!(modifier = %scope.id(), %effect, %object, template = %template.name, "effect played"),
        Err(error) => warn!(modifier = %scope.id(), %object, %error, "effect failed"),
    }
}

impl Modifier for Particle {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Particle
    }

    fn uses_reference(&self) -> bool {
        true
    }

    fn reference_labels(&self) -> ReferenceLabels {
        ReferenceLabels {
            slot_a: "Object to attach Particle System",
            slot_b: Some("Object to put particle system at location, OnAction"),
        }
    }

    fn on_cast(&self, _scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        Ok(())
    }

    fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        match channel {
            Channel::Cast if !self.use_action_only => {
                self.play_on_cast(scope);
                Ok(())
            }
            Channel::Action if self.use_action_only => self.play_on_action(scope),
            Channel::Cast | Channel::Action => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{Collider, Projectile};
    use crate::reference::{Reference, ReferenceSlots};
    use crate::tests::helpers::Harness;

    #[test]
    fn attaches_to_projectile_on_cast() {
        let harness = Harness::new();
        let mut spell = harness.spell("trail");
        spell.push(Box::new(Projectile::new(2.0)));
        spell.push_with(
            Box::new(Particle::attached(EffectTemplate::new("sparks", 3.0))),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        harness.caster.cast(&spell).unwrap();

        let effects = harness.host.world().effects();
        assert_eq!(effects.len(), 1);
        let (effect, sim_effect) = &effects[0];
        let projectile = harness.host.world().objects_named("Projectile")[0];
        assert_eq!(sim_effect.parent, Some(projectile));

        harness.host.advance(1.0);
        assert_eq!(
            harness.host.world().effect_position(*effect),
            harness.host.world().object(projectile).map(|o| o.position)
        );
    }

    #[test]
    fn action_only_ignores_cast_events() {
        let harness = Harness::new();
        let mut spell = harness.spell("quiet");
        spell.push(Box::new(Projectile::new(0.0)));
        spell.push_with(
            Box::new(Particle::at_action(EffectTemplate::new("burst", 3.0))),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        harness.caster.cast(&spell).unwrap();
        assert!(harness.host.world().effects().is_empty());
    }

    #[test]
    fn action_spawns_holder_with_lifetime_floor() {
        let harness = Harness::new();
        let mut spell = harness.spell("impact");
        spell.push(Box::new(Projectile::new(0.0)));
        spell.push_with(
            Box::new(Collider),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        spell.push_with(
            Box::new(Particle::at_action(EffectTemplate::new("flash", 0.5))),
            ReferenceSlots::new(None, Some(Reference::action(1))),
        );
        harness.caster.cast(&spell).unwrap();

        let projectile = harness.host.world().objects_named("Projectile")[0];
        harness.host.world().touch(projectile, None);

        let holders = harness.host.world().objects_named(EFFECT_HOLDER_NAME);
        assert_eq!(holders.len(), 1);
        assert_eq!(harness.host.world().effects().len(), 1);

        harness.host.advance(4.5);
        assert_eq!(harness.host.world().objects_named(EFFECT_HOLDER_NAME).len(), 1);
        harness.host.advance(0.5);
        assert!(harness.host.world().objects_named(EFFECT_HOLDER_NAME).is_empty());
        assert!(harness.host.world().effects().is_empty());
    }

    #[test]
    fn missing_template_does_nothing() {
        let harness = Harness::new();
        let mut spell = harness.spell("empty");
        spell.push(Box::new(Projectile::new(0.0)));
        spell.push_with(
            Box::new(Particle::default()),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        let outcome = harness.caster.cast(&spell).unwrap();
        assert!(outcome.is_clean());
        assert!(harness.host.world().effects().is_empty());
    }
}
