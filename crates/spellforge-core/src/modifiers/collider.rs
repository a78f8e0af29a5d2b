//! Collider modifier.

use serde::{Deserialize, Serialize};
use spellforge_host::Contact;
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope, ReferenceLabels};

/// Watches the object exposed by its cast source (slot A) and fires its
/// action on that object's first contact.
///
/// When the contact arrives the object becomes this modifier's exposed
/// object for the cast, so an action listener can act on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collider;

impl Modifier for Collider {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Collider
    }

    fn uses_reference(&self) -> bool {
        true
    }

    fn reference_labels(&self) -> ReferenceLabels {
        ReferenceLabels {
            slot_a: "Event for GameObject Initiator",
            slot_b: None,
        }
    }

    fn on_cast(&self, _scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        Ok(())
    }

    fn on_event(&self, scope: &ModifierScope<'_>, channel: Channel) -> Result<(), ModifierError> {
        if channel == Channel::Action {
            return Ok(());
        }

        let Some(watched) = scope.object_from(Channel::Cast) else {
            warn!(modifier = %scope.id(), "no object to watch for contact");
            return Ok(());
        };

        let deferred = scope.deferred();
        scope.services().contacts.on_first_contact(
            watched,
            Box::new(move |contact: Contact| {
                deferred.enter(|scope| {
                    if !scope.services().objects.exists(contact.object) {
                        warn!(modifier = %scope.id(), object = %contact.object, "contact for a destroyed object");
                        return;
                    }
                    scope.expose(contact.object);
                    scope.action(|| {
                        debug!(modifier = %scope.id(), object = %contact.object, "collider triggered");
                    });
                });
            }),
        )?;
        debug!(modifier = %scope.id(), object = %watched, "watching for contact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::Projectile;
    use crate::reference::{Reference, ReferenceSlots};
    use crate::tests::helpers::{Tally, Harness};

    #[test]
    fn hides_slot_b() {
        assert_eq!(Collider.reference_labels().slot_b, None);
        assert!(Collider.uses_reference());
    }

    #[test]
    fn fires_action_on_first_contact_only() {
        let harness = Harness::new();
        let mut spell = harness.spell("touch");
        spell.push(Box::new(Projectile::new(0.0)));
        spell.push_with(
            Box::new(Collider),
            ReferenceSlots::new(Some(Reference::cast(0)), None),
        );
        let tally = Tally::listening_to(&mut spell, Reference::action(1));

        let outcome = harness.caster.cast(&spell).unwrap();
        let projectile = outcome
            .context
            .exposed_object(spell.get(0).unwrap().id())
            .unwrap();
        assert_eq!(tally.actions(), 0);

        assert!(harness.host.world().touch(projectile, None));
        assert!(!harness.host.world().touch(projectile, None));
        assert_eq!(tally.actions(), 1);
        assert_eq!(
            outcome.context.exposed_object(spell.get(1).unwrap().id()),
            Some(projectile)
        );
    }

    #[test]
    fn without_source_object_does_nothing() {
        let harness = Harness::new();
        let mut spell = harness.spell("lonely");
        spell.push(Box::new(Collider));
        let outcome = harness.caster.cast(&spell).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.context.exposed_count(), 0);
    }
}
