//! Projectile modifier.

use serde::{Deserialize, Serialize};
use spellforge_host::{ObjectDesc, RigidBody};
use tracing::info;

use crate::error::ModifierError;
use crate::modifier::{Modifier, ModifierKind, ModifierScope};

/// Projectile mass.
pub const PROJECTILE_MASS: f32 = 0.1;

/// Projectile angular drag.
pub const PROJECTILE_ANGULAR_DRAG: f32 = 0.12;

/// Spawns a `Projectile` object at the caster, moving along the caster's
/// facing at `speed`, and exposes it for the rest of the cast.
///
/// # Example
///
/// ```
/// use spellforge_core::modifiers::Projectile;
/// use spellforge_core::modifier::Modifier;
///
/// let projectile = Projectile::new(5.0);
/// assert_eq!(projectile.speed, 5.0);
/// assert!(!projectile.uses_reference());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projectile {
    /// Speed in units per second.
    pub speed: f32,
}

impl Default for Projectile {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

impl Projectile {
    /// A projectile with the given speed.
    #[must_use]
    pub fn new(speed: f32) -> Self {
        Self { speed }
    }
}

impl Modifier for Projectile {
    fn kind(&self) -> ModifierKind {
        ModifierKind::Projectile
    }

    fn on_cast(&self, scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
        let origin = scope.origin();
        let body = RigidBody {
            velocity: origin.forward.normalize_or_zero() * self.speed,
            mass: PROJECTILE_MASS,
            angular_drag: PROJECTILE_ANGULAR_DRAG,
        };
        let desc = ObjectDesc::new("Projectile", origin.position)
            .facing(origin.forward)
            .with_body(body);

        let projectile = scope.services().objects.spawn(desc);
        scope.expose(projectile);
        info!(modifier = %scope.id(), %projectile, speed = self.speed, "shooting");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caster::CasterOrigin;
    use crate::tests::helpers::Harness;
    use glam::Vec3;

    #[test]
    fn spawns_moving_projectile_at_origin() {
        let harness = Harness::new();
        harness
            .caster
            .set_origin(CasterOrigin::new(Vec3::new(1.0, 2.0, 3.0), Vec3::X * 2.0));

        let mut spell = harness.spell("shoot");
        spell.push(Box::new(Projectile::new(4.0)));
        let outcome = harness.caster.cast(&spell).unwrap();

        let handle = outcome
            .context
            .exposed_object(spell.get(0).unwrap().id())
            .expect("projectile exposed");
        let object = harness.host.world().object(handle).unwrap();
        assert_eq!(object.name, "Projectile");
        assert_eq!(object.position, Vec3::new(1.0, 2.0, 3.0));

        let body = object.body.unwrap();
        assert_eq!(body.velocity, Vec3::X * 4.0);
        assert!((body.mass - PROJECTILE_MASS).abs() < f32::EPSILON);
        assert!((body.angular_drag - PROJECTILE_ANGULAR_DRAG).abs() < f32::EPSILON);
    }

    #[test]
    fn each_cast_spawns_its_own_projectile() {
        let harness = Harness::new();
        let mut spell = harness.spell("shoot");
        spell.push(Box::new(Projectile::default()));
        let id = spell.get(0).unwrap().id();

        let first = harness.caster.cast(&spell).unwrap();
        let second = harness.caster.cast(&spell).unwrap();

        assert_ne!(
            first.context.exposed_object(id),
            second.context.exposed_object(id)
        );
        assert_eq!(harness.host.world().objects_named("Projectile").len(), 2);
    }
}
