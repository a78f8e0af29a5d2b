//! Built-in modifier variants.
//!
//! - [`Projectile`]: spawns a moving projectile at the caster
//! - [`Collider`]: fires its action on the first contact of a referenced object
//! - [`Delay`]: fires its action after a delay
//! - [`Particle`]: attaches a particle effect to, or spawns one at, a referenced object
//! - [`Destroy`]: destroys a referenced object on a timer and/or on an event
//! - [`Log`]: writes designer-authored log lines
//! - [`Template`]: exercises every hook; a starting point for new variants
//!
//! Each variant is plain configuration and can be built in code or
//! deserialized through [`ModifierConfig`](crate::registry::ModifierConfig).
//!
//! # Fireball
//!
//! The canonical composition: a projectile, a collider listening to its
//! cast, and a destroy that captures the projectile on cast and destroys it
//! when the collider acts.
//!
//! ```
//! use spellforge_core::caster::{Caster, CasterConfig};
//! use spellforge_core::modifiers::{Collider, Destroy, DestroyFlags, Projectile};
//! use spellforge_core::reference::{Reference, ReferenceSlots};
//! use spellforge_core::spell::Spell;
//! use spellforge_host::sim::SimHost;
//! use glam::Vec3;
//!
//! let host = SimHost::new();
//! let wall = host.world().spawn_obstacle("Wall", Vec3::new(0.0, 0.0, 10.0), 0.5);
//! let caster = Caster::new(host.services(), CasterConfig::default());
//!
//! let mut spell = Spell::new("Fireball");
//! spell.push(Box::new(Projectile::new(5.0)));
//! spell.push_with(Box::new(Collider), ReferenceSlots::new(Some(Reference::cast(0)), None));
//! spell.push_with(
//!     Box::new(Destroy::new(DestroyFlags::ON_EVENT, 3.0)),
//!     ReferenceSlots::new(Some(Reference::cast(0)), Some(Reference::action(1))),
//! );
//!
//! caster.cast(&spell).unwrap();
//! host.run_for(3.0, 0.25);
//!
//! assert_eq!(host.world().objects_named("Projectile").len(), 0);
//! assert_eq!(host.world().destroyed().len(), 1);
//! assert!(host.world().object(wall).is_some());
//! ```

mod collider;
mod delay;
mod destroy;
mod log;
mod particle;
mod projectile;
mod template;

pub use collider::Collider;
pub use delay::Delay;
pub use destroy::{Destroy, DestroyFlags};
pub use log::Log;
pub use particle::Particle;
pub use projectile::Projectile;
pub use template::Template;
