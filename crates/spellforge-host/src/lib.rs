//! # Spellforge Host
//!
//! Engine-service capabilities consumed by the Spellforge modifier engine,
//! plus an in-memory simulated host for tests, benchmarks, and headless tools.
//!
//! The spell engine never creates engine objects, runs physics, or owns a
//! timer loop itself. Instead it calls into a small set of capabilities:
//!
//! - [`ObjectService`]: spawn/destroy objects, read and move them
//! - [`ContactService`]: one-shot "first contact" notification per object
//! - [`EffectService`]: instantiate visual effects from templates
//! - [`Scheduler`]: run an action after a delay, cancellable via a handle
//! - [`SpellLog`]: sink for designer-authored spell log lines
//!
//! A [`Services`] bundle carries one implementation of each and is injected
//! into a caster at construction.
//!
//! ## Quick Start
//!
//! ```
//! use spellforge_host::sim::SimHost;
//! use spellforge_host::ObjectDesc;
//! use glam::Vec3;
//!
//! let host = SimHost::new();
//! let services = host.services();
//!
//! let handle = services.objects.spawn(ObjectDesc::new("Projectile", Vec3::ZERO));
//! assert!(services.objects.exists(handle));
//!
//! services.objects.destroy(handle);
//! assert!(!services.objects.exists(handle));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod contact;
pub mod effects;
pub mod error;
pub mod handle;
pub mod journal;
pub mod objects;
pub mod scheduler;
pub mod sim;

use std::fmt;
use std::sync::Arc;

// Re-exports for convenience
pub use contact::{Contact, ContactCallback, ContactService};
pub use effects::{EffectService, EffectTemplate, DEFAULT_EFFECT_LIFETIME, MIN_EFFECT_DURATION};
pub use error::HostError;
pub use handle::{EffectHandle, ObjectHandle, TimerHandle};
pub use journal::{LogKind, RecordingLog, SpellLog, SpellLogLine, TracingSpellLog};
pub use objects::{ObjectDesc, ObjectService, RigidBody};
pub use scheduler::{ScheduledAction, Scheduler};

/// The capability bundle a caster is constructed with.
///
/// Every field is a shared trait object so the same host can serve many
/// casters, and so scheduled continuations can keep the services alive after
/// the cast that created them has returned.
#[derive(Clone)]
pub struct Services {
    /// Object lifecycle service.
    pub objects: Arc<dyn ObjectService>,
    /// First-contact notification service.
    pub contacts: Arc<dyn ContactService>,
    /// Visual effect service.
    pub effects: Arc<dyn EffectService>,
    /// Delayed-execution service.
    pub scheduler: Arc<dyn Scheduler>,
    /// Sink for spell-authored log lines.
    pub log: Arc<dyn SpellLog>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("objects", &"dyn ObjectService")
            .field("contacts", &"dyn ContactService")
            .field("effects", &"dyn EffectService")
            .field("scheduler", &"dyn Scheduler")
            .field("log", &"dyn SpellLog")
            .finish()
    }
}
