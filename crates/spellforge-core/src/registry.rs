//! Modifier type registry and serializable modifier configs.
//!
//! The [`ModifierRegistry`] is what an editor lists when the user picks a
//! modifier type: names in sorted order, each mapped to a factory producing
//! a default-configured instance. Custom variants are registered alongside
//! the built-ins.
//!
//! [`ModifierConfig`] is the serde form of the built-in variants, used by
//! [`SpellDefinition`](crate::spell::SpellDefinition).
//!
//! # Example
//!
//! ```
//! use spellforge_core::registry::ModifierRegistry;
//!
//! let registry = ModifierRegistry::with_builtins();
//! assert_eq!(
//!     registry.names(),
//!     vec!["Collider", "Delay", "Destroy", "Log", "Particle", "Projectile", "Template"]
//! );
//!
//! let delay = registry.create("Delay").unwrap();
//! assert_eq!(delay.kind().name(), "Delay");
//! assert!(registry.create("Nope").is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SpellError;
use crate::modifier::{Modifier, ModifierKind};
use crate::modifiers::{Collider, Delay, Destroy, Log, Particle, Projectile, Template};

// =============================================================================
// Config
// =============================================================================

/// Configuration of one built-in modifier, tagged by variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModifierConfig {
    /// See [`Projectile`].
    Projectile(Projectile),
    /// See [`Collider`].
    Collider(Collider),
    /// See [`Delay`].
    Delay(Delay),
    /// See [`Particle`].
    Particle(Particle),
    /// See [`Destroy`].
    Destroy(Destroy),
    /// See [`Log`].
    Log(Log),
    /// See [`Template`].
    Template(Template),
}

fn require_finite(value: f32, what: &str) -> Result<(), SpellError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SpellError::InvalidConfig(format!("{what} must be finite, got {value}")))
    }
}

fn require_delay(value: f32, what: &str) -> Result<(), SpellError> {
    require_finite(value, what)?;
    if value < 0.0 {
        return Err(SpellError::InvalidConfig(format!(
            "{what} must not be negative, got {value}"
        )));
    }
    Ok(())
}

impl ModifierConfig {
    /// The variant this config builds.
    #[must_use]
    pub fn kind(&self) -> ModifierKind {
        match self {
            Self::Projectile(_) => ModifierKind::Projectile,
            Self::Collider(_) => ModifierKind::Collider,
            Self::Delay(_) => ModifierKind::Delay,
            Self::Particle(_) => ModifierKind::Particle,
            Self::Destroy(_) => ModifierKind::Destroy,
            Self::Log(_) => ModifierKind::Log,
            Self::Template(_) => ModifierKind::Template,
        }
    }

    /// Checks numeric fields.
    ///
    /// # Errors
    ///
    /// [`SpellError::InvalidConfig`] for non-finite values, negative delays,
    /// or an effect template without a name.
    pub fn validate(&self) -> Result<(), SpellError> {
        match self {
            Self::Projectile(p) => require_finite(p.speed, "projectile speed"),
            Self::Delay(d) => require_delay(d.on_cast_timer, "delay timer"),
            Self::Destroy(d) => require_delay(d.delay, "destroy delay"),
            Self::Particle(p) => match &p.template {
                Some(template) if template.name.is_empty() => Err(SpellError::InvalidConfig(
                    "particle template needs a name".to_string(),
                )),
                Some(template) => require_finite(template.duration, "particle duration"),
                None => Ok(()),
            },
            Self::Collider(_) | Self::Log(_) | Self::Template(_) => Ok(()),
        }
    }

    /// Boxes the configured modifier.
    #[must_use]
    pub fn into_modifier(self) -> Box<dyn Modifier> {
        match self {
            Self::Projectile(m) => Box::new(m),
            Self::Collider(m) => Box::new(m),
            Self::Delay(m) => Box::new(m),
            Self::Particle(m) => Box::new(m),
            Self::Destroy(m) => Box::new(m),
            Self::Log(m) => Box::new(m),
            Self::Template(m) => Box::new(m),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Produces a default-configured modifier.
pub type ModifierFactory = Arc<dyn Fn() -> Box<dyn Modifier> + Send + Sync>;

/// Modifier types by name.
#[derive(Clone, Default)]
pub struct ModifierRegistry {
    factories: BTreeMap<String, ModifierFactory>,
}

impl fmt::Debug for ModifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ModifierRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the seven built-in variants.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Projectile", || Box::new(Projectile::default()));
        registry.register("Collider", || Box::new(Collider));
        registry.register("Delay", || Box::new(Delay::default()));
        registry.register("Particle", || Box::new(Particle::default()));
        registry.register("Destroy", || Box::new(Destroy::default()));
        registry.register("Log", || Box::new(Log::default()));
        registry.register("Template", || Box::new(Template::default()));
        registry
    }

    /// Registers `factory` under `name`. Returns true if it replaced an
    /// existing entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Box<dyn Modifier> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory)).is_some()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Creates a default-configured modifier of type `name`.
    ///
    /// # Errors
    ///
    /// [`SpellError::UnknownModifier`] if `name` is not registered.
    pub fn create(&self, name: &str) -> Result<Box<dyn Modifier>, SpellError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| SpellError::UnknownModifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::ModifierScope;
    use crate::ModifierError;
    use spellforge_host::EffectTemplate;

    #[derive(Debug)]
    struct Echo;

    impl Modifier for Echo {
        fn kind(&self) -> ModifierKind {
            ModifierKind::Custom("Echo")
        }

        fn on_cast(&self, _scope: &ModifierScope<'_>) -> Result<(), ModifierError> {
            Ok(())
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn builtins_create_matching_kinds() {
            let registry = ModifierRegistry::with_builtins();
            for name in registry.names() {
                assert_eq!(registry.create(name).unwrap().kind().name(), name);
            }
        }

        #[test]
        fn custom_variants_sort_with_builtins() {
            let mut registry = ModifierRegistry::with_builtins();
            assert!(!registry.register("Echo", || Box::new(Echo)));
            assert_eq!(registry.len(), 8);
            assert_eq!(registry.names()[3], "Echo");
            assert!(registry.contains("Echo"));
        }

        #[test]
        fn re_registering_replaces() {
            let mut registry = ModifierRegistry::new();
            assert!(registry.is_empty());
            assert!(!registry.register("Echo", || Box::new(Echo)));
            assert!(registry.register("Echo", || Box::new(Echo)));
            assert_eq!(registry.len(), 1);
        }

        #[test]
        fn unknown_name_is_an_error() {
            let registry = ModifierRegistry::new();
            assert_eq!(
                registry.create("Ghost").err(),
                Some(SpellError::UnknownModifier("Ghost".into()))
            );
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn configs_deserialize_from_json() {
            let config: ModifierConfig =
                serde_json::from_str(r#"{ "Delay": { "on_cast_timer": 1.5 } }"#).unwrap();
            assert_eq!(config, ModifierConfig::Delay(Delay::new(1.5)));
            assert_eq!(config.kind(), ModifierKind::Delay);
        }

        #[test]
        fn negative_delay_is_invalid() {
            let config = ModifierConfig::Delay(Delay::new(-1.0));
            assert!(matches!(config.validate(), Err(SpellError::InvalidConfig(_))));
        }

        #[test]
        fn non_finite_speed_is_invalid() {
            let config = ModifierConfig::Projectile(Projectile::new(f32::NAN));
            assert!(config.validate().is_err());
        }

        #[test]
        fn unnamed_effect_template_is_invalid() {
            let config = ModifierConfig::Particle(Particle::attached(EffectTemplate::new("", 3.0)));
            assert!(config.validate().is_err());
        }

        #[test]
        fn into_modifier_keeps_kind() {
            let config = ModifierConfig::Log(Log::default());
            assert_eq!(config.clone().into_modifier().kind(), config.kind());
        }
    }
}
